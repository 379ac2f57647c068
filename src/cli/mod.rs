//! CLI command handling

pub mod fetch;
pub mod kinds;
pub mod run;

pub use fetch::*;
pub use kinds::*;
pub use run::*;
