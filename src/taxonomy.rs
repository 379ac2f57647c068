//! Event taxonomy
//!
//! Static table from audit event kind to the payload shape it decodes into,
//! the alert template, and the ordered arguments that fill the template.
//!
//! The actor who initiated an action always appears before the account the
//! action was applied to ("who did it, to whom"), so argument order is part
//! of each entry and is not interchangeable.

use serde::Serialize;

/// Lifecycle category of an event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Application,
    Organization,
    Repository,
    Team,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Application => "application",
            Category::Organization => "organization",
            Category::Repository => "repository",
            Category::Team => "team",
        }
    }
}

/// Payload shape a wire node is decoded into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    OauthApplication,
    OrgSetting,
    OrgMember,
    OrgInvite,
    OrgBlockUser,
    OrgUpdateMember,
    RepoVisibility,
    RepoLifecycle,
    RepoMember,
    RepoMergeSetting,
    TeamMember,
    TeamRepository,
}

/// Label casing: `Upper` for sentence-initial position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Upper,
    Lower,
}

/// One template argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Actor(Case),
    User(Case),
    BlockedUser(Case),
    Invitee,
    Organization,
    Repository,
    Team,
    Application,
    Visibility,
    PermissionWas,
    Permission,
    MergeType,
}

/// A taxonomy entry
#[derive(Debug, Clone, Copy)]
pub struct TaxonomyEntry {
    pub kind: &'static str,
    pub category: Category,
    pub shape: Shape,
    /// `{}` placeholders, filled in `args` order
    pub template: &'static str,
    pub args: &'static [Arg],
}

const ACTOR: Arg = Arg::Actor(Case::Upper);
const BY_ACTOR: Arg = Arg::Actor(Case::Lower);
const USER: Arg = Arg::User(Case::Lower);

static TAXONOMY: &[TaxonomyEntry] = &[
    // Application authorisation
    TaxonomyEntry {
        kind: "oauth_application.create",
        category: Category::Application,
        shape: Shape::OauthApplication,
        template: "New OAuth app *{}* was created within organisation *{}* by {}.",
        args: &[Arg::Application, Arg::Organization, BY_ACTOR],
    },
    TaxonomyEntry {
        kind: "org.oauth_app_access_approved",
        category: Category::Application,
        shape: Shape::OauthApplication,
        template: "OAuth app *{}* within organisation *{}* had access approved by {}.",
        args: &[Arg::Application, Arg::Organization, BY_ACTOR],
    },
    TaxonomyEntry {
        kind: "org.oauth_app_access_denied",
        category: Category::Application,
        shape: Shape::OauthApplication,
        template: "OAuth app *{}* within organisation *{}* had access denied by {}.",
        args: &[Arg::Application, Arg::Organization, BY_ACTOR],
    },
    TaxonomyEntry {
        kind: "org.oauth_app_access_requested",
        category: Category::Application,
        shape: Shape::OauthApplication,
        template: "Access to OAuth app *{}* within organisation *{}* was requested by {}.",
        args: &[Arg::Application, Arg::Organization, BY_ACTOR],
    },
    // Organisation membership and security posture
    TaxonomyEntry {
        kind: "org.add_billing_manager",
        category: Category::Organization,
        shape: Shape::OrgMember,
        template: "{} added {} as billing manager for organisation *{}*.",
        args: &[ACTOR, USER, Arg::Organization],
    },
    TaxonomyEntry {
        kind: "org.add_member",
        category: Category::Organization,
        shape: Shape::OrgMember,
        template: "{} accepted invitation to join organisation *{}*.",
        args: &[Arg::User(Case::Upper), Arg::Organization],
    },
    TaxonomyEntry {
        kind: "org.block_user",
        category: Category::Organization,
        shape: Shape::OrgBlockUser,
        template: "{} was blocked by {} in organisation *{}*.",
        args: &[Arg::BlockedUser(Case::Upper), BY_ACTOR, Arg::Organization],
    },
    TaxonomyEntry {
        kind: "org.create",
        category: Category::Organization,
        shape: Shape::OrgSetting,
        template: "Organisation *{}* was created by {}.",
        args: &[Arg::Organization, BY_ACTOR],
    },
    TaxonomyEntry {
        kind: "org.disable_saml",
        category: Category::Organization,
        shape: Shape::OrgSetting,
        template: "SAML was disabled for organisation *{}* by {}.",
        args: &[Arg::Organization, BY_ACTOR],
    },
    TaxonomyEntry {
        kind: "org.disable_two_factor_requirement",
        category: Category::Organization,
        shape: Shape::OrgSetting,
        template: "Two-factor authentication was disabled for organisation *{}* by {}.",
        args: &[Arg::Organization, BY_ACTOR],
    },
    TaxonomyEntry {
        kind: "org.enable_oauth_app_restrictions",
        category: Category::Organization,
        shape: Shape::OrgSetting,
        template: "OAuth app restrictions were enabled for organisation *{}* by {}.",
        args: &[Arg::Organization, BY_ACTOR],
    },
    TaxonomyEntry {
        kind: "org.enable_saml",
        category: Category::Organization,
        shape: Shape::OrgSetting,
        template: "SAML was enabled for organisation *{}* by {}.",
        args: &[Arg::Organization, BY_ACTOR],
    },
    TaxonomyEntry {
        kind: "org.enable_two_factor_requirement",
        category: Category::Organization,
        shape: Shape::OrgSetting,
        template: "Two-factor authentication was enabled for organisation *{}* by {}.",
        args: &[Arg::Organization, BY_ACTOR],
    },
    TaxonomyEntry {
        kind: "org.invite_member",
        category: Category::Organization,
        shape: Shape::OrgInvite,
        template: "{} invited new {} to join organisation *{}*.",
        args: &[ACTOR, Arg::Invitee, Arg::Organization],
    },
    TaxonomyEntry {
        kind: "org.remove_billing_manager",
        category: Category::Organization,
        shape: Shape::OrgMember,
        template: "{} removed {} as billing manager from organisation *{}*.",
        args: &[ACTOR, USER, Arg::Organization],
    },
    TaxonomyEntry {
        kind: "org.remove_member",
        category: Category::Organization,
        shape: Shape::OrgMember,
        template: "{} removed {} from organisation *{}*.",
        args: &[ACTOR, USER, Arg::Organization],
    },
    TaxonomyEntry {
        kind: "org.remove_outside_collaborator",
        category: Category::Organization,
        shape: Shape::OrgMember,
        template: "{} removed {} as an outside collaborator from organisation *{}*.",
        args: &[ACTOR, USER, Arg::Organization],
    },
    TaxonomyEntry {
        kind: "org.restore_member",
        category: Category::Organization,
        shape: Shape::OrgMember,
        template: "{} restored {} to organisation *{}*.",
        args: &[ACTOR, USER, Arg::Organization],
    },
    TaxonomyEntry {
        kind: "org.update_member",
        category: Category::Organization,
        shape: Shape::OrgUpdateMember,
        template: "{} changed the role of {} from *{}* to *{}* in organisation *{}*.",
        args: &[
            ACTOR,
            USER,
            Arg::PermissionWas,
            Arg::Permission,
            Arg::Organization,
        ],
    },
    // Repository visibility, lifecycle and collaboration
    TaxonomyEntry {
        kind: "repo.access",
        category: Category::Repository,
        shape: Shape::RepoVisibility,
        template: "{} changed the visibility of repo *{}* to *{}*.",
        args: &[ACTOR, Arg::Repository, Arg::Visibility],
    },
    TaxonomyEntry {
        kind: "repo.add_member",
        category: Category::Repository,
        shape: Shape::RepoMember,
        template: "{} invited {} to collaborate on repo *{}*.",
        args: &[ACTOR, USER, Arg::Repository],
    },
    TaxonomyEntry {
        kind: "repo.archived",
        category: Category::Repository,
        shape: Shape::RepoLifecycle,
        template: "{} archived repo *{}*.",
        args: &[ACTOR, Arg::Repository],
    },
    TaxonomyEntry {
        kind: "repo.change_merge_setting",
        category: Category::Repository,
        shape: Shape::RepoMergeSetting,
        template: "{} changed the merge setting of repo *{}* to *{}*.",
        args: &[ACTOR, Arg::Repository, Arg::MergeType],
    },
    TaxonomyEntry {
        kind: "repo.create",
        category: Category::Repository,
        shape: Shape::RepoVisibility,
        template: "{} created repo *{}* with visibility *{}*.",
        args: &[ACTOR, Arg::Repository, Arg::Visibility],
    },
    TaxonomyEntry {
        kind: "repo.destroy",
        category: Category::Repository,
        shape: Shape::RepoLifecycle,
        template: "{} deleted repo *{}*.",
        args: &[ACTOR, Arg::Repository],
    },
    TaxonomyEntry {
        kind: "repo.remove_member",
        category: Category::Repository,
        shape: Shape::RepoMember,
        template: "{} removed {} as a collaborator from repo *{}*.",
        args: &[ACTOR, USER, Arg::Repository],
    },
    // Team membership and repository assignment
    TaxonomyEntry {
        kind: "team.add_member",
        category: Category::Team,
        shape: Shape::TeamMember,
        template: "{} added {} to team *{}*.",
        args: &[ACTOR, USER, Arg::Team],
    },
    TaxonomyEntry {
        kind: "team.add_repository",
        category: Category::Team,
        shape: Shape::TeamRepository,
        template: "{} gave team *{}* control of repository *{}*.",
        args: &[ACTOR, Arg::Team, Arg::Repository],
    },
    TaxonomyEntry {
        kind: "team.remove_member",
        category: Category::Team,
        shape: Shape::TeamMember,
        template: "{} removed {} from team *{}*.",
        args: &[ACTOR, USER, Arg::Team],
    },
    TaxonomyEntry {
        kind: "team.remove_repository",
        category: Category::Team,
        shape: Shape::TeamRepository,
        template: "{} removed control from team *{}* of repository *{}*.",
        args: &[ACTOR, Arg::Team, Arg::Repository],
    },
];

/// All entries, in table order
pub fn entries() -> &'static [TaxonomyEntry] {
    TAXONOMY
}

pub fn entry_for(kind: &str) -> Option<&'static TaxonomyEntry> {
    TAXONOMY.iter().find(|entry| entry.kind == kind)
}

/// Template for `kind`, or `None` when the kind is not announced
pub fn template_for(kind: &str) -> Option<&'static str> {
    entry_for(kind).map(|entry| entry.template)
}

pub fn is_known(kind: &str) -> bool {
    entry_for(kind).is_some()
}

/// Fill `{}` placeholders in order. Surplus values are ignored, missing
/// values leave the placeholder empty.
pub fn fill_template(template: &str, values: &[String]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(String::len).sum::<usize>());
    let mut values = values.iter();
    let mut parts = template.split("{}").peekable();

    while let Some(part) = parts.next() {
        out.push_str(part);
        if parts.peek().is_some() {
            if let Some(value) = values.next() {
                out.push_str(value);
            }
        }
    }

    out
}
