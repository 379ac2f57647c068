//! 投递限速与重试
//!
//! Slack webhook 有速率限制，每次投递尝试前固定暂停一段时间。
//! 暂停时长由构造时注入，测试中使用 `RateLimiter::none()`。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// 默认投递间隔
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(5);

/// 默认重试退避基数
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// 固定间隔限速器
#[derive(Debug)]
pub struct RateLimiter {
    pause: Duration,
    /// 已执行的暂停次数
    pauses: AtomicUsize,
}

impl RateLimiter {
    pub fn new(pause: Duration) -> Self {
        Self {
            pause,
            pauses: AtomicUsize::new(0),
        }
    }

    /// 不暂停（仍计数）
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// 投递前等待
    pub fn wait(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        if !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_PAUSE)
    }
}

/// 投递重试策略
///
/// 默认只尝试一次（失败即终止本次运行）。重试总是发生在记录为已处理之前。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（至少 1）
    pub max_attempts: u32,
    /// 线性退避基数
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn fail_fast() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// 第 `attempt` 次失败后的等待时间
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, DEFAULT_RETRY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_none_does_not_sleep_but_counts() {
        let limiter = RateLimiter::none();
        let start = Instant::now();
        limiter.wait();
        limiter.wait();
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(limiter.pauses(), 2);
    }

    #[test]
    fn test_wait_sleeps_for_pause() {
        let limiter = RateLimiter::new(Duration::from_millis(30));
        let start = Instant::now();
        limiter.wait();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_default_pause_is_five_seconds() {
        assert_eq!(RateLimiter::default().pause(), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_policy() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    }

    #[test]
    fn test_retry_policy_needs_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(1));
        assert_eq!(RetryPolicy::default().max_attempts, 1);
    }

    #[test]
    fn test_default_retry_delay_is_linear() {
        let policy = RetryPolicy::new(3, DEFAULT_RETRY_DELAY);
        assert_eq!(policy, RetryPolicy { max_attempts: 3, ..RetryPolicy::default() });
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
    }
}
