//! Failed-attempt counting and temporary account lockout.
//!
//! The policy comes from the user's tenant; system administrators and other
//! tenant-less users fall back to the defaults. Mutations happen on the
//! in-memory `User`; the caller persists via the store.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Tenant, User};

const DEFAULT_MAX_FAILED_ATTEMPTS: i32 = 5;
const DEFAULT_LOCKOUT_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_failed_attempts: i32,
    pub lockout_duration_minutes: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_duration_minutes: DEFAULT_LOCKOUT_MINUTES,
        }
    }
}

impl LockoutPolicy {
    pub fn from_tenant(tenant: &Tenant) -> Self {
        Self {
            max_failed_attempts: tenant.max_failed_login_attempts,
            lockout_duration_minutes: tenant.lockout_duration_minutes,
        }
    }
}

/// Record a failed attempt. Returns `true` when this attempt crossed the
/// threshold and the account is now newly locked.
pub fn register_failure(user: &mut User, policy: Option<LockoutPolicy>, now: DateTime<Utc>) -> bool {
    let policy = policy.unwrap_or_default();

    user.failed_login_attempts = user.failed_login_attempts.saturating_add(1);
    user.updated_at = now;

    if user.failed_login_attempts >= policy.max_failed_attempts && !user.is_locked_out(now) {
        user.lockout_end = Some(now + Duration::minutes(policy.lockout_duration_minutes));
        return true;
    }
    false
}

/// Clear the counter and lockout window, and stamp the login metadata.
pub fn register_success(user: &mut User, now: DateTime<Utc>, ip: Option<String>) {
    user.failed_login_attempts = 0;
    user.lockout_end = None;
    user.last_login_at = Some(now);
    user.last_login_ip = ip;
    user.updated_at = now;
}

/// Administrative unlock: clears the window and the counter.
pub fn unlock(user: &mut User) {
    user.failed_login_attempts = 0;
    user.lockout_end = None;
    user.updated_at = Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(None, "a@b.c", String::new())
    }

    #[test]
    fn lock_engages_exactly_at_the_threshold() {
        let mut u = user();
        let now = Utc::now();
        let policy = Some(LockoutPolicy {
            max_failed_attempts: 3,
            lockout_duration_minutes: 10,
        });

        assert!(!register_failure(&mut u, policy, now));
        assert!(!register_failure(&mut u, policy, now));
        assert!(register_failure(&mut u, policy, now));
        assert!(u.is_locked_out(now));
        assert_eq!(u.lockout_end, Some(now + Duration::minutes(10)));
    }

    #[test]
    fn failures_past_the_threshold_do_not_re_report_a_new_lock() {
        let mut u = user();
        let now = Utc::now();
        let policy = Some(LockoutPolicy {
            max_failed_attempts: 2,
            lockout_duration_minutes: 10,
        });

        register_failure(&mut u, policy, now);
        assert!(register_failure(&mut u, policy, now));
        assert!(!register_failure(&mut u, policy, now));
    }

    #[test]
    fn tenant_policy_overrides_defaults() {
        let mut tenant = Tenant::new("Acme", "acme");
        tenant.max_failed_login_attempts = 2;
        tenant.lockout_duration_minutes = 30;

        let policy = LockoutPolicy::from_tenant(&tenant);
        assert_eq!(policy.max_failed_attempts, 2);
        assert_eq!(policy.lockout_duration_minutes, 30);
    }

    #[test]
    fn success_resets_counter_and_stamps_metadata() {
        let mut u = user();
        let now = Utc::now();
        register_failure(&mut u, None, now);
        register_failure(&mut u, None, now);

        register_success(&mut u, now, Some("10.0.0.1".to_string()));
        assert_eq!(u.failed_login_attempts, 0);
        assert_eq!(u.lockout_end, None);
        assert_eq!(u.last_login_at, Some(now));
        assert_eq!(u.last_login_ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn unlock_clears_an_active_lock() {
        let mut u = user();
        let now = Utc::now();
        let policy = Some(LockoutPolicy {
            max_failed_attempts: 1,
            lockout_duration_minutes: 60,
        });
        register_failure(&mut u, policy, now);
        assert!(u.is_locked_out(now));

        unlock(&mut u);
        assert!(!u.is_locked_out(now));
        assert_eq!(u.failed_login_attempts, 0);
    }
}
