use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::chain::{FullBackupSet, IncrementalBackupSet};
use crate::config::RetentionPolicy;

// Absorbs clock skew between set naming and directory modification time
const EXPIRY_GRACE: Duration = Duration::from_secs(5);

pub enum BackupDecision<'a> {
    Full,
    Incremental {
        full: &'a FullBackupSet,
        base: &'a Path,
    },
}

/// Decides which type of backup to create next.
///
/// A pure function of the located chain state, the current time and the retention policy: the
/// chain's own on-disk metadata is the only source of truth, so the decision is idempotent and
/// safe to run from an external periodic trigger without any persisted scheduler state.
pub fn decide<'a>(
    latest_full: Option<&'a FullBackupSet>, latest_incremental: Option<&'a IncrementalBackupSet>,
    now: SystemTime, policy: &RetentionPolicy,
) -> BackupDecision<'a> {
    let full = match latest_full {
        Some(full) => full,
        None => return BackupDecision::Full,
    };

    let expiry = full.created + policy.full_lifetime + EXPIRY_GRACE;
    if now >= expiry {
        return BackupDecision::Full;
    }

    let base = match latest_incremental {
        Some(incremental) => incremental.path.as_path(),
        None => full.path.as_path(),
    };

    BackupDecision::Incremental {full, base}
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::UNIX_EPOCH;

    use rstest::rstest;

    use super::*;

    const FULL_LIFETIME: u64 = 604800;

    #[test]
    fn no_full_backup() {
        assert!(matches!(
            decide(None, None, UNIX_EPOCH, &policy(FULL_LIFETIME, 1)),
            BackupDecision::Full,
        ));
    }

    // The full set was created at T=1000 and lives for a week plus the five seconds of grace
    #[rstest]
    #[case(1000 + FULL_LIFETIME + 4, false)]
    #[case(1000 + FULL_LIFETIME + 5, true)]
    #[case(1000 + FULL_LIFETIME + 3600, true)]
    #[case(1000 + 3600, false)]
    fn expiry_boundary(#[case] now: u64, #[case] expect_full: bool) {
        let full = full_set(1000);
        let policy = policy(FULL_LIFETIME, 1);
        let now = UNIX_EPOCH + Duration::from_secs(now);

        for _ in 0..2 { // The decision doesn't depend on the invocation order
            let decision = decide(Some(&full), None, now, &policy);
            match decision {
                BackupDecision::Full => assert!(expect_full),
                BackupDecision::Incremental {full: decided_full, base} => {
                    assert!(!expect_full);
                    assert_eq!(decided_full.name, full.name);
                    assert_eq!(base, full.path.as_path());
                },
            }
        }
    }

    #[test]
    fn incremental_base() {
        let full = full_set(1000);
        let policy = policy(FULL_LIFETIME, 1);
        let now = UNIX_EPOCH + Duration::from_secs(1000 + 3600);

        let incremental = IncrementalBackupSet {
            name: s!("2020.01.01-11:00:00.000"),
            path: PathBuf::from("/backups/incr/2020.01.01-10:00:00.000/2020.01.01-11:00:00.000"),
            full_name: full.name.clone(),
            created: now,
        };

        match decide(Some(&full), Some(&incremental), now, &policy) {
            BackupDecision::Incremental {base, ..} => assert_eq!(base, incremental.path.as_path()),
            BackupDecision::Full => panic!("Expected an incremental backup decision"),
        }
    }

    fn full_set(created: u64) -> FullBackupSet {
        FullBackupSet {
            name: s!("2020.01.01-10:00:00.000"),
            path: PathBuf::from("/backups/full/2020.01.01-10:00:00.000"),
            created: UNIX_EPOCH + Duration::from_secs(created),
        }
    }

    fn policy(full_lifetime: u64, keep_full_count: usize) -> RetentionPolicy {
        RetentionPolicy {
            full_lifetime: Duration::from_secs(full_lifetime),
            keep_full_count: keep_full_count,
        }
    }
}
