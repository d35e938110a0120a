use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{Application, Job, parse_timestamp};

/// Dashboard counters derived from the two collections. Always recomputed
/// whole, never mutated piecemeal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_jobs: usize,
    pub recent_jobs: usize,
    pub total_applications: usize,
    pub recent_applications: usize,
}

/// The trailing window that classifies an entity as "recent".
const RECENCY_DAYS: i64 = 7;

fn is_recent(created_at: &str, cutoff: DateTime<Utc>) -> bool {
    parse_timestamp(created_at).map(|ts| ts >= cutoff).unwrap_or(false)
}

/// Derives a snapshot at the given evaluation time. The cutoff is computed
/// per call, never cached, so "recent" always means the trailing 7 days from
/// now.
pub fn compute_stats(
    jobs: &[Job],
    applications: &[Application],
    now: DateTime<Utc>,
) -> StatsSnapshot {
    let cutoff = now - Duration::days(RECENCY_DAYS);
    StatsSnapshot {
        total_jobs: jobs.len(),
        recent_jobs: jobs.iter().filter(|j| is_recent(&j.created_at, cutoff)).count(),
        total_applications: applications.len(),
        recent_applications: applications
            .iter()
            .filter(|a| is_recent(&a.created_at, cutoff))
            .count(),
    }
}

/// Commit guard around [`compute_stats`].
///
/// Recomputation must be skippable when nothing observable changed, or a
/// stats commit triggers a render, which triggers a recompute, and so on.
/// The guard is a full field-by-field comparison against the last committed
/// snapshot rather than a collection-length check: a length check alone
/// misses in-place writes such as a status update.
#[derive(Debug, Default)]
pub struct StatsTracker {
    committed: Option<StatsSnapshot>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&StatsSnapshot> {
        self.committed.as_ref()
    }

    /// Recomputes and commits only when the result differs by value from the
    /// last committed snapshot. Returns the new snapshot when a commit
    /// happened, None when nothing changed.
    pub fn refresh(&mut self, jobs: &[Job], applications: &[Application]) -> Option<&StatsSnapshot> {
        self.refresh_at(jobs, applications, Utc::now())
    }

    fn refresh_at(
        &mut self,
        jobs: &[Job],
        applications: &[Application],
        now: DateTime<Utc>,
    ) -> Option<&StatsSnapshot> {
        let next = compute_stats(jobs, applications, now);
        if self.committed.as_ref() == Some(&next) {
            return None;
        }
        self.committed = Some(next);
        self.committed.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_created(id: &str, created_at: &str) -> Job {
        serde_json::from_value(json!({
            "_id": id,
            "title": "Engineer",
            "createdAt": created_at
        }))
        .unwrap()
    }

    fn app_created(id: &str, created_at: &str) -> Application {
        serde_json::from_value(json!({ "_id": id, "createdAt": created_at })).unwrap()
    }

    fn rfc3339(dt: DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    #[test]
    fn test_recency_window_counts() {
        let now = "2026-08-22T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let jobs = vec![
            job_created("j1", &rfc3339(now - Duration::days(10))),
            job_created("j2", &rfc3339(now)),
            job_created("j3", &rfc3339(now - Duration::hours(5))),
        ];
        let stats = compute_stats(&jobs, &[], now);
        assert_eq!(stats.total_jobs, 3);
        assert_eq!(stats.recent_jobs, 2);
        assert_eq!(stats.total_applications, 0);
        assert_eq!(stats.recent_applications, 0);
    }

    #[test]
    fn test_window_boundary_and_unparseable_dates() {
        let now = "2026-08-22T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let jobs = vec![
            // Exactly on the cutoff counts as recent
            job_created("j1", &rfc3339(now - Duration::days(7))),
            // A second older than the window does not
            job_created("j2", &rfc3339(now - Duration::days(7) - Duration::seconds(1))),
            job_created("j3", "not a date"),
            job_created("j4", ""),
        ];
        let stats = compute_stats(&jobs, &[], now);
        assert_eq!(stats.total_jobs, 4);
        assert_eq!(stats.recent_jobs, 1);
    }

    #[test]
    fn test_applications_counted_independently() {
        let now = "2026-08-22T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let apps = vec![
            app_created("a1", &rfc3339(now - Duration::days(1))),
            app_created("a2", &rfc3339(now - Duration::days(30))),
        ];
        let stats = compute_stats(&[], &apps, now);
        assert_eq!(stats.total_applications, 2);
        assert_eq!(stats.recent_applications, 1);
    }

    #[test]
    fn test_unchanged_collections_commit_nothing() {
        let now = "2026-08-22T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let jobs = vec![job_created("j1", &rfc3339(now))];
        let apps = vec![app_created("a1", &rfc3339(now))];

        let mut tracker = StatsTracker::new();
        assert!(tracker.refresh_at(&jobs, &apps, now).is_some());
        // Same elements, same values: no redundant commit, no feedback loop
        assert!(tracker.refresh_at(&jobs, &apps, now).is_none());
        assert!(tracker.refresh_at(&jobs, &apps, now).is_none());
        assert_eq!(tracker.current().unwrap().total_jobs, 1);
    }

    #[test]
    fn test_length_neutral_change_still_commits() {
        let now = "2026-08-22T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut jobs = vec![
            job_created("j1", &rfc3339(now - Duration::days(10))),
            job_created("j2", &rfc3339(now)),
        ];
        let mut tracker = StatsTracker::new();
        tracker.refresh_at(&jobs, &[], now).unwrap();

        // In-place edit that keeps the length but moves a job into the
        // window; a length pre-filter alone would miss this.
        jobs[0].created_at = rfc3339(now - Duration::days(1));
        let committed = tracker.refresh_at(&jobs, &[], now).unwrap();
        assert_eq!(committed.recent_jobs, 2);
    }
}
