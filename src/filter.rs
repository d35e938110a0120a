//! Pure, deterministic filtering and sorting over fetched collections.
//!
//! Every function here returns a new Vec and never mutates its input:
//! callers hold references to the pre-filter collection for change
//! comparison, so referential transparency is a hard requirement.

use crate::models::{Application, Job, parse_timestamp};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    Title,
    FullName,
    JobRole,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

/// Job list predicates. All present predicates are ANDed; absent ones match
/// everything. Pure data, no behavior beyond matching.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Case-insensitive substring match against the title.
    pub role: Option<String>,
    /// Case-insensitive substring match against the location.
    pub location: Option<String>,
    /// Exact match against the experience level.
    pub experience: Option<String>,
    /// Keep jobs whose salary.min is at least this.
    pub min_salary: Option<i64>,
    /// The original admin screen matched the experience predicate against
    /// either the experience or the job-type field. That aliasing may be a
    /// latent bug, so the strict interpretation is the default and the
    /// legacy one stays available behind this flag until product confirms.
    pub legacy_type_alias: bool,
    pub sort_by: Option<SortKey>,
    pub sort_dir: SortDir,
}

/// Application list predicates, same AND semantics as [`JobFilter`].
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Case-insensitive substring match against the applied-for role.
    pub role: Option<String>,
    /// Keep applications whose expected salary floor is at least this.
    /// Handles both the flat and {min,max} expected-salary shapes.
    pub min_salary: Option<i64>,
    pub sort_by: Option<SortKey>,
    pub sort_dir: SortDir,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn filter_jobs(jobs: &[Job], spec: &JobFilter) -> Vec<Job> {
    jobs.iter()
        .filter(|job| {
            if let Some(role) = &spec.role {
                if !contains_ci(&job.title, role) {
                    return false;
                }
            }
            if let Some(location) = &spec.location {
                if !contains_ci(&job.location, location) {
                    return false;
                }
            }
            if let Some(want) = &spec.experience {
                if !want.is_empty() {
                    let exp_match = job.experience.map(|e| e.as_str() == want).unwrap_or(false);
                    let alias_match = spec.legacy_type_alias
                        && job.job_type.map(|t| t.as_str() == want).unwrap_or(false);
                    if !exp_match && !alias_match {
                        return false;
                    }
                }
            }
            if let Some(floor) = spec.min_salary {
                // Jobs without a posted minimum never satisfy a salary bound
                let min = job.salary.as_ref().and_then(|s| s.min);
                if !min.map(|m| m >= floor).unwrap_or(false) {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

pub fn filter_applications(apps: &[Application], spec: &ApplicationFilter) -> Vec<Application> {
    apps.iter()
        .filter(|app| {
            if let Some(name) = &spec.name {
                if !contains_ci(&app.full_name, name) {
                    return false;
                }
            }
            if let Some(email) = &spec.email {
                if !contains_ci(&app.email, email) {
                    return false;
                }
            }
            if let Some(role) = &spec.role {
                if !contains_ci(&app.job_role, role) {
                    return false;
                }
            }
            if let Some(floor) = spec.min_salary {
                let min = app.expected_salary.as_ref().and_then(|s| s.floor());
                if !min.map(|m| m >= floor).unwrap_or(false) {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

/// Per-type access to sortable fields. Missing string values sort as "".
pub trait Sortable {
    fn created_at(&self) -> &str;
    fn string_key(&self, key: SortKey) -> &str;
}

impl Sortable for Job {
    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn string_key(&self, key: SortKey) -> &str {
        match key {
            SortKey::Title => &self.title,
            _ => "",
        }
    }
}

impl Sortable for Application {
    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn string_key(&self, key: SortKey) -> &str {
        match key {
            SortKey::FullName => &self.full_name,
            SortKey::JobRole => &self.job_role,
            _ => "",
        }
    }
}

/// Stable sort producing a new Vec. Equal keys keep their input order: this
/// runs on every render over the same visible input and must not jitter
/// equal-ranked rows. Descending order reverses the comparator, not the
/// output, so stability holds in both directions.
pub fn sort<T: Sortable + Clone>(items: &[T], key: SortKey, dir: SortDir) -> Vec<T> {
    let mut out = items.to_vec();
    let cmp = |a: &T, b: &T| -> Ordering {
        match key {
            SortKey::CreatedAt => {
                parse_timestamp(a.created_at()).cmp(&parse_timestamp(b.created_at()))
            }
            k => a.string_key(k).cmp(b.string_key(k)),
        }
    };
    match dir {
        SortDir::Asc => out.sort_by(cmp),
        SortDir::Desc => out.sort_by(|a, b| cmp(b, a)),
    }
    out
}

/// Filter + sort in one pass, the shape the list screens consume.
pub fn apply_job_filter(jobs: &[Job], spec: &JobFilter) -> Vec<Job> {
    let kept = filter_jobs(jobs, spec);
    match spec.sort_by {
        Some(key) => sort(&kept, key, spec.sort_dir),
        None => kept,
    }
}

pub fn apply_application_filter(apps: &[Application], spec: &ApplicationFilter) -> Vec<Application> {
    let kept = filter_applications(apps, spec);
    match spec.sort_by {
        Some(key) => sort(&kept, key, spec.sort_dir),
        None => kept,
    }
}
