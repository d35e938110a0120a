use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Internship,
    Remote,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "Full-time",
            JobType::PartTime => "Part-time",
            JobType::Contract => "Contract",
            JobType::Internship => "Internship",
            JobType::Remote => "Remote",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full-time" | "fulltime" | "full" => Ok(JobType::FullTime),
            "part-time" | "parttime" | "part" => Ok(JobType::PartTime),
            "contract" => Ok(JobType::Contract),
            "internship" | "intern" => Ok(JobType::Internship),
            "remote" => Ok(JobType::Remote),
            _ => Err(format!(
                "Unknown job type '{}'. Available: Full-time, Part-time, Contract, Internship, Remote",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    #[serde(rename = "Entry Level")]
    Entry,
    #[serde(rename = "Mid Level")]
    Mid,
    #[serde(rename = "Senior Level")]
    Senior,
    Lead,
    Executive,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "Entry Level",
            ExperienceLevel::Mid => "Mid Level",
            ExperienceLevel::Senior => "Senior Level",
            ExperienceLevel::Lead => "Lead",
            ExperienceLevel::Executive => "Executive",
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "entry level" | "entry" | "junior" => Ok(ExperienceLevel::Entry),
            "mid level" | "mid" => Ok(ExperienceLevel::Mid),
            "senior level" | "senior" => Ok(ExperienceLevel::Senior),
            "lead" => Ok(ExperienceLevel::Lead),
            "executive" => Ok(ExperienceLevel::Executive),
            _ => Err(format!(
                "Unknown experience level '{}'. Available: Entry Level, Mid Level, Senior Level, Lead, Executive",
                s
            )),
        }
    }
}

/// Application lifecycle status. Server-authoritative: the client only displays
/// it and requests changes, it never computes transitions locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    Shortlisted,
    Rejected,
    Hired,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under-review",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Hired => "hired",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "submitted" => Ok(ApplicationStatus::Submitted),
            "under-review" | "review" => Ok(ApplicationStatus::UnderReview),
            "shortlisted" => Ok(ApplicationStatus::Shortlisted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "hired" => Ok(ApplicationStatus::Hired),
            _ => Err(format!(
                "Unknown status '{}'. Available: submitted, under-review, shortlisted, rejected, hired",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Salary {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub currency: Option<String>,
}

impl fmt::Display for Salary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cur = self.currency.as_deref().unwrap_or("$");
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "{}{} - {}{}", cur, min, cur, max),
            (Some(min), None) => write!(f, "{}{}+", cur, min),
            (None, Some(max)) => write!(f, "up to {}{}", cur, max),
            (None, None) => write!(f, "-"),
        }
    }
}

/// The backend stores expected salary either as a flat number or as a
/// {min, max, currency} object. Both shapes must deserialize and render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedSalary {
    Flat(i64),
    Range(Salary),
}

impl ExpectedSalary {
    /// Lower bound used by the salary filter predicate.
    pub fn floor(&self) -> Option<i64> {
        match self {
            ExpectedSalary::Flat(n) => Some(*n),
            ExpectedSalary::Range(s) => s.min,
        }
    }
}

impl fmt::Display for ExpectedSalary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedSalary::Flat(n) => write!(f, "${}", n),
            ExpectedSalary::Range(s) => s.fmt(f),
        }
    }
}

/// Resume attachment: metadata plus either an inline payload (base64 string)
/// or a remote fetch id resolved through GET /applications/:id/resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRef {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub job_type: Option<JobType>,
    #[serde(default)]
    pub experience: Option<ExperienceLevel>,
    #[serde(default)]
    pub salary: Option<Salary>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub skills: String, // comma-delimited tags
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub created_at: String, // immutable once set, assigned by the server
    #[serde(default)]
    pub posted_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub job_role: String,
    #[serde(default)]
    pub experience: Option<ExperienceLevel>,
    #[serde(default)]
    pub expected_salary: Option<ExpectedSalary>,
    #[serde(default)]
    pub skills: String,
    #[serde(default)]
    pub current_company: Option<String>,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub notice_period: Option<String>,
    #[serde(default)]
    pub resume: Option<ResumeRef>,
    #[serde(default = "default_status")]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub created_at: String,
}

fn default_true() -> bool {
    true
}

fn default_status() -> ApplicationStatus {
    ApplicationStatus::Submitted
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

// --- Write payloads ---

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type: Option<JobType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<Salary>,
    pub description: String,
    pub requirements: String,
    pub skills: String,
    pub featured: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPayload {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub job_role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_salary: Option<ExpectedSalary>,
    pub skills: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice_period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
}

impl ApplicationPayload {
    /// Client-side form validation. Runs before any network call; a non-empty
    /// result means the payload never reaches the gateway.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.full_name.trim().is_empty() {
            errors.push("full name is required".to_string());
        }
        if self.email.trim().is_empty() {
            errors.push("email is required".to_string());
        } else if !looks_like_email(&self.email) {
            errors.push(format!("'{}' is not a valid email address", self.email));
        }
        if self.phone.trim().is_empty() {
            errors.push("phone is required".to_string());
        }
        if self.job_role.trim().is_empty() {
            errors.push("job role is required".to_string());
        }
        errors
    }
}

fn looks_like_email(s: &str) -> bool {
    let s = s.trim();
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Parse the timestamp formats the backend emits: RFC 3339, SQL-style
/// "YYYY-MM-DD HH:MM:SS", or a bare date. Unparseable strings yield None and
/// sort before everything else.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_deserializes_backend_shape() {
        let job: Job = serde_json::from_value(json!({
            "_id": "j1",
            "title": "Backend Engineer",
            "company": "Acme",
            "location": "Berlin",
            "jobType": "Full-time",
            "experience": "Senior Level",
            "salary": {"min": 90000, "max": 120000, "currency": "EUR"},
            "skills": "rust, sql",
            "featured": true,
            "createdAt": "2026-08-20T09:00:00Z"
        }))
        .unwrap();
        assert_eq!(job.id, "j1");
        assert_eq!(job.job_type, Some(JobType::FullTime));
        assert_eq!(job.experience, Some(ExperienceLevel::Senior));
        assert_eq!(job.salary.as_ref().unwrap().min, Some(90000));
        assert!(job.active); // absent field defaults to active
    }

    #[test]
    fn test_job_accepts_plain_id_field() {
        let job: Job = serde_json::from_value(json!({"id": "j2", "title": "QA"})).unwrap();
        assert_eq!(job.id, "j2");
    }

    #[test]
    fn test_expected_salary_both_shapes() {
        let flat: ExpectedSalary = serde_json::from_value(json!(85000)).unwrap();
        assert_eq!(flat.floor(), Some(85000));
        assert_eq!(flat.to_string(), "$85000");

        let range: ExpectedSalary =
            serde_json::from_value(json!({"min": 70000, "max": 90000, "currency": "$"})).unwrap();
        assert_eq!(range.floor(), Some(70000));

        let app: Application = serde_json::from_value(json!({
            "_id": "a1",
            "fullName": "Dana Cruz",
            "email": "dana@example.com",
            "expectedSalary": 85000
        }))
        .unwrap();
        assert_eq!(app.expected_salary.unwrap().floor(), Some(85000));
    }

    #[test]
    fn test_application_status_round_trip() {
        let app: Application = serde_json::from_value(json!({
            "_id": "a1",
            "status": "under-review"
        }))
        .unwrap();
        assert_eq!(app.status, ApplicationStatus::UnderReview);
        assert_eq!(
            serde_json::to_value(ApplicationStatus::UnderReview).unwrap(),
            json!("under-review")
        );
        assert_eq!(
            "review".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::UnderReview
        );
        assert!("archived".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn test_application_status_defaults_to_submitted() {
        let app: Application = serde_json::from_value(json!({"_id": "a9"})).unwrap();
        assert_eq!(app.status, ApplicationStatus::Submitted);
    }

    #[test]
    fn test_validate_application_payload() {
        let mut payload = ApplicationPayload {
            full_name: "Dana Cruz".to_string(),
            email: "dana@example.com".to_string(),
            phone: "555-0100".to_string(),
            job_role: "Backend Engineer".to_string(),
            ..Default::default()
        };
        assert!(payload.validate().is_empty());

        payload.email = "not-an-email".to_string();
        payload.phone = String::new();
        let errors = payload.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("not a valid email"));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2026-08-20T09:00:00Z").is_some());
        assert!(parse_timestamp("2026-08-20T09:00:00+02:00").is_some());
        assert!(parse_timestamp("2026-08-20 09:00:00").is_some());
        assert!(parse_timestamp("2026-08-20").is_some());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("next tuesday").is_none());
    }

    #[test]
    fn test_enum_parsing_for_cli() {
        assert_eq!("full-time".parse::<JobType>().unwrap(), JobType::FullTime);
        assert_eq!("senior".parse::<ExperienceLevel>().unwrap(), ExperienceLevel::Senior);
        assert!("wizard".parse::<ExperienceLevel>().is_err());
    }
}
