mod config;
mod filter;
mod gateway;
mod models;
mod stats;
mod store;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use filter::{ApplicationFilter, JobFilter, SortDir, SortKey, apply_application_filter, apply_job_filter};
use gateway::{ApiClient, ListQuery, ResourceGateway, ResumeUpload};
use models::{Application, ApplicationPayload, Job, JobPayload, Salary};
use stats::StatsTracker;
use store::Store;

#[derive(Parser)]
#[command(name = "talent")]
#[command(about = "Recruitment admin console - manage job posts and candidate applications")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Password (prompted on stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,

        /// Path to a file containing the password
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Drop the stored session token
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Manage job posts
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Manage candidate applications
    Apps {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Dashboard counters (totals and last 7 days)
    Stats,
}

#[derive(Subcommand)]
enum JobCommands {
    /// List jobs
    List {
        /// Filter by title substring
        #[arg(short, long)]
        role: Option<String>,

        /// Filter by location substring
        #[arg(short, long)]
        location: Option<String>,

        /// Filter by exact experience level
        #[arg(short, long)]
        experience: Option<String>,

        /// Keep jobs whose minimum salary is at least this
        #[arg(long)]
        min_salary: Option<i64>,

        /// Also match the experience filter against the job type (legacy behavior)
        #[arg(long)]
        legacy_type_alias: bool,

        /// Sort key (createdAt, title)
        #[arg(short, long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Page to request from the server
        #[arg(long)]
        page: Option<u32>,

        /// Page size
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show job details
    Show {
        /// Job id
        id: String,
    },

    /// Create a job post
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        location: String,
        /// Full-time, Part-time, Contract, Internship, Remote
        #[arg(long = "type")]
        job_type: Option<String>,
        /// Entry Level, Mid Level, Senior Level, Lead, Executive
        #[arg(long)]
        experience: Option<String>,
        #[arg(long)]
        salary_min: Option<i64>,
        #[arg(long)]
        salary_max: Option<i64>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        requirements: String,
        /// Comma-delimited skill tags
        #[arg(long, default_value = "")]
        skills: String,
        #[arg(long)]
        featured: bool,
    },

    /// Update a job post (unset flags keep current values)
    Update {
        /// Job id
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long = "type")]
        job_type: Option<String>,
        #[arg(long)]
        experience: Option<String>,
        #[arg(long)]
        salary_min: Option<i64>,
        #[arg(long)]
        salary_max: Option<i64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        requirements: Option<String>,
        #[arg(long)]
        skills: Option<String>,
        /// Mark as featured / not featured
        #[arg(long)]
        featured: Option<bool>,
        /// Activate / deactivate the listing
        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete a job post
    Rm {
        /// Job id
        id: String,
    },
}

#[derive(Subcommand)]
enum AppCommands {
    /// List applications
    List {
        /// Filter by applicant name substring
        #[arg(short, long)]
        name: Option<String>,

        /// Filter by email substring
        #[arg(short, long)]
        email: Option<String>,

        /// Filter by applied-for role substring
        #[arg(short, long)]
        role: Option<String>,

        /// Keep applications expecting at least this salary
        #[arg(long)]
        min_salary: Option<i64>,

        /// Sort key (createdAt, fullName, jobRole)
        #[arg(short, long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Page to request from the server
        #[arg(long)]
        page: Option<u32>,

        /// Page size
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show application details
    Show {
        /// Application id
        id: String,
    },

    /// Submit a candidate application
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        experience: Option<String>,
        #[arg(long)]
        expected_salary: Option<i64>,
        #[arg(long, default_value = "")]
        skills: String,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        designation: Option<String>,
        #[arg(long)]
        notice_period: Option<String>,
        /// Resume file to attach (uploaded as multipart)
        #[arg(long)]
        resume: Option<PathBuf>,
    },

    /// Request a status change (submitted, under-review, shortlisted, rejected, hired)
    SetStatus {
        /// Application id
        id: String,
        /// New status
        status: String,
    },

    /// Delete an application
    Rm {
        /// Application id
        id: String,
    },

    /// Download the attached resume
    Resume {
        /// Application id
        id: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_sort_key(s: &str) -> Result<SortKey> {
    match s {
        "createdAt" | "created" | "date" => Ok(SortKey::CreatedAt),
        "title" => Ok(SortKey::Title),
        "fullName" | "name" => Ok(SortKey::FullName),
        "jobRole" | "role" => Ok(SortKey::JobRole),
        _ => Err(anyhow!(
            "Unknown sort key '{}'. Available: createdAt, title, fullName, jobRole",
            s
        )),
    }
}

fn sort_dir(desc: bool) -> SortDir {
    if desc { SortDir::Desc } else { SortDir::Asc }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new()?;

    match cli.command {
        Commands::Login {
            email,
            password,
            password_file,
        } => {
            let password = match (password, password_file) {
                (Some(p), _) => p,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read password file: {}", path.display()))?
                    .trim()
                    .to_string(),
                (None, None) => {
                    print!("Password: ");
                    std::io::stdout().flush()?;
                    let mut line = String::new();
                    std::io::stdin().read_line(&mut line)?;
                    line.trim().to_string()
                }
            };
            let (_token, user) = client.login(&email, &password).await?;
            println!("Logged in as {} <{}>", user.name, user.email);
        }

        Commands::Logout => {
            client.clear_session();
            println!("Logged out.");
        }

        Commands::Whoami => {
            if !client.has_token() {
                println!("Not logged in. Run 'talent login' first.");
                return Ok(());
            }
            let user = client.me().await?;
            println!("{} <{}>", user.name, user.email);
            if let Some(role) = &user.role {
                println!("Role: {}", role);
            }
        }

        Commands::Jobs { command } => run_job_command(&client, command).await?,

        Commands::Apps { command } => run_app_command(&client, command).await?,

        Commands::Stats => {
            let mut jobs = Store::new("jobs", client.jobs());
            let mut apps = Store::new("applications", client.applications());
            jobs.fetch_all(&ListQuery::default()).await?;
            apps.fetch_all(&ListQuery::default()).await?;

            let mut tracker = StatsTracker::new();
            let snapshot = tracker
                .refresh(jobs.entities(), apps.entities())
                .ok_or_else(|| anyhow!("stats computation produced no snapshot"))?;
            println!("Jobs:         {:>6} total, {:>4} in the last 7 days", snapshot.total_jobs, snapshot.recent_jobs);
            println!(
                "Applications: {:>6} total, {:>4} in the last 7 days",
                snapshot.total_applications, snapshot.recent_applications
            );
        }
    }

    Ok(())
}

async fn run_job_command(client: &ApiClient, command: JobCommands) -> Result<()> {
    let mut store = Store::new("jobs", client.jobs());

    match command {
        JobCommands::List {
            role,
            location,
            experience,
            min_salary,
            legacy_type_alias,
            sort,
            desc,
            page,
            limit,
        } => {
            let query = ListQuery {
                page,
                limit,
                ..Default::default()
            };
            store.fetch_all(&query).await?;

            let spec = JobFilter {
                role,
                location,
                experience,
                min_salary,
                legacy_type_alias,
                sort_by: sort.as_deref().map(parse_sort_key).transpose()?,
                sort_dir: sort_dir(desc),
            };
            let jobs = apply_job_filter(store.entities(), &spec);
            print_job_table(&jobs, store.total());
        }

        JobCommands::Show { id } => {
            let job = client.jobs().get(&id).await?;
            print_job(&job);
        }

        JobCommands::Add {
            title,
            company,
            location,
            job_type,
            experience,
            salary_min,
            salary_max,
            currency,
            description,
            requirements,
            skills,
            featured,
        } => {
            let salary = if salary_min.is_some() || salary_max.is_some() {
                Some(Salary {
                    min: salary_min,
                    max: salary_max,
                    currency,
                })
            } else {
                None
            };
            let payload = JobPayload {
                title,
                company,
                location,
                job_type: job_type.as_deref().map(str::parse).transpose().map_err(|e: String| anyhow!(e))?,
                experience: experience.as_deref().map(str::parse).transpose().map_err(|e: String| anyhow!(e))?,
                salary,
                description,
                requirements,
                skills,
                featured,
                active: true,
            };
            let job = store.create(&payload).await?;
            println!("Created job {} ({})", job.id, job.title);
        }

        JobCommands::Update {
            id,
            title,
            company,
            location,
            job_type,
            experience,
            salary_min,
            salary_max,
            description,
            requirements,
            skills,
            featured,
            active,
        } => {
            // Merge flags over the current server copy so unset fields keep
            // their values.
            let current = client.jobs().get(&id).await?;
            let mut salary = current.salary.clone().unwrap_or_default();
            if salary_min.is_some() {
                salary.min = salary_min;
            }
            if salary_max.is_some() {
                salary.max = salary_max;
            }
            let payload = JobPayload {
                title: title.unwrap_or(current.title),
                company: company.unwrap_or(current.company),
                location: location.unwrap_or(current.location),
                job_type: match job_type {
                    Some(t) => Some(t.parse().map_err(|e: String| anyhow!(e))?),
                    None => current.job_type,
                },
                experience: match experience {
                    Some(e) => Some(e.parse().map_err(|e: String| anyhow!(e))?),
                    None => current.experience,
                },
                salary: Some(salary),
                description: description.unwrap_or(current.description),
                requirements: requirements.unwrap_or(current.requirements),
                skills: skills.unwrap_or(current.skills),
                featured: featured.unwrap_or(current.featured),
                active: active.unwrap_or(current.active),
            };
            let job = store.update(&id, &payload).await?;
            println!("Updated job {} ({})", job.id, job.title);
        }

        JobCommands::Rm { id } => {
            store.delete(&id).await?;
            println!("Deleted job {}", id);
        }
    }

    Ok(())
}

async fn run_app_command(client: &ApiClient, command: AppCommands) -> Result<()> {
    let mut store = Store::new("applications", client.applications());

    match command {
        AppCommands::List {
            name,
            email,
            role,
            min_salary,
            sort,
            desc,
            page,
            limit,
        } => {
            let query = ListQuery {
                page,
                limit,
                ..Default::default()
            };
            store.fetch_all(&query).await?;

            let spec = ApplicationFilter {
                name,
                email,
                role,
                min_salary,
                sort_by: sort.as_deref().map(parse_sort_key).transpose()?,
                sort_dir: sort_dir(desc),
            };
            let apps = apply_application_filter(store.entities(), &spec);
            print_application_table(&apps, store.total());
        }

        AppCommands::Show { id } => {
            let app = client.applications().get(&id).await?;
            print_application(&app);
        }

        AppCommands::Submit {
            name,
            email,
            phone,
            location,
            role,
            experience,
            expected_salary,
            skills,
            company,
            designation,
            notice_period,
            resume,
        } => {
            let payload = ApplicationPayload {
                full_name: name,
                email,
                phone,
                location,
                job_role: role,
                experience: experience
                    .as_deref()
                    .map(str::parse)
                    .transpose()
                    .map_err(|e: String| anyhow!(e))?,
                expected_salary: expected_salary.map(models::ExpectedSalary::Flat),
                skills,
                current_company: company,
                designation,
                notice_period,
                status: None,
            };

            // Validation failures stay local; nothing is sent
            let errors = payload.validate();
            if !errors.is_empty() {
                for error in &errors {
                    eprintln!("  - {}", error);
                }
                return Err(anyhow!("application not submitted: {} validation error(s)", errors.len()));
            }

            let upload = match resume {
                Some(path) => Some(read_resume(&path)?),
                None => None,
            };
            let app = client.submit_application(&payload, upload.as_ref()).await?;
            println!("Submitted application {} for {}", app.id, app.full_name);
        }

        AppCommands::SetStatus { id, status } => {
            let status = status.parse().map_err(|e: String| anyhow!(e))?;
            let app = client.applications().set_status(&id, status).await?;
            // The server owns the transition; print whatever it decided
            println!("Application {} is now '{}'", app.id, app.status);
        }

        AppCommands::Rm { id } => {
            store.delete(&id).await?;
            println!("Deleted application {}", id);
        }

        AppCommands::Resume { id, output } => {
            let (bytes, content_type) = client.download_resume(&id).await?;
            std::fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write to {}", output.display()))?;
            println!(
                "Saved {} bytes to {}{}",
                bytes.len(),
                output.display(),
                content_type.map(|ct| format!(" ({})", ct)).unwrap_or_default()
            );
        }
    }

    Ok(())
}

fn read_resume(path: &PathBuf) -> Result<ResumeUpload> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read resume file: {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "resume".to_string());
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("txt") | Some("md") => "text/plain",
        _ => "application/octet-stream",
    };
    Ok(ResumeUpload {
        filename,
        content_type: content_type.to_string(),
        bytes,
    })
}

fn print_job_table(jobs: &[Job], total: u64) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }
    println!(
        "{:<26} {:<28} {:<16} {:<16} {:<12} {:<14} {:>18}",
        "ID", "TITLE", "COMPANY", "LOCATION", "TYPE", "EXPERIENCE", "SALARY"
    );
    println!("{}", "-".repeat(134));
    for job in jobs {
        let salary = job.salary.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<26} {:<28} {:<16} {:<16} {:<12} {:<14} {:>18}",
            truncate(&job.id, 24),
            truncate(&job.title, 26),
            truncate(&job.company, 14),
            truncate(&job.location, 14),
            job.job_type.map(|t| t.as_str()).unwrap_or("-"),
            job.experience.map(|e| e.as_str()).unwrap_or("-"),
            truncate(&salary, 18),
        );
    }
    println!("{} shown, {} total on server", jobs.len(), total);
}

fn print_job(job: &Job) {
    println!("Job {}", job.id);
    println!("Title: {}", job.title);
    println!("Company: {}", job.company);
    println!("Location: {}", job.location);
    if let Some(t) = job.job_type {
        println!("Type: {}", t);
    }
    if let Some(e) = job.experience {
        println!("Experience: {}", e);
    }
    if let Some(s) = &job.salary {
        println!("Salary: {}", s);
    }
    if !job.skills.is_empty() {
        println!("Skills: {}", job.skills);
    }
    println!("Featured: {}   Active: {}", job.featured, job.active);
    println!("Created: {}", job.created_at);
    if !job.description.is_empty() {
        println!("\n--- Description ---\n{}", job.description);
    }
    if !job.requirements.is_empty() {
        println!("\n--- Requirements ---\n{}", job.requirements);
    }
}

fn print_application_table(apps: &[Application], total: u64) {
    if apps.is_empty() {
        println!("No applications found.");
        return;
    }
    println!(
        "{:<26} {:<22} {:<26} {:<22} {:<14} {:>14}",
        "ID", "NAME", "EMAIL", "ROLE", "STATUS", "EXPECTED"
    );
    println!("{}", "-".repeat(128));
    for app in apps {
        let expected = app
            .expected_salary
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<26} {:<22} {:<26} {:<22} {:<14} {:>14}",
            truncate(&app.id, 24),
            truncate(&app.full_name, 20),
            truncate(&app.email, 24),
            truncate(&app.job_role, 20),
            app.status,
            truncate(&expected, 14),
        );
    }
    println!("{} shown, {} total on server", apps.len(), total);
}

fn print_application(app: &Application) {
    println!("Application {}", app.id);
    println!("Name: {}", app.full_name);
    println!("Email: {}", app.email);
    println!("Phone: {}", app.phone);
    println!("Role: {}", app.job_role);
    println!("Status: {}", app.status);
    if let Some(e) = app.experience {
        println!("Experience: {}", e);
    }
    if let Some(s) = &app.expected_salary {
        println!("Expected salary: {}", s);
    }
    if !app.skills.is_empty() {
        println!("Skills: {}", app.skills);
    }
    if let Some(c) = &app.current_company {
        println!("Current company: {}", c);
    }
    if let Some(d) = &app.designation {
        println!("Designation: {}", d);
    }
    if let Some(n) = &app.notice_period {
        println!("Notice period: {}", n);
    }
    if let Some(resume) = &app.resume {
        println!(
            "Resume: {} ({}, {} bytes)",
            resume.filename.as_deref().unwrap_or("attached"),
            resume.content_type.as_deref().unwrap_or("unknown type"),
            resume.size.unwrap_or(0)
        );
    }
    println!("Created: {}", app.created_at);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
