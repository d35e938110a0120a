use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config;
use crate::models::{Application, ApplicationPayload, Job, JobPayload, User};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
// Resume payload size varies, so uploads get a much longer window.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Structured gateway error. Every HTTP failure carries the request context
/// (method + path) it came from; nothing is swallowed on the way up.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No HTTP response was received (offline, refused, timed out).
    #[error("{context}: {message}")]
    Transport { context: String, message: String },

    /// HTTP 401. The gateway has already cleared stored credentials; the
    /// caller should redirect to login.
    #[error("session expired or unauthorized, log in again")]
    Unauthorized,

    /// Any other non-success HTTP status, with the server's message if it
    /// sent one.
    #[error("{context}: server returned HTTP {status}")]
    Status {
        status: u16,
        message: Option<String>,
        context: String,
    },

    /// The response body did not match any accepted server shape.
    #[error("{context}: unrecognized response shape")]
    UnexpectedShape { context: String },

    #[error("{context}: invalid response body: {message}")]
    Decode { context: String, message: String },
}

impl ApiError {
    /// Human-readable message with the store's precedence: server-provided
    /// message, then transport error text, then the caller's fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Status {
                message: Some(m), ..
            } => m.clone(),
            ApiError::Transport { message, .. } => message.clone(),
            ApiError::Unauthorized => "Session expired. Please log in again.".to_string(),
            _ => fallback.to_string(),
        }
    }

    fn transport(context: &str, err: reqwest::Error) -> Self {
        ApiError::Transport {
            context: context.to_string(),
            message: err.to_string(),
        }
    }

    fn decode(context: &str, err: reqwest::Error) -> Self {
        ApiError::Decode {
            context: context.to_string(),
            message: err.to_string(),
        }
    }
}

/// One page of a list response, after normalization.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Query parameters for list endpoints: pagination, server-side sort, and
/// resource-specific filters.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub filters: Vec<(String, String)>,
}

impl ListQuery {
    pub fn filter(mut self, key: &str, value: impl Into<String>) -> Self {
        self.filters.push((key.to_string(), value.into()));
        self
    }

    fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(sort_by) = &self.sort_by {
            params.push(("sortBy".to_string(), sort_by.clone()));
        }
        if let Some(order) = &self.sort_order {
            params.push(("sortOrder".to_string(), order.clone()));
        }
        params.extend(self.filters.iter().cloned());
        params
    }
}

/// Typed operations one resource collection exposes. The store takes this as
/// its seam so tests can drive it with a stub instead of a live backend.
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    type Entity: Clone + Send + Sync + 'static;
    type Payload: Send + Sync;

    async fn list(&self, query: &ListQuery) -> Result<Page<Self::Entity>, ApiError>;
    async fn get(&self, id: &str) -> Result<Self::Entity, ApiError>;
    async fn create(&self, payload: &Self::Payload) -> Result<Self::Entity, ApiError>;
    async fn update(&self, id: &str, payload: &Self::Payload)
        -> Result<Self::Entity, ApiError>;
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

/// A resume file staged for multipart upload.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

struct ClientInner {
    http: reqwest::Client,
    base: Mutex<String>,
    alternates: Vec<String>,
    token: Mutex<Option<String>>,
    token_file: Option<PathBuf>,
}

/// HTTP client for the recruitment backend. Cheap to clone; all clones share
/// the adopted base endpoint and session token.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Client wired to the configured environment: base URL, failover
    /// alternates, and the persisted token file.
    pub fn new() -> anyhow::Result<Self> {
        let base = config::base_url();
        let alternates = config::alternate_endpoints(&base);
        let token_file = config::token_path();
        let token = config::load_token(&token_file);
        Self::build(base, alternates, Some(token_file), token)
    }

    /// Client against explicit endpoints, with no token persistence. Used by
    /// tests and one-off scripts.
    pub fn with_endpoints(base: impl Into<String>, alternates: Vec<String>) -> anyhow::Result<Self> {
        Self::build(base.into(), alternates, None, None)
    }

    fn build(
        base: String,
        alternates: Vec<String>,
        token_file: Option<PathBuf>,
        token: Option<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base: Mutex::new(base),
                alternates,
                token: Mutex::new(token),
                token_file,
            }),
        })
    }

    pub fn jobs(&self) -> JobsGateway {
        JobsGateway {
            client: self.clone(),
        }
    }

    pub fn applications(&self) -> ApplicationsGateway {
        ApplicationsGateway {
            client: self.clone(),
        }
    }

    pub fn has_token(&self) -> bool {
        lock(&self.inner.token).is_some()
    }

    pub fn set_token(&self, token: &str) -> anyhow::Result<()> {
        *lock(&self.inner.token) = Some(token.to_string());
        if let Some(path) = &self.inner.token_file {
            config::save_token(path, token)?;
        }
        Ok(())
    }

    /// Drops the session locally: in-memory token and the persisted file.
    /// This is the single place 401 invalidation is enforced.
    pub fn clear_session(&self) {
        *lock(&self.inner.token) = None;
        if let Some(path) = &self.inner.token_file {
            if let Err(e) = config::clear_token(path) {
                warn!("failed to clear token file: {e:#}");
            }
        }
    }

    fn base(&self) -> String {
        lock(&self.inner.base).clone()
    }

    fn token(&self) -> Option<String> {
        lock(&self.inner.token).clone()
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    // --- Auth ---

    pub async fn login(&self, email: &str, password: &str) -> Result<(String, User), ApiError> {
        let ctx = "POST /auth/login";
        let body = serde_json::json!({ "email": email, "password": password });
        let resp = self
            .execute(ctx, |base| {
                self.inner.http.post(format!("{base}/auth/login")).json(&body)
            })
            .await?;
        let value: Value = resp.json().await.map_err(|e| ApiError::decode(ctx, e))?;

        // Accepted shapes: {token, user} or {data: {token, user}}
        let obj = value
            .get("data")
            .filter(|d| d.get("token").is_some())
            .unwrap_or(&value);
        let token = obj
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::UnexpectedShape {
                context: ctx.to_string(),
            })?
            .to_string();
        let user: User = obj
            .get("user")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ApiError::Decode {
                context: ctx.to_string(),
                message: e.to_string(),
            })?
            .unwrap_or(User {
                id: String::new(),
                name: String::new(),
                email: email.to_string(),
                role: None,
            });

        *lock(&self.inner.token) = Some(token.clone());
        if let Some(path) = &self.inner.token_file {
            if let Err(e) = config::save_token(path, &token) {
                warn!("failed to persist token: {e:#}");
            }
        }
        Ok((token, user))
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        let ctx = "GET /auth/me";
        let resp = self
            .execute(ctx, |base| self.get_request(base, "/auth/me"))
            .await?;
        let value: Value = resp.json().await.map_err(|e| ApiError::decode(ctx, e))?;
        // Accepted shapes: a bare user object, {user: {...}}, or {data: {...}}
        let candidate = value
            .get("user")
            .or_else(|| value.get("data"))
            .unwrap_or(&value)
            .clone();
        serde_json::from_value(candidate).map_err(|e| ApiError::Decode {
            context: ctx.to_string(),
            message: e.to_string(),
        })
    }

    // --- Generic resource plumbing ---

    fn get_request(&self, base: &str, path: &str) -> reqwest::RequestBuilder {
        // Cache-busting timestamp so intermediate caches never serve stale
        // collection data.
        self.authed(self.inner.http.get(format!("{base}{path}")))
            .query(&[("_ts", now_millis().to_string())])
    }

    async fn list_collection<T: DeserializeOwned>(
        &self,
        path: &str,
        resource_key: &str,
        query: &ListQuery,
    ) -> Result<Page<T>, ApiError> {
        let ctx = format!("GET {path}");
        let params = query.to_params();
        let resp = self
            .execute(&ctx, |base| self.get_request(base, path).query(&params))
            .await?;
        let value: Value = resp.json().await.map_err(|e| ApiError::decode(&ctx, e))?;
        normalize_list(&ctx, resource_key, value)
    }

    async fn get_entity<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let ctx = format!("GET {path}");
        let resp = self
            .execute(&ctx, |base| self.get_request(base, path))
            .await?;
        let value: Value = resp.json().await.map_err(|e| ApiError::decode(&ctx, e))?;
        normalize_entity(&ctx, value)
    }

    async fn create_entity<T: DeserializeOwned, P: serde::Serialize>(
        &self,
        path: &str,
        payload: &P,
    ) -> Result<T, ApiError> {
        let ctx = format!("POST {path}");
        let body = serde_json::to_value(payload).map_err(|e| ApiError::Decode {
            context: ctx.clone(),
            message: e.to_string(),
        })?;
        let resp = self
            .execute(&ctx, |base| {
                self.authed(self.inner.http.post(format!("{base}{path}"))).json(&body)
            })
            .await?;
        let value: Value = resp.json().await.map_err(|e| ApiError::decode(&ctx, e))?;
        normalize_entity(&ctx, value)
    }

    async fn update_entity<T: DeserializeOwned, P: serde::Serialize>(
        &self,
        path: &str,
        payload: &P,
    ) -> Result<T, ApiError> {
        let ctx = format!("PUT {path}");
        let body = serde_json::to_value(payload).map_err(|e| ApiError::Decode {
            context: ctx.clone(),
            message: e.to_string(),
        })?;
        let resp = self
            .execute(&ctx, |base| {
                self.authed(self.inner.http.put(format!("{base}{path}"))).json(&body)
            })
            .await?;
        let value: Value = resp.json().await.map_err(|e| ApiError::decode(&ctx, e))?;
        normalize_entity(&ctx, value)
    }

    async fn delete_entity(&self, path: &str) -> Result<(), ApiError> {
        let ctx = format!("DELETE {path}");
        self.execute(&ctx, |base| {
            self.authed(self.inner.http.delete(format!("{base}{path}")))
        })
        .await?;
        Ok(())
    }

    /// Submit an application, multipart when a resume file is attached.
    pub async fn submit_application(
        &self,
        payload: &ApplicationPayload,
        resume: Option<&ResumeUpload>,
    ) -> Result<Application, ApiError> {
        let Some(resume) = resume else {
            return self.create_entity("/applications", payload).await;
        };

        let ctx = "POST /applications (multipart)";
        let fields = serde_json::to_value(payload).map_err(|e| ApiError::Decode {
            context: ctx.to_string(),
            message: e.to_string(),
        })?;
        let resp = self
            .execute(ctx, |base| {
                let mut form = reqwest::multipart::Form::new();
                if let Some(obj) = fields.as_object() {
                    for (key, value) in obj {
                        let text = match value {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        form = form.text(key.clone(), text);
                    }
                }
                let part = reqwest::multipart::Part::bytes(resume.bytes.clone())
                    .file_name(resume.filename.clone());
                let part = part
                    .mime_str(&resume.content_type)
                    .unwrap_or_else(|_| {
                        reqwest::multipart::Part::bytes(resume.bytes.clone())
                            .file_name(resume.filename.clone())
                    });
                form = form.part("resume", part);
                self.authed(self.inner.http.post(format!("{base}/applications")))
                    .timeout(UPLOAD_TIMEOUT)
                    .multipart(form)
            })
            .await?;
        let value: Value = resp.json().await.map_err(|e| ApiError::decode(ctx, e))?;
        normalize_entity(ctx, value)
    }

    /// Binary resume download for an application.
    pub async fn download_resume(&self, id: &str) -> Result<(Vec<u8>, Option<String>), ApiError> {
        let path = format!("/applications/{id}/resume");
        let ctx = format!("GET {path}");
        let resp = self
            .execute(&ctx, |base| self.get_request(base, &path))
            .await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = resp.bytes().await.map_err(|e| ApiError::decode(&ctx, e))?;
        Ok((bytes.to_vec(), content_type))
    }

    /// Sends the request against the current base. On a connection-level
    /// failure (no HTTP response at all) it probes the alternate endpoints
    /// once, adopts the first healthy one, and retries the request exactly
    /// once. HTTP error statuses never trigger a retry.
    async fn execute<F>(&self, ctx: &str, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let base = self.base();
        debug!("{ctx} -> {base}");
        let resp = match build(&base).send().await {
            Ok(resp) => resp,
            Err(e) if is_connection_error(&e) => {
                let Some(alt) = self.probe_alternates(&base).await else {
                    return Err(ApiError::transport(ctx, e));
                };
                warn!("{ctx}: {base} unreachable, retrying once against {alt}");
                let resp = build(&alt)
                    .send()
                    .await
                    .map_err(|e| ApiError::transport(ctx, e))?;
                *lock(&self.inner.base) = alt;
                resp
            }
            Err(e) => return Err(ApiError::transport(ctx, e)),
        };
        self.check_status(ctx, resp).await
    }

    async fn probe_alternates(&self, unreachable: &str) -> Option<String> {
        for alt in &self.inner.alternates {
            if alt == unreachable {
                continue;
            }
            let health = format!("{alt}/health");
            match self.inner.http.get(&health).timeout(PROBE_TIMEOUT).send().await {
                Ok(resp) if resp.status().is_success() => return Some(alt.clone()),
                _ => {}
            }
        }
        None
    }

    async fn check_status(
        &self,
        ctx: &str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.clear_session();
            return Err(ApiError::Unauthorized);
        }
        let message = resp
            .json::<Value>()
            .await
            .ok()
            .as_ref()
            .and_then(extract_message);
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
            context: ctx.to_string(),
        })
    }
}

pub struct JobsGateway {
    client: ApiClient,
}

#[async_trait]
impl ResourceGateway for JobsGateway {
    type Entity = Job;
    type Payload = JobPayload;

    async fn list(&self, query: &ListQuery) -> Result<Page<Job>, ApiError> {
        self.client.list_collection("/jobs", "jobs", query).await
    }

    async fn get(&self, id: &str) -> Result<Job, ApiError> {
        self.client.get_entity(&format!("/jobs/{id}")).await
    }

    async fn create(&self, payload: &JobPayload) -> Result<Job, ApiError> {
        self.client.create_entity("/jobs", payload).await
    }

    async fn update(&self, id: &str, payload: &JobPayload) -> Result<Job, ApiError> {
        self.client.update_entity(&format!("/jobs/{id}"), payload).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete_entity(&format!("/jobs/{id}")).await
    }
}

pub struct ApplicationsGateway {
    client: ApiClient,
}

impl ApplicationsGateway {
    pub async fn set_status(
        &self,
        id: &str,
        status: crate::models::ApplicationStatus,
    ) -> Result<Application, ApiError> {
        // Status transitions stay server-authoritative: we only request the
        // change and display whatever comes back.
        let body = serde_json::json!({ "status": status });
        self.client
            .update_entity(&format!("/applications/{id}"), &body)
            .await
    }
}

#[async_trait]
impl ResourceGateway for ApplicationsGateway {
    type Entity = Application;
    type Payload = ApplicationPayload;

    async fn list(&self, query: &ListQuery) -> Result<Page<Application>, ApiError> {
        self.client
            .list_collection("/applications", "applications", query)
            .await
    }

    async fn get(&self, id: &str) -> Result<Application, ApiError> {
        self.client.get_entity(&format!("/applications/{id}")).await
    }

    async fn create(&self, payload: &ApplicationPayload) -> Result<Application, ApiError> {
        self.client.create_entity("/applications", payload).await
    }

    async fn update(
        &self,
        id: &str,
        payload: &ApplicationPayload,
    ) -> Result<Application, ApiError> {
        self.client
            .update_entity(&format!("/applications/{id}"), payload)
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete_entity(&format!("/applications/{id}")).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn is_connection_error(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}

fn extract_message(value: &Value) -> Option<String> {
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Converts every accepted list-response shape into one canonical page.
/// Accepted shapes: a bare array, `{data: [...]}`, `{<resource>: [...]}`, and
/// `{data: {<resource>: [...]}}`, each optionally carrying total/page/limit.
/// Anything else is an UnexpectedShape error, never a silent empty list.
fn normalize_list<T: DeserializeOwned>(
    ctx: &str,
    resource_key: &str,
    value: Value,
) -> Result<Page<T>, ApiError> {
    let unexpected = || ApiError::UnexpectedShape {
        context: ctx.to_string(),
    };

    let (items, meta_outer, meta_inner) = match value {
        Value::Array(items) => (items, None, None),
        Value::Object(obj) => {
            let picked = match obj.get("data") {
                Some(Value::Array(items)) => Some((items.clone(), None)),
                Some(Value::Object(inner)) => match inner.get(resource_key) {
                    Some(Value::Array(items)) => Some((items.clone(), Some(inner.clone()))),
                    _ => None,
                },
                _ => match obj.get(resource_key) {
                    Some(Value::Array(items)) => Some((items.clone(), None)),
                    _ => None,
                },
            };
            match picked {
                Some((items, inner)) => (items, Some(obj), inner),
                None => return Err(unexpected()),
            }
        }
        _ => return Err(unexpected()),
    };

    let count = items.len();
    let parsed: Vec<T> =
        serde_json::from_value(Value::Array(items)).map_err(|e| ApiError::Decode {
            context: ctx.to_string(),
            message: e.to_string(),
        })?;

    let meta_u64 = |key: &str| -> Option<u64> {
        meta_outer
            .as_ref()
            .and_then(|m| m.get(key))
            .or_else(|| meta_inner.as_ref().and_then(|m| m.get(key)))
            .and_then(Value::as_u64)
    };

    Ok(Page {
        items: parsed,
        total: meta_u64("total").unwrap_or(count as u64),
        page: meta_u64("page").unwrap_or(1) as u32,
        limit: meta_u64("limit").unwrap_or(count as u64) as u32,
    })
}

/// Single entities come back either bare or wrapped in `{data: {...}}`.
fn normalize_entity<T: DeserializeOwned>(ctx: &str, value: Value) -> Result<T, ApiError> {
    let candidate = match &value {
        Value::Object(obj) => match obj.get("data") {
            Some(data @ Value::Object(_)) => data.clone(),
            _ => value,
        },
        _ => value,
    };
    serde_json::from_value(candidate).map_err(|e| ApiError::Decode {
        context: ctx.to_string(),
        message: e.to_string(),
    })
}
