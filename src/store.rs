use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::gateway::{ApiError, ListQuery, Page, ResourceGateway};
use crate::models::{Application, Job};

/// Anything the store can hold: identified by the server-assigned opaque id.
pub trait Entity: Clone {
    fn entity_id(&self) -> &str;
}

impl Entity for Job {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl Entity for Application {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Fetch,
    Create,
    Update,
    Delete,
}

impl Op {
    fn verb(&self) -> &'static str {
        match self {
            Op::Fetch => "load",
            Op::Create => "create",
            Op::Update => "update",
            Op::Delete => "delete",
        }
    }
}

/// One named loading flag per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    pub fetch: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl LoadingFlags {
    fn set(&mut self, op: Op, on: bool) {
        match op {
            Op::Fetch => self.fetch = on,
            Op::Create => self.create = on,
            Op::Update => self.update = on,
            Op::Delete => self.delete = on,
        }
    }

    pub fn any(&self) -> bool {
        self.fetch || self.create || self.update || self.delete
    }
}

/// State-change notifications, published on an in-process channel. This is
/// the replacement for cross-component signaling through browser storage:
/// observers subscribe to the store directly.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Replaced { count: usize },
    Created { id: String },
    Updated { id: String },
    Deleted { id: String },
    Failed { op: Op, message: String },
}

/// Authoritative in-memory copy of one remote collection.
///
/// The gateway is injected, so tests drive the store with a stub. The store
/// trusts the server list as ground truth on every fetch; the only
/// incremental updates are the optimistic post-write mutations, which avoid a
/// full refetch after every write.
pub struct Store<G: ResourceGateway>
where
    G::Entity: Entity,
{
    gateway: G,
    label: &'static str,
    entities: Vec<G::Entity>,
    total: u64,
    loading: LoadingFlags,
    last_error: Option<String>,
    fetch_epoch: u64,
    events: broadcast::Sender<StoreEvent>,
}

impl<G: ResourceGateway> Store<G>
where
    G::Entity: Entity,
{
    pub fn new(label: &'static str, gateway: G) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            gateway,
            label,
            entities: Vec::new(),
            total: 0,
            loading: LoadingFlags::default(),
            last_error: None,
            fetch_epoch: 0,
            events,
        }
    }

    pub fn entities(&self) -> &[G::Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Server-reported total across all pages, when the backend sends one.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn loading(&self) -> LoadingFlags {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Replaces the whole collection with the server's list. On failure the
    /// previous collection is preserved untouched and the error is recorded
    /// and re-thrown.
    pub async fn fetch_all(&mut self, query: &ListQuery) -> Result<(), ApiError> {
        let epoch = self.begin_fetch();
        let result = self.gateway.list(query).await;
        self.finish_fetch(epoch, result)
    }

    /// Starts a fetch generation. A response is only committed if no newer
    /// fetch has started since, so a slow early response can never overwrite
    /// a later one.
    fn begin_fetch(&mut self) -> u64 {
        self.fetch_epoch += 1;
        self.loading.set(Op::Fetch, true);
        self.fetch_epoch
    }

    fn finish_fetch(
        &mut self,
        epoch: u64,
        result: Result<Page<G::Entity>, ApiError>,
    ) -> Result<(), ApiError> {
        self.loading.set(Op::Fetch, false);
        if epoch != self.fetch_epoch {
            debug!("{}: discarding stale fetch response (epoch {epoch})", self.label);
            return Ok(());
        }
        match result {
            Ok(page) => {
                self.total = page.total;
                self.entities = page.items;
                self.last_error = None;
                self.emit(StoreEvent::Replaced {
                    count: self.entities.len(),
                });
                Ok(())
            }
            Err(e) => Err(self.fail(Op::Fetch, e)),
        }
    }

    /// Creates remotely, then prepends the returned entity locally
    /// (newest-first) instead of refetching the whole collection.
    pub async fn create(&mut self, payload: &G::Payload) -> Result<G::Entity, ApiError> {
        self.loading.set(Op::Create, true);
        let result = self.gateway.create(payload).await;
        self.loading.set(Op::Create, false);
        match result {
            Ok(entity) => {
                self.entities.insert(0, entity.clone());
                self.total = self.total.saturating_add(1);
                self.last_error = None;
                self.emit(StoreEvent::Created {
                    id: entity.entity_id().to_string(),
                });
                Ok(entity)
            }
            Err(e) => Err(self.fail(Op::Create, e)),
        }
    }

    /// Updates remotely, then replaces the matching entity in place,
    /// preserving list order.
    pub async fn update(&mut self, id: &str, payload: &G::Payload) -> Result<G::Entity, ApiError> {
        self.loading.set(Op::Update, true);
        let result = self.gateway.update(id, payload).await;
        self.loading.set(Op::Update, false);
        match result {
            Ok(entity) => {
                if let Some(slot) = self.entities.iter_mut().find(|e| e.entity_id() == id) {
                    *slot = entity.clone();
                }
                self.last_error = None;
                self.emit(StoreEvent::Updated { id: id.to_string() });
                Ok(entity)
            }
            Err(e) => Err(self.fail(Op::Update, e)),
        }
    }

    /// Deletes remotely, then removes the matching entity locally.
    pub async fn delete(&mut self, id: &str) -> Result<(), ApiError> {
        self.loading.set(Op::Delete, true);
        let result = self.gateway.delete(id).await;
        self.loading.set(Op::Delete, false);
        match result {
            Ok(()) => {
                self.entities.retain(|e| e.entity_id() != id);
                self.total = self.total.saturating_sub(1);
                self.last_error = None;
                self.emit(StoreEvent::Deleted { id: id.to_string() });
                Ok(())
            }
            Err(e) => Err(self.fail(Op::Delete, e)),
        }
    }

    /// Records the failure and re-throws it, so a caller awaiting the
    /// operation can react locally while other observers see `last_error`.
    fn fail(&mut self, op: Op, err: ApiError) -> ApiError {
        let fallback = format!("Failed to {} {}", op.verb(), self.label);
        let message = err.user_message(&fallback);
        warn!("{}: {message}", self.label);
        self.last_error = Some(message.clone());
        self.emit(StoreEvent::Failed { op, message });
        err
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine; events are best-effort notifications
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Application, Job, JobPayload};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(id: &str, title: &str) -> Job {
        serde_json::from_value(json!({
            "_id": id,
            "title": title,
            "createdAt": "2026-08-20T09:00:00Z"
        }))
        .unwrap()
    }

    fn app(id: &str) -> Application {
        serde_json::from_value(json!({ "_id": id })).unwrap()
    }

    fn transport_err() -> ApiError {
        ApiError::Transport {
            context: "GET /jobs".to_string(),
            message: "connection refused".to_string(),
        }
    }

    /// Remembers writes like a real backend: created entities show up in
    /// later list calls.
    struct StubJobs {
        items: Mutex<Vec<Job>>,
        fail_next: Mutex<Option<ApiError>>,
        list_calls: AtomicUsize,
    }

    impl StubJobs {
        fn seeded(items: Vec<Job>) -> Self {
            Self {
                items: Mutex::new(items),
                fail_next: Mutex::new(None),
                list_calls: AtomicUsize::new(0),
            }
        }

        fn fail_next(&self, err: ApiError) {
            *self.fail_next.lock().unwrap() = Some(err);
        }

        fn take_failure(&self) -> Option<ApiError> {
            self.fail_next.lock().unwrap().take()
        }
    }

    #[async_trait]
    impl ResourceGateway for StubJobs {
        type Entity = Job;
        type Payload = JobPayload;

        async fn list(&self, _query: &ListQuery) -> Result<Page<Job>, ApiError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            let items = self.items.lock().unwrap().clone();
            let total = items.len() as u64;
            let limit = items.len() as u32;
            Ok(Page {
                items,
                total,
                page: 1,
                limit,
            })
        }

        async fn get(&self, id: &str) -> Result<Job, ApiError> {
            self.items
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.id == id)
                .cloned()
                .ok_or(ApiError::Status {
                    status: 404,
                    message: None,
                    context: format!("GET /jobs/{id}"),
                })
        }

        async fn create(&self, payload: &JobPayload) -> Result<Job, ApiError> {
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            let mut items = self.items.lock().unwrap();
            let created = job(&format!("srv-{}", items.len() + 1), &payload.title);
            items.insert(0, created.clone());
            Ok(created)
        }

        async fn update(&self, id: &str, payload: &JobPayload) -> Result<Job, ApiError> {
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            let mut items = self.items.lock().unwrap();
            let slot = items.iter_mut().find(|j| j.id == id).ok_or(ApiError::Status {
                status: 404,
                message: None,
                context: format!("PUT /jobs/{id}"),
            })?;
            slot.title = payload.title.clone();
            Ok(slot.clone())
        }

        async fn delete(&self, id: &str) -> Result<(), ApiError> {
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            self.items.lock().unwrap().retain(|j| j.id != id);
            Ok(())
        }
    }

    /// Applications stub covering only the operations its tests exercise.
    struct StubApps {
        items: Mutex<Vec<Application>>,
    }

    #[async_trait]
    impl ResourceGateway for StubApps {
        type Entity = Application;
        type Payload = crate::models::ApplicationPayload;

        async fn list(&self, _query: &ListQuery) -> Result<Page<Application>, ApiError> {
            let items = self.items.lock().unwrap().clone();
            let total = items.len() as u64;
            let limit = items.len() as u32;
            Ok(Page {
                items,
                total,
                page: 1,
                limit,
            })
        }

        async fn get(&self, _id: &str) -> Result<Application, ApiError> {
            unreachable!("not used in these tests")
        }

        async fn create(
            &self,
            _payload: &crate::models::ApplicationPayload,
        ) -> Result<Application, ApiError> {
            unreachable!("not used in these tests")
        }

        async fn update(
            &self,
            _id: &str,
            _payload: &crate::models::ApplicationPayload,
        ) -> Result<Application, ApiError> {
            unreachable!("not used in these tests")
        }

        async fn delete(&self, id: &str) -> Result<(), ApiError> {
            self.items.lock().unwrap().retain(|a| a.id != id);
            Ok(())
        }
    }

    fn payload(title: &str) -> JobPayload {
        JobPayload {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_fetch_all_reconciles() {
        let mut store = Store::new("jobs", StubJobs::seeded(vec![job("j1", "Backend Engineer")]));
        store.fetch_all(&ListQuery::default()).await.unwrap();
        assert_eq!(store.len(), 1);

        let created = store.create(&payload("Data Engineer")).await.unwrap();
        assert_eq!(store.entities()[0].id, created.id); // newest-first, no refetch

        store.fetch_all(&ListQuery::default()).await.unwrap();
        assert!(store.entities().iter().any(|j| j.id == created.id));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_preserves_collection_and_records_error() {
        let stub = StubJobs::seeded(vec![job("j1", "Backend Engineer")]);
        let mut store = Store::new("jobs", stub);
        store.fetch_all(&ListQuery::default()).await.unwrap();

        store.gateway.fail_next(transport_err());
        let err = store.fetch_all(&ListQuery::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));

        // No partial/destructive update on failure
        assert_eq!(store.len(), 1);
        assert_eq!(store.entities()[0].id, "j1");
        assert_eq!(store.last_error(), Some("connection refused"));
        assert!(!store.loading().any());
    }

    #[tokio::test]
    async fn test_create_prepends_without_refetch() {
        let stub = StubJobs::seeded(vec![job("j1", "Backend Engineer")]);
        let mut store = Store::new("jobs", stub);
        store.fetch_all(&ListQuery::default()).await.unwrap();
        assert_eq!(store.gateway.list_calls.load(Ordering::SeqCst), 1);

        store.create(&payload("Data Engineer")).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.entities()[0].title, "Data Engineer");
        // The write did not trigger a list call
        assert_eq!(store.gateway.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_collection_untouched() {
        let stub = StubJobs::seeded(vec![job("j1", "Backend Engineer")]);
        let mut store = Store::new("jobs", stub);
        store.fetch_all(&ListQuery::default()).await.unwrap();

        store.gateway.fail_next(ApiError::Status {
            status: 422,
            message: Some("title is required".to_string()),
            context: "POST /jobs".to_string(),
        });
        store.create(&payload("")).await.unwrap_err();

        assert_eq!(store.len(), 1);
        assert_eq!(store.last_error(), Some("title is required"));
    }

    #[tokio::test]
    async fn test_update_replaces_in_place_preserving_order() {
        let stub = StubJobs::seeded(vec![
            job("j1", "Backend Engineer"),
            job("j2", "Frontend Engineer"),
            job("j3", "QA Engineer"),
        ]);
        let mut store = Store::new("jobs", stub);
        store.fetch_all(&ListQuery::default()).await.unwrap();

        store.update("j2", &payload("Platform Engineer")).await.unwrap();

        let ids: Vec<&str> = store.entities().iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["j1", "j2", "j3"]);
        assert_eq!(store.entities()[1].title, "Platform Engineer");
    }

    #[tokio::test]
    async fn test_delete_removes_entity_and_clears_prior_error() {
        let stub = StubApps {
            items: Mutex::new(vec![app("a1"), app("a2")]),
        };
        let mut store = Store::new("applications", stub);
        store.fetch_all(&ListQuery::default()).await.unwrap();
        store.last_error = Some("previous failure".to_string());

        store.delete("a1").await.unwrap();

        let ids: Vec<&str> = store.entities().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a2"]);
        assert_eq!(store.last_error(), None);
    }

    #[tokio::test]
    async fn test_stale_fetch_response_is_discarded() {
        let stub = StubJobs::seeded(vec![job("j1", "Backend Engineer")]);
        let mut store = Store::new("jobs", stub);

        // An old in-flight fetch completing after a newer one started must
        // not overwrite the newer result.
        let stale_epoch = store.begin_fetch();
        let stale_page = Page {
            items: vec![job("old", "Stale Job")],
            total: 1,
            page: 1,
            limit: 1,
        };

        let fresh_epoch = store.begin_fetch();
        let fresh_page = Page {
            items: vec![job("new", "Fresh Job")],
            total: 1,
            page: 1,
            limit: 1,
        };
        store.finish_fetch(fresh_epoch, Ok(fresh_page)).unwrap();
        store.finish_fetch(stale_epoch, Ok(stale_page)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.entities()[0].id, "new");
    }

    #[tokio::test]
    async fn test_error_fallback_message_when_server_sends_none() {
        let stub = StubJobs::seeded(vec![]);
        let mut store = Store::new("jobs", stub);
        store.gateway.fail_next(ApiError::Status {
            status: 500,
            message: None,
            context: "GET /jobs".to_string(),
        });

        store.fetch_all(&ListQuery::default()).await.unwrap_err();
        assert_eq!(store.last_error(), Some("Failed to load jobs"));
    }

    #[tokio::test]
    async fn test_store_events_published() {
        let stub = StubJobs::seeded(vec![job("j1", "Backend Engineer")]);
        let mut store = Store::new("jobs", stub);
        let mut events = store.subscribe();

        store.fetch_all(&ListQuery::default()).await.unwrap();
        store.create(&payload("Data Engineer")).await.unwrap();
        store.delete("j1").await.unwrap();

        assert!(matches!(events.try_recv().unwrap(), StoreEvent::Replaced { count: 1 }));
        assert!(matches!(events.try_recv().unwrap(), StoreEvent::Created { .. }));
        assert!(matches!(events.try_recv().unwrap(), StoreEvent::Deleted { .. }));
    }
}
