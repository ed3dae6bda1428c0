//! In-memory mocks for the source, store, transport and clock ports.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use healthhook_core::{
    Clock, DeliveryLogStore, MetricSource, SettingsStore, WebhookResponse, WebhookTransport,
};
use healthhook_domain::constants::DEFAULT_SYNC_INTERVAL_MINUTES;
use healthhook_domain::{
    AttemptFailure, DeliveryLog, DeliveryLogEntry, LastSync, MetricRecord, MetricType,
    Result as DomainResult, ScheduledTrigger, SourceAvailability, SourceError, SyncMode,
    SyncModeKind, WebhookEndpoint,
};

/// Scriptable health data source.
///
/// Returns the seeded records newer than `since` and remembers every call.
pub struct MockSource {
    availability: Mutex<SourceAvailability>,
    granted: Mutex<BTreeSet<MetricType>>,
    records: Mutex<BTreeMap<MetricType, Vec<MetricRecord>>>,
    failures: Mutex<BTreeMap<MetricType, SourceError>>,
    fetches: Mutex<Vec<(MetricType, DateTime<Utc>)>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            availability: Mutex::new(SourceAvailability::Available),
            granted: Mutex::new(MetricType::ALL.iter().copied().collect()),
            records: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(BTreeMap::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn set_availability(&self, availability: SourceAvailability) {
        *self.availability.lock().unwrap() = availability;
    }

    pub fn grant_only(&self, metrics: &[MetricType]) {
        *self.granted.lock().unwrap() = metrics.iter().copied().collect();
    }

    pub fn push_records(&self, metric: MetricType, records: Vec<MetricRecord>) {
        self.records.lock().unwrap().entry(metric).or_default().extend(records);
    }

    pub fn fail_fetch(&self, metric: MetricType, error: SourceError) {
        self.failures.lock().unwrap().insert(metric, error);
    }

    pub fn fetches(&self) -> Vec<(MetricType, DateTime<Utc>)> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl MetricSource for MockSource {
    async fn availability(&self) -> SourceAvailability {
        *self.availability.lock().unwrap()
    }

    async fn granted_capabilities(&self) -> BTreeSet<MetricType> {
        self.granted.lock().unwrap().clone()
    }

    async fn fetch_records(
        &self,
        metric: MetricType,
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricRecord>, SourceError> {
        self.fetches.lock().unwrap().push((metric, since));
        if let Some(error) = self.failures.lock().unwrap().get(&metric) {
            return Err(error.clone());
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&metric)
            .map(|records| records.iter().filter(|r| r.recorded_at > since).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct StoreState {
    endpoints: Vec<WebhookEndpoint>,
    enabled: BTreeSet<MetricType>,
    mode: SyncModeKind,
    interval_minutes: Option<u32>,
    triggers: Vec<ScheduledTrigger>,
    checkpoints: BTreeMap<MetricType, DateTime<Utc>>,
    last_sync: Option<LastSync>,
    log: DeliveryLog,
    checkpoint_writes: usize,
}

/// Settings and delivery log store held in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_endpoints(&self, urls: &[&str]) {
        self.state.lock().unwrap().endpoints =
            urls.iter().map(|url| WebhookEndpoint::from_url(*url)).collect();
    }

    pub fn seed_endpoint(&self, endpoint: WebhookEndpoint) {
        self.state.lock().unwrap().endpoints.push(endpoint);
    }

    pub fn seed_enabled(&self, metrics: &[MetricType]) {
        self.state.lock().unwrap().enabled = metrics.iter().copied().collect();
    }

    pub fn seed_checkpoint(&self, metric: MetricType, at: DateTime<Utc>) {
        self.state.lock().unwrap().checkpoints.insert(metric, at);
    }

    pub fn seed_mode(&self, mode: SyncMode) {
        let mut state = self.state.lock().unwrap();
        state.mode = mode.kind();
        if let SyncMode::Interval { period_minutes } = mode {
            state.interval_minutes = Some(period_minutes);
        }
    }

    pub fn seed_triggers(&self, triggers: Vec<ScheduledTrigger>) {
        self.state.lock().unwrap().triggers = triggers;
    }

    pub fn checkpoints(&self) -> BTreeMap<MetricType, DateTime<Utc>> {
        self.state.lock().unwrap().checkpoints.clone()
    }

    pub fn checkpoint_writes(&self) -> usize {
        self.state.lock().unwrap().checkpoint_writes
    }

    pub fn log_entries(&self) -> Vec<DeliveryLogEntry> {
        self.state.lock().unwrap().log.to_vec()
    }

    pub fn stored_last_sync(&self) -> Option<LastSync> {
        self.state.lock().unwrap().last_sync.clone()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn endpoints(&self) -> DomainResult<Vec<WebhookEndpoint>> {
        Ok(self.state.lock().unwrap().endpoints.clone())
    }

    async fn set_endpoints(&self, endpoints: &[WebhookEndpoint]) -> DomainResult<()> {
        self.state.lock().unwrap().endpoints = endpoints.to_vec();
        Ok(())
    }

    async fn enabled_metric_types(&self) -> DomainResult<BTreeSet<MetricType>> {
        Ok(self.state.lock().unwrap().enabled.clone())
    }

    async fn set_enabled_metric_types(&self, types: &BTreeSet<MetricType>) -> DomainResult<()> {
        self.state.lock().unwrap().enabled = types.clone();
        Ok(())
    }

    async fn sync_mode(&self) -> DomainResult<SyncMode> {
        let state = self.state.lock().unwrap();
        Ok(match state.mode {
            SyncModeKind::Interval => SyncMode::Interval {
                period_minutes: state.interval_minutes.unwrap_or(DEFAULT_SYNC_INTERVAL_MINUTES),
            },
            SyncModeKind::Scheduled => SyncMode::Scheduled,
        })
    }

    async fn set_sync_mode(&self, mode: &SyncMode) -> DomainResult<()> {
        self.seed_mode(*mode);
        Ok(())
    }

    async fn sync_interval_minutes(&self) -> DomainResult<u32> {
        Ok(self.state.lock().unwrap().interval_minutes.unwrap_or(DEFAULT_SYNC_INTERVAL_MINUTES))
    }

    async fn set_sync_interval_minutes(&self, minutes: u32) -> DomainResult<()> {
        self.state.lock().unwrap().interval_minutes = Some(minutes);
        Ok(())
    }

    async fn scheduled_triggers(&self) -> DomainResult<Vec<ScheduledTrigger>> {
        Ok(self.state.lock().unwrap().triggers.clone())
    }

    async fn set_scheduled_triggers(&self, triggers: &[ScheduledTrigger]) -> DomainResult<()> {
        self.state.lock().unwrap().triggers = triggers.to_vec();
        Ok(())
    }

    async fn checkpoint(&self, metric: MetricType) -> DomainResult<Option<DateTime<Utc>>> {
        Ok(self.state.lock().unwrap().checkpoints.get(&metric).copied())
    }

    async fn set_checkpoint(&self, metric: MetricType, at: DateTime<Utc>) -> DomainResult<()> {
        let mut state = self.state.lock().unwrap();
        state.checkpoints.insert(metric, at);
        state.checkpoint_writes += 1;
        Ok(())
    }

    async fn last_sync(&self) -> DomainResult<Option<LastSync>> {
        Ok(self.state.lock().unwrap().last_sync.clone())
    }

    async fn set_last_sync(&self, last: &LastSync) -> DomainResult<()> {
        self.state.lock().unwrap().last_sync = Some(last.clone());
        Ok(())
    }
}

#[async_trait]
impl DeliveryLogStore for MemoryStore {
    async fn append_delivery_log(&self, entry: DeliveryLogEntry) -> DomainResult<()> {
        self.state.lock().unwrap().log.push(entry);
        Ok(())
    }

    async fn delivery_logs(&self) -> DomainResult<Vec<DeliveryLogEntry>> {
        Ok(self.state.lock().unwrap().log.to_vec())
    }

    async fn clear_delivery_logs(&self) -> DomainResult<()> {
        self.state.lock().unwrap().log.clear();
        Ok(())
    }
}

/// One POST observed by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: serde_json::Value,
    pub at: tokio::time::Instant,
}

/// Transport answering from per-URL scripts; unscripted URLs get `200 OK`.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<BTreeMap<String, VecDeque<Result<WebhookResponse, AttemptFailure>>>>,
    fallback: Mutex<BTreeMap<String, Result<WebhookResponse, AttemptFailure>>>,
    posts: Mutex<Vec<RecordedPost>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request to `url` with `status`.
    pub fn respond_always(&self, url: &str, status: u16) {
        self.fallback.lock().unwrap().insert(url.to_string(), Ok(WebhookResponse::new(status, "")));
    }

    /// Fail every request to `url` at the transport level.
    pub fn fail_always(&self, url: &str, failure: AttemptFailure) {
        self.fallback.lock().unwrap().insert(url.to_string(), Err(failure));
    }

    /// Queue one-off answers for `url`, consumed before the fallback.
    pub fn script(&self, url: &str, answers: Vec<Result<WebhookResponse, AttemptFailure>>) {
        self.scripts.lock().unwrap().entry(url.to_string()).or_default().extend(answers);
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }

    pub fn posts_to(&self, url: &str) -> Vec<RecordedPost> {
        self.posts().into_iter().filter(|post| post.url == url).collect()
    }
}

#[async_trait]
impl WebhookTransport for MockTransport {
    async fn post_json(
        &self,
        endpoint: &WebhookEndpoint,
        body: &[u8],
    ) -> Result<WebhookResponse, AttemptFailure> {
        self.posts.lock().unwrap().push(RecordedPost {
            url: endpoint.url.clone(),
            headers: endpoint.headers.clone(),
            body: serde_json::from_slice(body).unwrap(),
            at: tokio::time::Instant::now(),
        });

        if let Some(answer) =
            self.scripts.lock().unwrap().get_mut(&endpoint.url).and_then(VecDeque::pop_front)
        {
            return answer;
        }
        self.fallback
            .lock()
            .unwrap()
            .get(&endpoint.url)
            .cloned()
            .unwrap_or_else(|| Ok(WebhookResponse::new(200, "OK")))
    }
}

/// Clock that only moves when told to.
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}
