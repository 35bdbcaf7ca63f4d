use crate::backend::{BackendError, InventoryClient, ValuationClient};
use crate::domain::asset::AssetClass;
use crate::domain::radar::RadarRecord;
use crate::radar::profile::{RadarProfile, ScanMode};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

const DEFAULT_REQ_DELAY_MS: u64 = 10;
const DEFAULT_PROGRESS_EVERY: usize = 50;
const DEFAULT_MAX_LOGGED_FAILURES: usize = 10;
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub category: String,
    pub ticker: String,
}

impl ScanTarget {
    pub fn new(category: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ticker: ticker.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub processed: usize,
    pub total: usize,
}

impl ScanProgress {
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }

    /// Completion percentage. An empty scan is 100% done.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }
}

/// What the scanner publishes, in order: `Started`, then per ticker an optional `Record` followed
/// by `Progress`, then `Completed`. `Failed` replaces all of it when enumeration fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    Started {
        session_id: Uuid,
        total: usize,
    },
    Record {
        category: String,
        record: RadarRecord,
    },
    Progress {
        processed: usize,
        total: usize,
    },
    Completed {
        processed: usize,
        total: usize,
        failures: usize,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub mode: ScanMode,
    /// Pause between two valuation requests; courtesy to the backend.
    pub req_delay: Duration,
    /// Log an info line every N processed tickers (0 disables).
    pub progress_every: usize,
    pub max_logged_failures: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            mode: ScanMode::Full,
            req_delay: Duration::from_millis(DEFAULT_REQ_DELAY_MS),
            progress_every: DEFAULT_PROGRESS_EVERY,
            max_logged_failures: DEFAULT_MAX_LOGGED_FAILURES,
        }
    }
}

impl ScanOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("RADAR_REQ_DELAY_MS") {
            if let Ok(n) = s.parse::<u64>() {
                out.req_delay = Duration::from_millis(n);
            }
        }

        if let Ok(s) = std::env::var("RADAR_PROGRESS_EVERY") {
            if let Ok(n) = s.parse::<usize>() {
                out.progress_every = n;
            }
        }

        out
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Fetches the valuation of one scan target. Supplied by the caller so the scanner stays
/// independent of the transport.
#[async_trait::async_trait]
pub trait ValuationFetcher: Send + Sync {
    async fn fetch_one(&self, target: &ScanTarget) -> Result<RadarRecord>;
}

/// Adapts a [`ValuationClient`] to one asset class.
pub struct ClassFetcher<C> {
    client: Arc<C>,
    class: AssetClass,
}

impl<C> ClassFetcher<C> {
    pub fn new(client: Arc<C>, class: AssetClass) -> Self {
        Self { client, class }
    }
}

#[async_trait::async_trait]
impl<C: ValuationClient + 'static> ValuationFetcher for ClassFetcher<C> {
    async fn fetch_one(&self, target: &ScanTarget) -> Result<RadarRecord> {
        self.client.fetch_valuation(self.class, &target.ticker).await
    }
}

/// Shared teardown flag. Once set, the scanner schedules no more fetches and drops any response
/// that arrives afterwards.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed {
        progress: ScanProgress,
        failures: usize,
    },
    Cancelled {
        progress: ScanProgress,
    },
}

/// Fetches every target in order, one request at a time, publishing each retained record as
/// soon as it arrives.
///
/// A failing ticker is logged, counted as processed and skipped. The scan stops early when
/// `cancel` is set or the receiving side of `sink` is gone.
pub async fn scan(
    targets: Vec<ScanTarget>,
    fetcher: &dyn ValuationFetcher,
    opts: &ScanOptions,
    cancel: &CancelFlag,
    sink: &mpsc::Sender<ScanEvent>,
) -> ScanOutcome {
    let total = targets.len();
    let mut progress = ScanProgress {
        processed: 0,
        total,
    };
    let mut retained: usize = 0;
    let mut failures: usize = 0;
    let mut logged_failures: usize = 0;

    for (idx, target) in targets.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return ScanOutcome::Cancelled { progress };
        }

        if idx != 0 && !opts.req_delay.is_zero() {
            tokio::time::sleep(opts.req_delay).await;
        }

        let result = fetcher.fetch_one(&target).await;

        // Response arrived after teardown: nobody may observe it.
        if cancel.is_cancelled() {
            return ScanOutcome::Cancelled { progress };
        }

        match result {
            Ok(record) => {
                if opts.mode.retains(&record) {
                    retained += 1;
                    let event = ScanEvent::Record {
                        category: target.category.clone(),
                        record,
                    };
                    if sink.send(event).await.is_err() {
                        return ScanOutcome::Cancelled { progress };
                    }
                }
            }
            Err(err) => {
                failures += 1;
                if logged_failures < opts.max_logged_failures {
                    tracing::warn!(
                        idx,
                        ticker = %target.ticker,
                        category = %target.category,
                        failure_count = failures,
                        error = %err,
                        "radar fetch failed; skipping ticker"
                    );
                    logged_failures += 1;
                }
            }
        }

        progress.processed += 1;
        let tick = ScanEvent::Progress {
            processed: progress.processed,
            total,
        };
        if sink.send(tick).await.is_err() {
            return ScanOutcome::Cancelled { progress };
        }

        if opts.progress_every != 0 {
            let n = progress.processed;
            if n == 1 || n == total || n % opts.progress_every == 0 {
                tracing::info!(
                    processed = n,
                    total,
                    retained,
                    failures,
                    "radar scan progress"
                );
            }
        }
    }

    let done = ScanEvent::Completed {
        processed: progress.processed,
        total,
        failures,
    };
    if sink.send(done).await.is_err() {
        return ScanOutcome::Cancelled { progress };
    }

    ScanOutcome::Completed { progress, failures }
}

/// Lists the tickers of each category, in category order. Any category failure aborts.
pub async fn enumerate_targets(
    inventory: &dyn InventoryClient,
    categories: &[String],
) -> Result<Vec<ScanTarget>> {
    let mut out = Vec::new();
    for category in categories {
        let tickers = inventory.list_tickers(category).await?;
        tracing::debug!(%category, tickers = tickers.len(), "enumerated category");
        out.extend(tickers.into_iter().map(|t| ScanTarget::new(category.clone(), t)));
    }
    Ok(out)
}

/// A running scan. Dropping the handle tears the scan down.
#[derive(Debug)]
pub struct ScanHandle {
    session_id: Uuid,
    events: mpsc::Receiver<ScanEvent>,
    cancel: CancelFlag,
    task: JoinHandle<()>,
}

impl ScanHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Next event, or `None` once the scan finished (or was cancelled) and the buffer is drained.
    pub async fn next_event(&mut self) -> Option<ScanEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.events.recv().await
    }

    /// Stops scheduling fetches and discards anything still buffered or in flight.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.task.abort();
        self.events.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// Spawns enumerate-then-scan for one radar profile.
///
/// `categories` overrides the profile's default selection (every category the backend lists
/// that belongs to the profile's asset class).
pub fn start_scan<B>(
    backend: Arc<B>,
    profile: &RadarProfile,
    categories: Option<Vec<String>>,
    opts: ScanOptions,
) -> ScanHandle
where
    B: InventoryClient + ValuationClient + 'static,
{
    let session_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let cancel = CancelFlag::default();
    let opts = opts.with_mode(profile.mode);
    let profile = profile.clone();

    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        let targets = match resolve_targets(backend.as_ref(), &profile, categories).await {
            Ok(t) => t,
            Err(err) => {
                tracing::error!(%session_id, error = %err, "radar enumeration failed");
                if !task_cancel.is_cancelled() {
                    let _ = tx
                        .send(ScanEvent::Failed {
                            message: err.to_string(),
                        })
                        .await;
                }
                return;
            }
        };

        if task_cancel.is_cancelled() {
            return;
        }

        tracing::info!(
            %session_id,
            asset_class = %profile.asset_class,
            mode = ?opts.mode,
            total = targets.len(),
            "radar scan started"
        );
        if tx
            .send(ScanEvent::Started {
                session_id,
                total: targets.len(),
            })
            .await
            .is_err()
        {
            return;
        }

        let fetcher = ClassFetcher::new(backend, profile.asset_class);
        let outcome = scan(targets, &fetcher, &opts, &task_cancel, &tx).await;
        match outcome {
            ScanOutcome::Completed { progress, failures } => tracing::info!(
                %session_id,
                processed = progress.processed,
                total = progress.total,
                failures,
                "radar scan completed"
            ),
            ScanOutcome::Cancelled { progress } => tracing::info!(
                %session_id,
                processed = progress.processed,
                total = progress.total,
                "radar scan cancelled"
            ),
        }
    });

    ScanHandle {
        session_id,
        events: rx,
        cancel,
        task,
    }
}

async fn resolve_targets<B>(
    backend: &B,
    profile: &RadarProfile,
    categories: Option<Vec<String>>,
) -> Result<Vec<ScanTarget>>
where
    B: InventoryClient,
{
    let categories = match categories {
        Some(requested) => {
            let known = backend.list_categories().await?;
            known_categories(&requested, &known)?
        }
        None if profile.asset_class == AssetClass::Acoes => profile.categories(&[]),
        None => {
            let all = backend.list_categories().await?;
            profile.categories(&all)
        }
    };
    enumerate_targets(backend, &categories).await
}

/// Maps requested categories onto the backend's spelling. The first unknown one is `NotFound`.
fn known_categories(requested: &[String], known: &[String]) -> Result<Vec<String>> {
    requested
        .iter()
        .map(|wanted| {
            known
                .iter()
                .find(|k| k.trim().eq_ignore_ascii_case(wanted.trim()))
                .cloned()
                .ok_or_else(|| BackendError::not_found(wanted, None).into())
        })
        .collect()
}
