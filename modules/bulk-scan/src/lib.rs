//! Running the discovery pipeline across many targets.
//!
//! Each target gets its own task, gated by a semaphore and an optional QPS
//! limiter. Tasks never share a transaction or any mutable state besides
//! the atomic counters; outcomes flow back over one channel.

pub mod report;
pub mod targets;

use inventory_core::ratelimiter::RateLimiter;
use inventory_core::{
    AuditedStore, BulkScanResult, ChangeContext, DiscoveryMethod, DiscoverySession, EngineError, FactSource, Outcome,
    Target, TargetOutcome, ValidationError,
};
use rand::{thread_rng, Rng};
use reconcile::{apply, scan_one, Applied, Selection};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{info, info_span, warn, Instrument};

pub use report::write_failure_report;
pub use targets::{parse_targets, read_target_file};

#[derive(Debug, Clone)]
pub struct BulkScanConfig {
    /// Targets processed at once.
    pub concurrency: usize,
    /// Collection starts per second; `None` disables pacing.
    pub qps: Option<u32>,
    /// Extra collection attempts after an unreachable or timed-out target.
    pub retries: u32,
    pub retry_delay: Duration,
    /// Where the failure report is written.
    pub report_dir: PathBuf,
}

impl Default for BulkScanConfig {
    fn default() -> Self {
        BulkScanConfig {
            concurrency: 4,
            qps: None,
            retries: 0,
            retry_delay: Duration::from_millis(500),
            report_dir: PathBuf::from("."),
        }
    }
}

/// One bulk run: what to scan, who asked, and why.
#[derive(Debug, Clone)]
pub struct BulkRequest {
    pub targets: Vec<Target>,
    pub actor: String,
    pub session: DiscoverySession,
    pub reason: String,
}

#[derive(Default)]
struct Counters {
    added: AtomicUsize,
    updated: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn bump(&self, outcome: Outcome) {
        let c = match outcome {
            Outcome::Added => &self.added,
            Outcome::Updated => &self.updated,
            Outcome::Skipped => &self.skipped,
            Outcome::Failed => &self.failed,
        };
        c.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle for cancelling a running bulk scan.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle(Arc::new(tx)), rx)
    }

    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        let flag = *rx.borrow_and_update();
        if flag {
            return;
        }
        if rx.changed().await.is_err() {
            // sender gone: nobody can cancel any more
            std::future::pending::<()>().await;
        }
    }
}

fn backoff(attempt: u32, base: Duration) -> Duration {
    let base = base.as_millis() as u64;
    let exp = base.saturating_mul(1u64 << attempt.min(6));
    let jitter = thread_rng().gen_range(0..(exp / 4 + 1));
    Duration::from_millis(exp + jitter)
}

struct Worker {
    source: Arc<dyn FactSource>,
    store: Arc<dyn AuditedStore>,
    limiter: Option<RateLimiter>,
    retries: u32,
    retry_delay: Duration,
    ctx: ChangeContext,
}

impl Worker {
    async fn process(&self, target: &Target) -> Result<Outcome, EngineError> {
        let mut attempt = 0;
        let comparison = loop {
            if let Some(l) = &self.limiter {
                l.acquire().await;
            }
            match scan_one(self.source.as_ref(), self.store.as_ref(), target).await {
                Ok(c) => break c,
                Err(EngineError::Collection(e)) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "retrying collection");
                    tokio::time::sleep(backoff(attempt, self.retry_delay)).await;
                }
                Err(e) => return Err(e),
            }
        };
        let applied = apply(self.store.as_ref(), &comparison, &Selection::All, DiscoveryMethod::BulkScan, &self.ctx)?;
        Ok(match applied {
            Applied::Added(_) => Outcome::Added,
            Applied::Updated(_) => Outcome::Updated,
            Applied::Unchanged => Outcome::Skipped,
        })
    }
}

/// Scan every target, isolating failures per target.
///
/// Fails up front only when the run itself is malformed: a blank reason
/// or an empty target list. After that every target ends up in the result
/// exactly once, in input order, and failures are written to a report file
/// in `config.report_dir`.
pub async fn run_bulk_scan(
    source: Arc<dyn FactSource>,
    store: Arc<dyn AuditedStore>,
    request: BulkRequest,
    config: &BulkScanConfig,
    cancel: watch::Receiver<bool>,
) -> Result<BulkScanResult, EngineError> {
    let BulkRequest { targets, actor, session, reason } = request;
    if reason.trim().is_empty() {
        return Err(EngineError::ChangeReasonRequired { action: "bulk scan" });
    }
    let mut seen = HashSet::new();
    let targets: Vec<Target> = targets.into_iter().filter(|t| seen.insert(t.clone())).collect();
    if targets.is_empty() {
        return Err(ValidationError::EmptyTargetList.into());
    }

    let started = Instant::now();
    let total = targets.len();
    info!(%session, total, concurrency = config.concurrency, "bulk scan started");

    let worker = Arc::new(Worker {
        source,
        store,
        limiter: config.qps.filter(|q| *q > 0).map(RateLimiter::new),
        retries: config.retries,
        retry_delay: config.retry_delay,
        ctx: ChangeContext::new(actor, Some(session), reason.clone()),
    });
    let sem = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let counters = Arc::new(Counters::default());
    let (tx, mut rx) = mpsc::channel::<(usize, TargetOutcome)>(total);
    let names: Vec<String> = targets.iter().map(Target::to_string).collect();

    for (idx, target) in targets.into_iter().enumerate() {
        let tx = tx.clone();
        let sem = sem.clone();
        let worker = worker.clone();
        let counters = counters.clone();
        let mut cancel = cancel.clone();
        let span = info_span!("target", target = %target, session = %session);
        tokio::spawn(
            async move {
                let run = async {
                    let _permit = sem.acquire_owned().await.map_err(|_| EngineError::Cancelled)?;
                    worker.process(&target).await
                };
                let res = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel) => Err(EngineError::Cancelled),
                    r = run => r,
                };
                let outcome = match res {
                    Ok(o) => {
                        info!(outcome = %o, "target done");
                        TargetOutcome { target: target.to_string(), outcome: o, error: None }
                    }
                    Err(e) => {
                        warn!(error = %e, "target failed");
                        if let Err(store_err) = worker.store.record_scan_error(session, target.as_str(), e.code(), &e.to_string()) {
                            warn!(error = %store_err, "could not record scan error");
                        }
                        TargetOutcome { target: target.to_string(), outcome: Outcome::Failed, error: Some(e.to_string()) }
                    }
                };
                counters.bump(outcome.outcome);
                let _ = tx.send((idx, outcome)).await;
            }
            .instrument(span),
        );
    }
    drop(tx);

    let mut results = Vec::with_capacity(total);
    while let Some(r) = rx.recv().await {
        results.push(r);
    }
    // a task that panicked never reports
    if results.len() < total {
        let reported: HashSet<usize> = results.iter().map(|(i, _)| *i).collect();
        for (idx, name) in names.into_iter().enumerate().filter(|(i, _)| !reported.contains(i)) {
            warn!(target = %name, "worker ended without reporting");
            counters.bump(Outcome::Failed);
            let error = Some("worker ended without reporting".to_string());
            results.push((idx, TargetOutcome { target: name, outcome: Outcome::Failed, error }));
        }
    }
    results.sort_by_key(|(i, _)| *i);
    let results: Vec<TargetOutcome> = results.into_iter().map(|(_, o)| o).collect();

    let failed: Vec<&TargetOutcome> = results.iter().filter(|o| o.outcome == Outcome::Failed).collect();
    let (failure_report, failure_report_error) = if failed.is_empty() {
        (None, None)
    } else {
        match write_failure_report(&config.report_dir, session, &reason, &failed) {
            Ok(p) => (Some(p), None),
            Err(e) => {
                warn!(error = %e, dir = %config.report_dir.display(), "could not write failure report");
                (None, Some(format!("{}: {e}", config.report_dir.display())))
            }
        }
    };

    let result = BulkScanResult {
        session,
        total,
        added: counters.added.load(Ordering::Relaxed),
        updated: counters.updated.load(Ordering::Relaxed),
        skipped: counters.skipped.load(Ordering::Relaxed),
        failed: counters.failed.load(Ordering::Relaxed),
        results,
        duration_ms: started.elapsed().as_millis(),
        failure_report,
        failure_report_error,
    };
    info!(
        %session,
        added = result.added,
        updated = result.updated,
        skipped = result.skipped,
        failed = result.failed,
        duration_ms = result.duration_ms as u64,
        "bulk scan finished"
    );
    Ok(result)
}
