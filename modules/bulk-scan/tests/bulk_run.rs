use async_trait::async_trait;
use bulk_scan::{parse_targets, run_bulk_scan, BulkRequest, BulkScanConfig, CancelHandle};
use inventory_core::{
    AuditAction, AuditedStore, CollectionError, DeviceStore, DiscoverySession, EngineError, FactSource, Gathered,
    MemoryModule, Outcome, RawAdapter, RawFacts, Target,
};
use inventory_sqlite::Db;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Every target answers with a healthy workstation named after itself,
/// except those listed as down.
struct Fleet {
    down: HashSet<String>,
    calls: AtomicUsize,
    delay: Duration,
    seen_at: &'static str,
}

impl Fleet {
    fn new(down: &[&str]) -> Self {
        Fleet { down: down.iter().map(|s| s.to_string()).collect(), calls: AtomicUsize::new(0), delay: Duration::ZERO, seen_at: "2026-10-15T08:00:00Z" }
    }
}

#[async_trait]
impl FactSource for Fleet {
    async fn collect(&self, target: &Target) -> Result<RawFacts, CollectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.down.contains(target.as_str()) {
            return Err(CollectionError::Unreachable { target: target.to_string(), detail: "Connection refused".into() });
        }
        let gb8 = MemoryModule { capacity: "8 GB".into(), ..Default::default() };
        Ok(RawFacts {
            target: target.clone(),
            computer_name: target.as_str().to_uppercase(),
            hardware: Gathered::Unavailable("no dmi".into()),
            memory: Gathered::Available(vec![gb8.clone(), gb8]),
            storage: Gathered::Available(Vec::new()),
            os: Gathered::Unavailable("no os-release".into()),
            network: Gathered::Available(vec![RawAdapter {
                name: "eth0".into(),
                ip_address: "10.0.0.5".into(),
                connected: true,
                ..Default::default()
            }]),
            domain: Gathered::Available("WORKGROUP".into()),
            collected_at: self.seen_at.into(),
        })
    }
}

fn request(list: &str, reason: &str) -> BulkRequest {
    BulkRequest {
        targets: parse_targets(list).unwrap(),
        actor: "alice".into(),
        session: DiscoverySession::new(),
        reason: reason.into(),
    }
}

fn config(dir: &std::path::Path) -> BulkScanConfig {
    BulkScanConfig { concurrency: 2, report_dir: dir.to_path_buf(), ..Default::default() }
}

#[tokio::test]
async fn one_unreachable_host_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Db::open_in_memory().unwrap());
    let source = Arc::new(Fleet::new(&["wks-03"]));
    let req = request("wks-01\nwks-02\nwks-03\nwks-04\nwks-05\n", "quarterly inventory");
    let session = req.session;
    let (_cancel, rx) = CancelHandle::new();

    let res = run_bulk_scan(source, db.clone(), req, &config(dir.path()), rx).await.unwrap();

    assert_eq!(res.total, 5);
    assert_eq!((res.added, res.failed, res.succeeded()), (4, 1, 4));
    let order: Vec<&str> = res.results.iter().map(|o| o.target.as_str()).collect();
    assert_eq!(order, vec!["wks-01", "wks-02", "wks-03", "wks-04", "wks-05"]);
    assert_eq!(res.results[2].outcome, Outcome::Failed);
    assert!(res.results[2].error.as_deref().unwrap().contains("unreachable"));

    for h in ["WKS-01", "WKS-02", "WKS-04", "WKS-05"] {
        let rec = db.get_by_hostname(h).unwrap().unwrap_or_else(|| panic!("{h} not persisted"));
        assert_eq!(rec.total_ram_gb, Some(16.0));
    }
    assert_eq!(db.get_by_hostname("WKS-03").unwrap(), None);

    let report = res.failure_report.expect("report written");
    let text = std::fs::read_to_string(&report).unwrap();
    assert!(text.contains("wks-03  # "));
    assert_eq!(parse_targets(&text).unwrap(), vec![Target::parse("wks-03").unwrap()]);

    let errors = db.scan_errors(session).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, "collection");

    let audit = db.audit_for_session(session).unwrap();
    assert_eq!(audit.len(), 4);
    assert!(audit.iter().all(|e| e.reason.as_deref() == Some("quarterly inventory")));
}

#[tokio::test]
async fn second_run_skips_unchanged_hosts_without_report() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Db::open_in_memory().unwrap());
    let source = Arc::new(Fleet::new(&[]));
    let (_cancel, rx) = CancelHandle::new();
    run_bulk_scan(source.clone(), db.clone(), request("wks-01,wks-02", "first"), &config(dir.path()), rx.clone())
        .await
        .unwrap();

    let req = request("wks-01;wks-02;wks-01", "second");
    let session = req.session;
    let res = run_bulk_scan(source, db.clone(), req, &config(dir.path()), rx).await.unwrap();
    assert_eq!((res.total, res.skipped, res.added, res.updated), (2, 2, 0, 0));
    assert_eq!(res.failure_report, None);
    let audit = db.audit_for_session(session).unwrap();
    assert!(audit.iter().all(|e| e.action == AuditAction::Discover));
    assert_eq!(db.list().unwrap().len(), 2);
}

#[tokio::test]
async fn changed_host_is_updated_with_the_run_reason() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Db::open_in_memory().unwrap());
    let (_cancel, rx) = CancelHandle::new();
    run_bulk_scan(Arc::new(Fleet::new(&[])), db.clone(), request("wks-01", "seed"), &config(dir.path()), rx.clone())
        .await
        .unwrap();
    let mut rec = db.get_by_hostname("WKS-01").unwrap().unwrap();
    rec.total_ram_gb = Some(8.0);
    db.update(&rec, &inventory_core::ChangeContext::new("bob", None, "manual edit")).unwrap();

    let req = request("wks-01", "RAM upgraded");
    let session = req.session;
    let res = run_bulk_scan(Arc::new(Fleet::new(&[])), db.clone(), req, &config(dir.path()), rx).await.unwrap();
    assert_eq!(res.updated, 1);
    let rows = db.audit_for_session(session).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].field_name.as_deref(), Some("TotalRamGb"));
    assert_eq!((rows[0].old_value.as_deref(), rows[0].new_value.as_deref()), (Some("8"), Some("16")));
}

#[tokio::test]
async fn blank_reason_or_empty_list_is_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Db::open_in_memory().unwrap());
    let source = Arc::new(Fleet::new(&[]));
    let (_cancel, rx) = CancelHandle::new();

    let err = run_bulk_scan(source.clone(), db.clone(), request("wks-01", " "), &config(dir.path()), rx.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ChangeReasonRequired { .. }));

    let mut req = request("wks-01", "why");
    req.targets.clear();
    let err = run_bulk_scan(source.clone(), db.clone(), req, &config(dir.path()), rx).await.unwrap_err();
    assert_eq!(err.code(), "validation");
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(db.list().unwrap().is_empty());
}

#[tokio::test]
async fn transient_failures_are_retried() {
    struct Flaky(AtomicUsize);

    #[async_trait]
    impl FactSource for Flaky {
        async fn collect(&self, target: &Target) -> Result<RawFacts, CollectionError> {
            if self.0.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(CollectionError::TimedOut { target: target.to_string(), after_ms: 10 });
            }
            Fleet::new(&[]).collect(target).await
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Db::open_in_memory().unwrap());
    let flaky = Arc::new(Flaky(AtomicUsize::new(0)));
    let cfg = BulkScanConfig { retries: 2, retry_delay: Duration::from_millis(1), ..config(dir.path()) };
    let (_cancel, rx) = CancelHandle::new();
    let res = run_bulk_scan(flaky.clone(), db, request("wks-01", "retry"), &cfg, rx).await.unwrap();
    assert_eq!(res.added, 1);
    assert_eq!(flaky.0.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cancellation_stops_in_flight_collection() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Db::open_in_memory().unwrap());
    let source = Arc::new(Fleet { delay: Duration::from_secs(30), ..Fleet::new(&[]) });
    let (cancel, rx) = CancelHandle::new();

    let run = tokio::spawn({
        let db = db.clone();
        let dir = dir.path().to_path_buf();
        async move { run_bulk_scan(source, db, request("wks-01,wks-02,wks-03", "cancel me"), &config(&dir), rx).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let res = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap().unwrap();
    assert_eq!((res.total, res.failed), (3, 3));
    assert!(res.results.iter().all(|o| o.error.as_deref() == Some("operation cancelled")));
    assert!(res.failure_report.is_some());
    assert!(db.list().unwrap().is_empty());
}

#[tokio::test]
async fn rescan_refreshes_last_discovered() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Db::open_in_memory().unwrap());
    let (_cancel, rx) = CancelHandle::new();
    let january = Arc::new(Fleet { seen_at: "2026-01-01T00:00:00Z", ..Fleet::new(&[]) });
    let res = run_bulk_scan(january, db.clone(), request("wks-01", "first"), &config(dir.path()), rx.clone())
        .await
        .unwrap();
    assert_eq!(res.added, 1);

    let res = run_bulk_scan(Arc::new(Fleet::new(&[])), db.clone(), request("wks-01", "daily"), &config(dir.path()), rx)
        .await
        .unwrap();
    assert_eq!(res.skipped, 1);
    let rec = db.get_by_hostname("WKS-01").unwrap().unwrap();
    assert_eq!(rec.last_discovered.as_deref(), Some("2026-10-15T08:00:00Z"));
    assert_eq!(rec.updated_at, None);
}

#[tokio::test]
async fn in_flight_targets_never_exceed_concurrency() {
    struct Gauge {
        fleet: Fleet,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl FactSource for Gauge {
        async fn collect(&self, target: &Target) -> Result<RawFacts, CollectionError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let res = self.fleet.collect(target).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            res
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Db::open_in_memory().unwrap());
    let gauge = Arc::new(Gauge {
        fleet: Fleet { delay: Duration::from_millis(20), ..Fleet::new(&[]) },
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let cfg = config(dir.path());
    let (_cancel, rx) = CancelHandle::new();
    let list = (1..=9).map(|i| format!("wks-{i:02}")).collect::<Vec<_>>().join("\n");

    let res = run_bulk_scan(gauge.clone(), db, request(&list, "pool bound"), &cfg, rx).await.unwrap();
    assert_eq!(res.added, 9);
    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= cfg.concurrency, "peak {peak} with concurrency {}", cfg.concurrency);
}

#[tokio::test]
async fn unwritable_report_dir_is_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "").unwrap();
    let db = Arc::new(Db::open_in_memory().unwrap());
    let cfg = BulkScanConfig { report_dir: blocker.join("reports"), ..config(dir.path()) };
    let (_cancel, rx) = CancelHandle::new();

    let res = run_bulk_scan(Arc::new(Fleet::new(&["wks-02"])), db, request("wks-01,wks-02", "audit"), &cfg, rx)
        .await
        .unwrap();
    assert_eq!(res.failed, 1);
    assert_eq!(res.failure_report, None);
    assert!(res.failure_report_error.as_deref().unwrap().contains("reports"));
}
