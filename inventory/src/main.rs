use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use collector::{CollectorConfig, CommandCollector, SshOptions};
use inventory_core::{
    ActorProvider, AuditEntry, AuditedStore, BulkScanResult, ChangeContext, ComparisonResult, DeviceRecord,
    DeviceStore, DiscoveryMethod, DiscoverySession, EnvActor, Target,
};
use inventory_sqlite::Db;
use reconcile::{apply, mark, scan_one, Applied, Selection};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod config;
mod logging;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Debug, Parser)]
#[command(name = "inventory", version, about = "Device discovery and reconciliation")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./inventory.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Inventory database (overrides database.path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Scan one target, show what changed, and apply the selected fields
    Scan {
        /// Target hostname or IP
        target: String,
        /// Why the record is being changed (required to update an existing device)
        #[arg(long, default_value = "")]
        reason: String,
        /// Fields to apply: `all` or a comma list such as TotalRamGb,OsVersion
        #[arg(long, default_value = "all")]
        fields: String,
        /// Show the diff without writing anything
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Overall collection timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Remote login user for ssh
        #[arg(long)]
        ssh_user: Option<String>,
        /// Remote ssh port
        #[arg(long)]
        ssh_port: Option<u16>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Scan every target in a list file and add or update each device
    Bulk {
        /// Target list: one per line, or separated by commas/semicolons; # starts a comment
        #[arg(long, value_name = "FILE")]
        targets: PathBuf,
        /// Reason recorded on every audit entry of this run
        #[arg(long)]
        reason: String,
        /// Targets processed at once
        #[arg(long)]
        concurrency: Option<usize>,
        /// Collection starts per second; 0 disables pacing
        #[arg(long)]
        qps: Option<u32>,
        /// Extra attempts for unreachable or timed-out targets
        #[arg(long)]
        retries: Option<u32>,
        /// Base delay between retries in milliseconds
        #[arg(long)]
        retry_delay_ms: Option<u64>,
        /// Directory for the failure report
        #[arg(long, value_name = "DIR")]
        report_dir: Option<PathBuf>,
        /// Overall collection timeout per target in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Archive and remove a device
    Delete {
        hostname: String,
        #[arg(long)]
        reason: String,
    },
    /// List devices, optionally filtered by a substring
    Devices {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show the audit history of a hostname, including deleted devices
    Audit {
        hostname: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Write the full audit trail to a CSV file
    ExportAudit {
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
}

fn collector_config(cfg: &config::Config, timeout_ms: Option<u64>, ssh_user: Option<String>, ssh_port: Option<u16>) -> CollectorConfig {
    let c = cfg.collector();
    let defaults = CollectorConfig::default();
    CollectorConfig {
        timeout: timeout_ms.or(c.timeout_ms).map(Duration::from_millis).unwrap_or(defaults.timeout),
        ssh: SshOptions {
            user: ssh_user.or(c.ssh_user),
            port: ssh_port.or(c.ssh_port),
            connect_timeout_s: c.ssh_connect_timeout_s.unwrap_or(defaults.ssh.connect_timeout_s),
        },
        local_aliases: c.local_aliases,
    }
}

fn print_comparison(c: &ComparisonResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let name = &c.candidate.hostname;
            let kind = if c.is_new_device() { "new device" } else { "existing device" };
            println!("{} ({}): {}, {} change(s)", name, c.target, kind, c.diffs.len());
            for d in &c.diffs {
                let mark = if d.apply { "*" } else { " " };
                println!(
                    " {} {}: {} -> {}",
                    mark,
                    d.field,
                    d.old.as_deref().unwrap_or("-"),
                    d.new.as_deref().unwrap_or("-")
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(c)?),
    }
    Ok(())
}

fn print_devices(devices: &[DeviceRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for d in devices {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    d.hostname,
                    d.ip_address.as_deref().unwrap_or("-"),
                    d.model.as_deref().unwrap_or("-"),
                    d.status,
                    d.last_discovered.as_deref().unwrap_or("-")
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(devices)?),
    }
    Ok(())
}

fn print_audit(entries: &[AuditEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for e in entries {
                let field = e.field_name.as_deref().map(|f| format!(" {f}")).unwrap_or_default();
                let change = match (&e.old_value, &e.new_value) {
                    (None, None) => String::new(),
                    (o, n) => format!(": {} -> {}", o.as_deref().unwrap_or("-"), n.as_deref().unwrap_or("-")),
                };
                let reason = e.reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default();
                println!("{} {} {}{}{} by {}{}", e.at, e.hostname, e.action, field, change, e.actor, reason);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(entries)?),
    }
    Ok(())
}

fn print_bulk(res: &BulkScanResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for o in &res.results {
                match &o.error {
                    Some(e) => println!("{}\t{}\t{}", o.target, o.outcome, e),
                    None => println!("{}\t{}", o.target, o.outcome),
                }
            }
            println!(
                "session {}: {} target(s), {} added, {} updated, {} skipped, {} failed ({} ms)",
                res.session, res.total, res.added, res.updated, res.skipped, res.failed, res.duration_ms
            );
            if let Some(p) = &res.failure_report {
                println!("failure report: {}", p.display());
            }
            if let Some(e) = &res.failure_report_error {
                println!("failure report not written: {e}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(res)?),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;
    let _log_guard = logging::init(&cfg.log_level(), cfg.log_file().as_deref());
    let db_path = cli.db.clone().unwrap_or_else(|| cfg.database_path());
    let actor = EnvActor.actor();

    match cli.command {
        Commands::Version => {
            println!("inventory {}", inventory_core::version());
        }
        Commands::Scan { target, reason, fields, dry_run, timeout_ms, ssh_user, ssh_port, format } => {
            let target = Target::parse(&target)?;
            let selection = Selection::parse_list(&fields).map_err(|e| anyhow!(e))?;
            let collector = CommandCollector::new(collector_config(&cfg, timeout_ms, ssh_user, ssh_port));
            let db = Db::open_or_create(&db_path)?;
            let rt = tokio::runtime::Runtime::new()?;

            let mut comparison = rt.block_on(scan_one(&collector, &db, &target))?;
            mark(&mut comparison, &selection);
            print_comparison(&comparison, format)?;
            if dry_run {
                return Ok(());
            }

            let session = DiscoverySession::new();
            db.begin_session(session, "scan", &actor)?;
            let ctx = ChangeContext::new(actor.clone(), Some(session), reason);
            let applied = apply(&db, &comparison, &selection, DiscoveryMethod::Scan, &ctx);
            db.finish_session(session, 1, usize::from(applied.is_err()))?;
            match applied? {
                Applied::Added(r) => println!("added {}", r.hostname),
                Applied::Updated(n) => println!("updated {} field(s)", n),
                Applied::Unchanged => println!("no changes applied"),
            }
        }
        Commands::Bulk { targets, reason, concurrency, qps, retries, retry_delay_ms, report_dir, timeout_ms, format } => {
            let list = bulk_scan::read_target_file(&targets)?;
            let b = cfg.bulk();
            let defaults = bulk_scan::BulkScanConfig::default();
            let bulk_cfg = bulk_scan::BulkScanConfig {
                concurrency: concurrency.or(b.concurrency).unwrap_or(defaults.concurrency),
                qps: qps.or(b.qps).filter(|q| *q > 0),
                retries: retries.or(b.retries).unwrap_or(defaults.retries),
                retry_delay: retry_delay_ms.or(b.retry_delay_ms).map(Duration::from_millis).unwrap_or(defaults.retry_delay),
                report_dir: report_dir.or(b.report_dir).unwrap_or(defaults.report_dir),
            };
            let collector = Arc::new(CommandCollector::new(collector_config(&cfg, timeout_ms, None, None)));
            let db = Arc::new(Db::open_or_create(&db_path)?);
            let session = DiscoverySession::new();
            db.begin_session(session, "bulk", &actor)?;

            let rt = tokio::runtime::Runtime::new()?;
            let store: Arc<dyn AuditedStore> = db.clone();
            let request = bulk_scan::BulkRequest { targets: list, actor, session, reason };
            let res = rt.block_on(async {
                let (cancel, rx) = bulk_scan::CancelHandle::new();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupted, cancelling in-flight targets");
                        cancel.cancel();
                    }
                });
                bulk_scan::run_bulk_scan(collector, store, request, &bulk_cfg, rx).await
            });
            let res = match res {
                Ok(r) => r,
                Err(e) => {
                    db.finish_session(session, 0, 0)?;
                    return Err(e.into());
                }
            };
            db.finish_session(session, res.total, res.failed)?;
            print_bulk(&res, format)?;
        }
        Commands::Delete { hostname, reason } => {
            let db = Db::open_or_create(&db_path)?;
            let removed = db.delete(&hostname, &ChangeContext::new(actor, None, reason))?;
            info!(hostname = %removed.hostname, "deleted");
            println!("deleted {} (archived)", removed.hostname);
        }
        Commands::Devices { search, format } => {
            let db = Db::open_or_create(&db_path)?;
            let devices = match search {
                Some(q) => db.search(&q)?,
                None => db.list()?,
            };
            print_devices(&devices, format)?;
        }
        Commands::Audit { hostname, format } => {
            let db = Db::open_or_create(&db_path)?;
            print_audit(&db.audit_for_hostname(&hostname)?, format)?;
        }
        Commands::ExportAudit { out } => {
            let db = Db::open_or_create(&db_path)?;
            let n = db.export_audit_csv(&out)?;
            println!("wrote {} audit entries to {}", n, out.display());
        }
    }
    Ok(())
}
