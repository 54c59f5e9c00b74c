//! Inventory snapshot collection against the local machine or a remote host.
//!
//! The same fact-group scripts run either through `sh` locally or through
//! `ssh` remotely; which one is used is decided per target and is invisible
//! to callers of [`FactSource::collect`].

pub mod exec;
pub mod facts;
pub mod router;

use anyhow::anyhow;
use async_trait::async_trait;
use inventory_core::{now_rfc3339, CollectionError, FactSource, Gathered, RawFacts, Target};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

pub use exec::{CommandExecutor, CommandOutput, ExecError, LocalExecutor, SshExecutor, SshOptions};
pub use router::HostRouter;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Upper bound for one whole collection.
    pub timeout: Duration,
    pub ssh: SshOptions,
    /// Extra names that refer to this machine.
    pub local_aliases: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig { timeout: Duration::from_secs(30), ssh: SshOptions::default(), local_aliases: Vec::new() }
    }
}

/// Collects facts by running shell scripts on the target.
pub struct CommandCollector {
    config: CollectorConfig,
    router: HostRouter,
}

impl CommandCollector {
    pub fn new(config: CollectorConfig) -> Self {
        let router = HostRouter::detect(&config.local_aliases);
        CommandCollector { config, router }
    }

    fn executor_for(&self, target: &Target) -> Box<dyn CommandExecutor> {
        if self.router.is_local(target) {
            debug!(%target, "collecting locally");
            Box::new(LocalExecutor)
        } else {
            debug!(%target, "collecting over ssh");
            Box::new(SshExecutor::new(target.as_str(), self.config.ssh.clone()))
        }
    }
}

#[async_trait]
impl FactSource for CommandCollector {
    async fn collect(&self, target: &Target) -> Result<RawFacts, CollectionError> {
        let exec = self.executor_for(target);
        let limit = self.config.timeout;
        match timeout(limit, collect_with(exec.as_ref(), target)).await {
            Ok(res) => res,
            Err(_) => Err(CollectionError::TimedOut { target: target.to_string(), after_ms: limit.as_millis() as u64 }),
        }
    }
}

async fn group<T>(
    exec: &dyn CommandExecutor,
    target: &Target,
    name: &'static str,
    script: &str,
    parse: fn(&str) -> anyhow::Result<T>,
) -> Gathered<T> {
    let res = match exec.run(script).await {
        Ok(out) => parse(&out.stdout),
        Err(e) => Err(anyhow!(e)),
    };
    if let Err(e) = &res {
        warn!(%target, group = name, error = %e, "fact group unavailable");
    }
    res.into()
}

/// Run every fact group through `exec`. Only a failure to reach the target
/// at all is an error; each group otherwise degrades on its own.
pub async fn collect_with(exec: &dyn CommandExecutor, target: &Target) -> Result<RawFacts, CollectionError> {
    let computer_name = match exec.run(facts::IDENTITY).await {
        Ok(out) => facts::parse_identity(&out.stdout).unwrap_or_else(|e| {
            warn!(%target, error = %e, "no computer name reported");
            String::new()
        }),
        Err(ExecError::Denied(detail)) => {
            return Err(CollectionError::AccessDenied { target: target.to_string(), detail });
        }
        Err(e) => {
            return Err(CollectionError::Unreachable { target: target.to_string(), detail: e.to_string() });
        }
    };

    let hardware = group(exec, target, "hardware", facts::HARDWARE, facts::parse_hardware).await;
    let memory = group(exec, target, "memory", facts::MEMORY, facts::parse_memory).await;
    let storage = group(exec, target, "storage", facts::STORAGE, facts::parse_storage).await;
    let os = group(exec, target, "os", facts::OS, facts::parse_os).await;
    let network = group(exec, target, "network", facts::NETWORK, facts::parse_network).await;
    let domain = group(exec, target, "domain", facts::DOMAIN, facts::parse_domain).await;

    debug!(%target, %computer_name, "collection finished");
    Ok(RawFacts {
        target: target.clone(),
        computer_name,
        hardware,
        memory,
        storage,
        os,
        network,
        domain,
        collected_at: now_rfc3339(),
    })
}
