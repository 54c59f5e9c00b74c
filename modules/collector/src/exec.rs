//! Running collection scripts on the local machine or over SSH.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("failed to start {program}: {detail}")]
    Spawn { program: String, detail: String },

    #[error("connection failed: {0}")]
    Transport(String),

    #[error("permission denied: {0}")]
    Denied(String),
}

/// Runs a POSIX shell script somewhere and captures its output.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, script: &str) -> Result<CommandOutput, ExecError>;
}

async fn capture(mut cmd: Command, program: &str) -> Result<CommandOutput, ExecError> {
    // dropping the future (timeout, cancellation) kills the child
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    let out = cmd
        .output()
        .await
        .map_err(|e| ExecError::Spawn { program: program.to_string(), detail: e.to_string() })?;
    Ok(CommandOutput {
        status: out.status.code(),
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    })
}

/// `sh -c <script>` on this machine.
#[derive(Debug, Default, Clone)]
pub struct LocalExecutor;

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn run(&self, script: &str) -> Result<CommandOutput, ExecError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        capture(cmd, "sh").await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshOptions {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub connect_timeout_s: u64,
}

impl Default for SshOptions {
    fn default() -> Self {
        SshOptions { user: None, port: None, connect_timeout_s: 10 }
    }
}

/// Non-interactive `ssh` to a remote host. Key-based auth only; a host
/// that would prompt for a password is reported as denied.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    host: String,
    opts: SshOptions,
}

impl SshExecutor {
    pub fn new(host: impl Into<String>, opts: SshOptions) -> Self {
        SshExecutor { host: host.into(), opts }
    }

    pub fn args(&self, script: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.opts.connect_timeout_s.max(1)),
        ];
        if let Some(p) = self.opts.port {
            args.push("-p".to_string());
            args.push(p.to_string());
        }
        args.push(match &self.opts.user {
            Some(u) => format!("{u}@{}", self.host),
            None => self.host.clone(),
        });
        args.push(script.to_string());
        args
    }
}

/// ssh reserves exit status 255 for its own failures.
fn classify_ssh(out: CommandOutput) -> Result<CommandOutput, ExecError> {
    if out.status != Some(255) {
        return Ok(out);
    }
    let detail = out.stderr.trim().to_string();
    if detail.contains("Permission denied") || detail.contains("Host key verification failed") {
        Err(ExecError::Denied(detail))
    } else {
        Err(ExecError::Transport(detail))
    }
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    async fn run(&self, script: &str) -> Result<CommandOutput, ExecError> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.args(script));
        classify_ssh(capture(cmd, "ssh").await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(status: i32, stderr: &str) -> CommandOutput {
        CommandOutput { status: Some(status), stdout: String::new(), stderr: stderr.to_string() }
    }

    #[test]
    fn ssh_args_are_batch_mode() {
        let ex = SshExecutor::new("wks-01", SshOptions { user: Some("inv".into()), port: Some(2222), connect_timeout_s: 5 });
        let args = ex.args("hostname");
        assert_eq!(args, vec!["-o", "BatchMode=yes", "-o", "ConnectTimeout=5", "-p", "2222", "inv@wks-01", "hostname"]);
    }

    #[test]
    fn exit_255_is_an_ssh_failure() {
        assert!(matches!(classify_ssh(out(255, "ssh: connect to host x port 22: Connection refused")), Err(ExecError::Transport(_))));
        assert!(matches!(classify_ssh(out(255, "inv@x: Permission denied (publickey).")), Err(ExecError::Denied(_))));
        assert!(classify_ssh(out(1, "cat: no such file")).is_ok());
    }

    #[tokio::test]
    async fn local_executor_captures_output() {
        let res = LocalExecutor.run("echo hello; echo oops >&2; exit 3").await.unwrap();
        assert_eq!(res.stdout.trim(), "hello");
        assert_eq!(res.stderr.trim(), "oops");
        assert_eq!(res.status, Some(3));
        assert!(!res.success());
    }
}
