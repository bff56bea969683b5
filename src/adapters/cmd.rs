use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::process::{Output, Stdio};
use tokio::process::Command as TokioCommand;

/// Runs an external tool to completion and hands back everything it printed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, program: &str, args: &[OsString]) -> io::Result<Output>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealCommandExecutor;

#[async_trait]
impl CommandExecutor for RealCommandExecutor {
    async fn execute(&self, program: &str, args: &[OsString]) -> io::Result<Output> {
        TokioCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            // dropping the future (timeout, cancellation) must not leave the tool running
            .kill_on_drop(true)
            .output()
            .await
    }
}
