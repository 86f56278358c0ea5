//! Local CLI converter (primary strategy)
//!
//! Renders via a child process built from a configured base command,
//! e.g. `athenapdf -S -T 120`. The PDF is read from the child's stdout;
//! stderr and the exit code are captured on failure. The child runs in
//! its own process group and the cancel channel signals the whole group
//! promptly.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::watch;

use crate::converter::{wait_cancelled, ConversionSource, Converter, StoreUploader};
use crate::error::{Error, Result};

/// Primary conversion strategy backed by a rendering CLI.
#[derive(Clone)]
pub struct CliConverter {
    pub uploader: StoreUploader,
    /// Base command, split on whitespace into argv
    pub cmd: String,
    /// Pass `-A` for aggressive content extraction
    pub aggressive: bool,
}

/// Build the argv for one conversion: the whitespace-split base command,
/// the source URI, `-A` when aggressive, and `-H <Key:Value>` when an
/// auth header is set.
fn construct_argv(base: &str, path: &str, aggressive: bool, header_kv: &str) -> Vec<String> {
    let mut args: Vec<String> = base.split_whitespace().map(str::to_string).collect();
    args.push(path.to_string());
    if aggressive {
        args.push("-A".to_string());
    }
    if !header_kv.is_empty() {
        args.push("-H".to_string());
        args.push(header_kv.to_string());
    }
    args
}

#[async_trait]
impl Converter for CliConverter {
    async fn convert(
        &self,
        source: &ConversionSource,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Vec<u8>> {
        let argv = construct_argv(&self.cmd, &source.uri, self.aggressive, &source.auth_header);
        tracing::info!(uri = source.actual_uri, ?argv, "converting with CLI");

        let (program, rest) = argv.split_first().ok_or_else(|| Error::ConverterFailure {
            stderr: "empty converter command".to_string(),
            code: -1,
        })?;

        let mut command = Command::new(program);
        command
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn()?;
        let pid = child.id();

        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = wait_cancelled(&mut cancel) => {
                // The renderer may fork helpers; SIGKILL the whole group
                // (kill_on_drop only reaches the direct child).
                #[cfg(unix)]
                if let Some(pid) = pid {
                    unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
                }
                tracing::info!(uri = source.actual_uri, "CLI conversion cancelled");
                return Err(Error::Cancelled);
            }
        };

        if !output.status.success() {
            return Err(Error::ConverterFailure {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                code: output.status.code().unwrap_or(-1),
            });
        }

        Ok(output.stdout)
    }

    async fn upload_primary(&self, pdf: &[u8]) -> Result<bool> {
        self.uploader.upload_primary(pdf).await
    }

    async fn upload_secondary(&self, pdf: &[u8]) -> Result<(bool, String)> {
        self.uploader.upload_secondary(pdf).await
    }
}
