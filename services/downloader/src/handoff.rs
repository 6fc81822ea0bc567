//! Hand-off of validated files to the decode/plot collaborator.
//!
//! The collaborator is an opaque process. The pipeline tells it which file to
//! render and which artifacts it expects; the only thing it ever reads back is
//! whether those artifacts exist.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use swath_common::{DayKey, Satellite};
use swath_ingest::{ProductKind, RemoteEntry};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::HandoffConfig;

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url} rejected the request with {status}")]
    Rejected { url: String, status: reqwest::StatusCode },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Render one swath.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandoffRequest {
    pub file_path: PathBuf,
    /// Channel-2 file plotted together with a channel-1 radiance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companion_path: Option<PathBuf>,
    pub satellite: Satellite,
    pub kind: ProductKind,
    pub image_dir: PathBuf,
    pub expected_artifacts: Vec<String>,
}

impl HandoffRequest {
    pub fn new(
        entry: &RemoteEntry,
        file_path: PathBuf,
        companion_path: Option<PathBuf>,
        image_dir: PathBuf,
    ) -> Self {
        Self {
            file_path,
            companion_path,
            satellite: entry.satellite,
            kind: entry.kind,
            image_dir,
            expected_artifacts: entry.expected_artifact_names().into_iter().collect(),
        }
    }
}

/// One cloud swath of a daily composite, with its aerosol swath if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeSwath {
    pub cloud_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aerosol_path: Option<PathBuf>,
}

/// Render a satellite's daily composite maps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeRequest {
    pub satellite: Satellite,
    pub day: DayKey,
    pub image_dir: PathBuf,
    pub swaths: Vec<CompositeSwath>,
    pub expected_artifacts: Vec<String>,
}

/// Wire form of everything a sink accepts.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ProductRequest {
    Swath(HandoffRequest),
    Composite(CompositeRequest),
}

impl ProductRequest {
    /// Input files, in the order a command sink passes them.
    pub fn input_paths(&self) -> Vec<&PathBuf> {
        match self {
            Self::Swath(req) => std::iter::once(&req.file_path)
                .chain(req.companion_path.as_ref())
                .collect(),
            Self::Composite(req) => req
                .swaths
                .iter()
                .flat_map(|s| std::iter::once(&s.cloud_path).chain(s.aerosol_path.as_ref()))
                .collect(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Swath(_) => "swath",
            Self::Composite(_) => "composite",
        }
    }
}

/// Receives render requests.
#[async_trait]
pub trait ProductSink: Send + Sync {
    async fn submit(&self, request: &ProductRequest) -> Result<(), HandoffError>;
}

/// POSTs each request as JSON.
pub struct HttpSink {
    client: Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ProductSink for HttpSink {
    async fn submit(&self, request: &ProductRequest) -> Result<(), HandoffError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| HandoffError::Http {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(HandoffError::Rejected {
                url: self.url.clone(),
                status: response.status(),
            });
        }
        debug!(kind = request.label(), "Hand-off accepted");
        Ok(())
    }
}

/// Runs a program once per request.
///
/// Input paths are appended to the configured arguments and the JSON request
/// is written to stdin. A zero exit status means the artifacts were written.
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSink {
    pub fn new(command: &[String], timeout: Duration) -> anyhow::Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("handoff.command must name a program"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    async fn execute(&self, request: &ProductRequest) -> Result<(), HandoffError> {
        let payload = serde_json::to_vec(request)?;
        let spawn_err = |source| HandoffError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(format!("--{}", request.label()))
            .args(request.input_paths())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            // Programs that ignore stdin may exit before reading it.
            if let Err(e) = stdin.write_all(&payload).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(spawn_err(e));
                }
            }
        }

        let output = child.wait_with_output().await.map_err(spawn_err)?;
        if !output.status.success() {
            return Err(HandoffError::Command {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProductSink for CommandSink {
    async fn submit(&self, request: &ProductRequest) -> Result<(), HandoffError> {
        tokio::time::timeout(self.timeout, self.execute(request))
            .await
            .map_err(|_| HandoffError::Timeout {
                program: self.program.clone(),
                timeout: self.timeout,
            })?
    }
}

/// Logs requests without acting on them.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl ProductSink for LogSink {
    async fn submit(&self, request: &ProductRequest) -> Result<(), HandoffError> {
        let inputs: Vec<String> = request
            .input_paths()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        info!(kind = request.label(), inputs = ?inputs, "No hand-off configured");
        Ok(())
    }
}

/// Build the sink named by the configuration.
pub fn from_config(config: &HandoffConfig) -> anyhow::Result<Arc<dyn ProductSink>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match (&config.url, &config.command) {
        (Some(_), Some(_)) => anyhow::bail!("handoff.url and handoff.command are exclusive"),
        (Some(url), None) => Ok(Arc::new(HttpSink::new(url.clone(), timeout)?)),
        (None, Some(command)) => Ok(Arc::new(CommandSink::new(command, timeout)?)),
        (None, None) => Ok(Arc::new(LogSink)),
    }
}
