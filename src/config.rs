//! Typed configuration consumed by the core at transfer-construction time
//! (spec §1's "(a) a typed configuration value at transfer construction"),
//! plus the JSON batch-job shape for the `client` binary (spec §6 CLI
//! surface).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::delay::DelayGenerator;

pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_MAX_RETRIES: u8 = 3;

/// Per-transfer tuning shared by every worker kind (spec §4.4).
#[derive(Clone)]
pub struct WorkerConfig {
	pub timeout: Duration,
	pub max_retries: u8,
	pub delay: Option<Arc<dyn DelayGenerator>>,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		Self {
			timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
			max_retries: DEFAULT_MAX_RETRIES,
			delay: None,
		}
	}
}

/// Listener-level configuration: where it binds and the working
/// directory files are served from/written to.
pub struct ServerConfig {
	pub bind_addr: SocketAddr,
	pub root_dir: PathBuf,
	pub worker: WorkerConfig,
}

/// One line of a batch-client job file: `client <config.json>` (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct BatchJob {
	pub server: SocketAddr,
	pub kind: BatchJobKind,
	pub file: PathBuf,
	/// Local path the file is read from/written to; defaults to `file`'s
	/// basename in the working directory when omitted.
	#[serde(default)]
	pub local_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchJobKind {
	Get,
	Put,
}

/// Loads the JSON array of batch jobs from disk (spec §1's "configuration-
/// file loading (JSON → list of transfer jobs)" external collaborator).
pub fn load_batch_jobs(path: &std::path::Path) -> Result<Vec<BatchJob>, BatchConfigError> {
	let text = std::fs::read_to_string(path).map_err(BatchConfigError::Io)?;
	serde_json::from_str(&text).map_err(BatchConfigError::Parse)
}

#[derive(Debug, thiserror::Error)]
pub enum BatchConfigError {
	#[error("failed to read batch config file: {0}")]
	Io(#[source] std::io::Error),
	#[error("failed to parse batch config file: {0}")]
	Parse(#[source] serde_json::Error),
}
