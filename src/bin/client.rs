use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use tftpd::cli::{self, BatchOpts};
use tftpd::client::Client;
use tftpd::config::{self, BatchJobKind, WorkerConfig};

#[tokio::main]
async fn main() {
	let opts = BatchOpts::parse();
	cli::init_logger(opts.debug);

	let jobs = match config::load_batch_jobs(&opts.config) {
		Ok(jobs) => jobs,
		Err(e) => {
			error!("failed to load batch config {}: {e}", opts.config.display());
			std::process::exit(1);
		}
	};

	let worker_config = WorkerConfig {
		timeout: Duration::from_millis(opts.transfer.timeout_ms),
		max_retries: opts.transfer.max_retries,
		delay: None,
	};
	let client = Client::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), worker_config);

	let mut failures = 0;
	for job in &jobs {
		let filename = job.file.to_string_lossy().into_owned();
		let local_path = job.local_file.clone().unwrap_or_else(|| job.file.clone());
		let kind = match job.kind {
			BatchJobKind::Get => client.download(job.server, &filename, &local_path).await,
			BatchJobKind::Put => client.upload(job.server, &filename, &local_path).await,
		};
		if kind.is_success() {
			info!("{:?} {} <-> {} ok", job.kind, job.server, filename);
		} else {
			error!("{:?} {} <-> {} failed: {kind}", job.kind, job.server, filename);
			failures += 1;
		}
	}

	std::process::exit(if failures == 0 { 0 } else { 1 });
}
