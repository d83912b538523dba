use std::net::SocketAddr;

use clap::Parser;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use tftpd::cli::{self, ServerOpts};
use tftpd::config::{ServerConfig, WorkerConfig};
use tftpd::listener::Listener;

#[tokio::main]
async fn main() {
	let opts = ServerOpts::parse();
	cli::init_logger(opts.debug);

	let config = ServerConfig {
		bind_addr: SocketAddr::new(opts.bind, opts.port),
		root_dir: opts.root_dir,
		worker: WorkerConfig::default(),
	};

	let cancel = CancellationToken::new();
	let listener = match Listener::bind(config, cancel.clone()).await {
		Ok(l) => l,
		Err(e) => return error!("failed to bind listening socket: {e}"),
	};

	let serve_task = tokio::spawn(listener.serve());

	if tokio::signal::ctrl_c().await.is_ok() {
		info!("received SIGINT, shutting down");
	}
	cancel.cancel();
	let _ = serve_task.await;
}
