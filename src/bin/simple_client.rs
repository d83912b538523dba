use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use log::error;

use tftpd::cli::{self, ClientOpts};
use tftpd::client::Client;
use tftpd::config::WorkerConfig;

#[tokio::main]
async fn main() {
	let opts = ClientOpts::parse();
	cli::init_logger(opts.debug);

	let config = WorkerConfig {
		timeout: Duration::from_millis(opts.transfer.timeout_ms),
		max_retries: opts.transfer.max_retries,
		delay: None,
	};
	let client = Client::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config);
	let server = SocketAddr::new(opts.server, opts.port);

	let kind = match (opts.download, opts.upload) {
		(Some(remote_file), None) => {
			let filename = remote_file.to_string_lossy().into_owned();
			let local_path = opts.local_dir.join(&remote_file);
			client.download(server, &filename, &local_path).await
		}
		(None, Some(local_file)) => {
			let filename = local_file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
			let local_path = opts.local_dir.join(&local_file);
			client.upload(server, &filename, &local_path).await
		}
		_ => {
			error!("exactly one of --download or --upload must be given");
			std::process::exit(2);
		}
	};

	if !kind.is_success() {
		error!("{kind}");
	}
	std::process::exit(kind.exit_code());
}
