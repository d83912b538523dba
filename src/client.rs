//! High-level client operations shared by the binaries: bind a fresh
//! ephemeral socket, open the local file and drive the right worker to
//! completion (spec §4.5, §4.6).

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use log::error;

use crate::config::WorkerConfig;
use crate::error::ErrorKind;
use crate::fileio;
use crate::worker::{self, DownloadClient, UploadClient};

pub struct Client {
	local_bind_ip: IpAddr,
	config: WorkerConfig,
}

impl Client {
	pub fn new(local_bind_ip: IpAddr, config: WorkerConfig) -> Self {
		Self { local_bind_ip, config }
	}

	/// Reads `remote_filename` from `server` and writes it to `local_path`.
	pub async fn download(&self, server: SocketAddr, remote_filename: &str, local_path: &Path) -> ErrorKind {
		let writer = match fileio::open_for_write(local_path, false) {
			Ok(w) => w,
			Err(e) => {
				error!("cannot open {} for write: {e}", local_path.display());
				return e.into();
			}
		};
		let socket = match worker::bind_ephemeral(self.local_bind_ip).await {
			Ok(s) => s,
			Err(e) => return e.into(),
		};
		let (client, _handle) = DownloadClient::new(socket, server, remote_filename.to_string(), writer, self.config.clone(), Box::new(|_| {}));
		client.run().await
	}

	/// Reads `local_path` and writes it to `server` as `remote_filename`.
	pub async fn upload(&self, server: SocketAddr, remote_filename: &str, local_path: &Path) -> ErrorKind {
		let reader = match fileio::open_for_read(local_path) {
			Ok(r) => r,
			Err(e) => {
				error!("cannot open {} for read: {e}", local_path.display());
				return e.into();
			}
		};
		let socket = match worker::bind_ephemeral(self.local_bind_ip).await {
			Ok(s) => s,
			Err(e) => return e.into(),
		};
		let (client, _handle) = UploadClient::new(socket, server, remote_filename.to_string(), reader, self.config.clone(), Box::new(|_| {}));
		client.run().await
	}
}
