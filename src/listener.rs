//! The service's distributor: binds the well-known TFTP port, reads one
//! request datagram at a time, and spawns a per-transfer worker bound to
//! its own ephemeral TID (spec §4.9).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::config::{ServerConfig, WorkerConfig};
use crate::error::ErrorKind;
use crate::packet::{Packet, MAX_FRAME_LEN};
use crate::worker::{self, DownloadServer, UploadServer};

pub struct Listener {
	socket: UdpSocket,
	root_dir: PathBuf,
	worker_config: WorkerConfig,
	cancel: CancellationToken,
}

impl Listener {
	pub async fn bind(config: ServerConfig, cancel: CancellationToken) -> std::io::Result<Self> {
		let socket = UdpSocket::bind(config.bind_addr).await?;
		info!("listening on {}", config.bind_addr);
		Ok(Self {
			socket,
			root_dir: config.root_dir,
			worker_config: config.worker,
			cancel,
		})
	}

	pub fn stop_service(&self) {
		self.cancel.cancel();
	}

	pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
		self.socket.local_addr()
	}

	/// Runs until cancelled. Every accepted request spawns a worker task
	/// on its own socket and this loop immediately resumes listening —
	/// the distributor never blocks on an individual transfer.
	pub async fn serve(self) {
		let root_dir = Arc::new(self.root_dir);
		let bind_ip = self.socket.local_addr().map(|a| a.ip()).unwrap_or_else(|_| "0.0.0.0".parse().unwrap());

		let mut buf = [0u8; MAX_FRAME_LEN];
		loop {
			tokio::select! {
				biased;
				_ = self.cancel.cancelled() => {
					warn!("listener cancelled, shutting down");
					break;
				}
				res = self.socket.recv_from(&mut buf) => {
					match res {
						Ok((n, client)) => {
							debug!("received {n} bytes from {client}");
							self.dispatch(&buf[..n], client, bind_ip, Arc::clone(&root_dir)).await;
						}
						Err(e) => error!("listener recv failed: {e}"),
					}
				}
			}
		}
	}

	async fn dispatch(&self, datagram: &[u8], client: SocketAddr, bind_ip: std::net::IpAddr, root_dir: Arc<PathBuf>) {
		let packet = match Packet::decode(datagram, None) {
			Ok(p) => p,
			Err(e) => {
				warn!("discarding malformed request from {client}: {e}");
				return;
			}
		};

		match packet {
			Packet::ReadRequest { filename, .. } => {
				let path = root_dir.join(&filename);
				let config = self.worker_config.clone();
				tokio::spawn(async move {
					let Ok(socket) = worker::bind_ephemeral(bind_ip).await else {
						error!("failed to bind ephemeral socket for {client}");
						return;
					};
					let (server, _handle) = DownloadServer::new(socket, client, path, config, Box::new(|_| {}));
					let kind = server.run().await;
					log_outcome("read", client, kind);
				});
			}
			Packet::WriteRequest { filename, .. } => {
				let path = root_dir.join(&filename);
				let config = self.worker_config.clone();
				tokio::spawn(async move {
					let Ok(socket) = worker::bind_ephemeral(bind_ip).await else {
						error!("failed to bind ephemeral socket for {client}");
						return;
					};
					let (server, _handle) = UploadServer::new(socket, client, path, config, Box::new(|_| {}));
					let kind = server.run().await;
					log_outcome("write", client, kind);
				});
			}
			other => {
				warn!("unexpected opcode {:?} from {client}, not a request", other.opcode());
			}
		}
	}
}

fn log_outcome(kind: &str, client: SocketAddr, result: ErrorKind) {
	if result.is_success() {
		info!("{kind} request from {client} completed");
	} else {
		warn!("{kind} request from {client} failed: {result}");
	}
}
