//! Server-side read transfer: opens the requested file and pushes data
//! blocks in lockstep to the requester, symmetric to
//! [`super::UploadClient`] (spec §4.7).

use std::net::SocketAddr;
use std::path::PathBuf;

use log::{info, trace, warn};

use crate::config::WorkerConfig;
use crate::error::ErrorKind;
use crate::fileio::{self, FileReader};
use crate::packet::{Opcode, Packet, MAX_DATA_LEN, MAX_FRAME_LEN};

use super::{CompletionCallback, RecvOutcome, TransferHandle, WorkerCore};

pub struct DownloadServer {
	core: WorkerCore,
	requester: SocketAddr,
	path: PathBuf,
	block: u16,
	terminal_sent: bool,
}

impl DownloadServer {
	/// `socket` must already be bound to a fresh local TID distinct from
	/// the listener's service port; `requester` is the client's endpoint
	/// taken from the inbound read-request.
	pub fn new(socket: tokio::net::UdpSocket, requester: SocketAddr, path: PathBuf, config: WorkerConfig, on_complete: CompletionCallback) -> (Self, TransferHandle) {
		let (core, handle) = WorkerCore::new(socket, Some(requester), config, on_complete);
		(
			Self {
				core,
				requester,
				path,
				block: 0,
				terminal_sent: false,
			},
			handle,
		)
	}

	pub async fn run(mut self) -> ErrorKind {
		if !self.core.enter_running() {
			return self.core.finish(ErrorKind::StateMachineBroken);
		}

		let mut reader = match fileio::open_for_read(&self.path) {
			Ok(r) => r,
			Err(e) => {
				warn!("cannot open {} for read: {e}", self.path.display());
				let code = e.to_wire_error();
				return self.core.send_error_and_finish(self.requester, code, &e.to_string(), ErrorKind::from_wire_error(code)).await;
			}
		};

		if let Err(e) = self.send_next_block(&mut reader).await {
			return match e {
				ErrorKind::DiskIoError => self.core.fail_disk_io("local file read failed").await,
				e => self.core.finish(e),
			};
		}

		let mut buf = [0u8; MAX_FRAME_LEN];
		loop {
			match self.core.recv(&mut buf).await {
				RecvOutcome::Aborted => return self.core.finish(ErrorKind::UserRequestedAbort),
				RecvOutcome::Io(e) => return self.core.finish(e.into()),
				RecvOutcome::Timeout => {
					if self.core.retry_or_exhausted() {
						return self.core.finish(ErrorKind::ReceiveTimeout);
					}
					if let Err(e) = self.core.resend().await {
						return self.core.finish(e);
					}
				}
				RecvOutcome::Data(from, n) => {
					if !self.core.accept_peer(from) {
						trace!("ignoring datagram from unexpected endpoint {from}");
						if self.core.retry_or_exhausted() {
							return self.core.finish(ErrorKind::NetworkInterference);
						}
						continue;
					}

					match Packet::decode(&buf[..n], Some(Opcode::Ack)) {
						Err(_) => {
							if self.core.retry_or_exhausted() {
								return self.core.finish(ErrorKind::InvalidServerResponse);
							}
						}
						Ok(Packet::Error { code, message }) => {
							warn!("client reported error {code}: {message}");
							return self.core.finish(ErrorKind::from_wire_error(code));
						}
						Ok(Packet::Ack { block }) => {
							if block != self.block {
								if self.core.retry_or_exhausted() {
									return self.core.finish(ErrorKind::InvalidServerResponse);
								}
								continue;
							}
							self.core.reset_retries();
							if self.terminal_sent {
								info!("download to {} of {} complete", self.requester, self.path.display());
								return self.core.finish(ErrorKind::NoError);
							}
							if let Err(e) = self.send_next_block(&mut reader).await {
								return match e {
									ErrorKind::DiskIoError => self.core.fail_disk_io("local file read failed").await,
									e => self.core.finish(e),
								};
							}
						}
						Ok(_) => {
							if self.core.retry_or_exhausted() {
								return self.core.finish(ErrorKind::InvalidServerResponse);
							}
						}
					}
				}
			}
		}
	}

	async fn send_next_block(&mut self, reader: &mut FileReader) -> Result<(), ErrorKind> {
		let mut chunk = [0u8; MAX_DATA_LEN];
		let (n, eof) = reader.read_into(&mut chunk).map_err(|_| ErrorKind::DiskIoError)?;
		self.block = self.block.wrapping_add(1);
		self.terminal_sent = eof;
		let data = Packet::data(self.block, chunk[..n].to_vec());
		self.core.send_to_peer(&data).await
	}
}
