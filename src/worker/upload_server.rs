//! Server-side write transfer: opens the target file, acks block 0 to
//! commence, then receives data blocks in lockstep, symmetric to
//! [`super::DownloadClient`] (spec §4.8).
//!
//! The peer TID is *not* assumed from the write-request's source
//! endpoint: `ack(0)` is sent there, but the established TID used for
//! every subsequent exchange is whichever endpoint the first reply
//! actually arrives from.

use std::net::SocketAddr;
use std::path::PathBuf;

use log::{info, trace, warn};

use crate::config::WorkerConfig;
use crate::error::ErrorKind;
use crate::fileio::{self, FileWriter};
use crate::packet::{Opcode, Packet, MAX_FRAME_LEN};

use super::{CompletionCallback, RecvOutcome, TransferHandle, WorkerCore};

pub struct UploadServer {
	core: WorkerCore,
	requester: SocketAddr,
	path: PathBuf,
	writer: Option<FileWriter>,
	block: u16,
}

impl UploadServer {
	pub fn new(socket: tokio::net::UdpSocket, requester: SocketAddr, path: PathBuf, config: WorkerConfig, on_complete: CompletionCallback) -> (Self, TransferHandle) {
		let (core, handle) = WorkerCore::new(socket, None, config, on_complete);
		(
			Self {
				core,
				requester,
				path,
				writer: None,
				block: 0,
			},
			handle,
		)
	}

	pub async fn run(mut self) -> ErrorKind {
		if !self.core.enter_running() {
			return self.core.finish(ErrorKind::StateMachineBroken);
		}

		let writer = match fileio::open_for_write(&self.path, false) {
			Ok(w) => w,
			Err(e) => {
				warn!("cannot open {} for write: {e}", self.path.display());
				let code = e.to_wire_error();
				return self.core.send_error_and_finish(self.requester, code, &e.to_string(), ErrorKind::from_wire_error(code)).await;
			}
		};
		self.writer = Some(writer);

		let ack0 = Packet::ack(0);
		if let Err(e) = self.core.send(&ack0, self.requester).await {
			return self.core.finish(e);
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

					match Packet::decode(&buf[..n], Some(Opcode::Data)) {
						Err(_) => {
							if self.core.retry_or_exhausted() {
								return self.core.finish(ErrorKind::InvalidServerResponse);
							}
						}
						Ok(Packet::Error { code, message }) => {
							warn!("client reported error {code}: {message}");
							return self.core.finish(ErrorKind::from_wire_error(code));
						}
						Ok(Packet::Data { block, payload }) => {
							let terminal = payload.len() < crate::packet::MAX_DATA_LEN;
							if block == self.block.wrapping_add(1) {
								if let Err(e) = self.writer.as_mut().unwrap().write_block(&payload) {
									warn!("write failed: {e}");
									return self.core.fail_disk_io(&e.to_string()).await;
								}
								self.block = block;
								let ack = Packet::ack(block);
								if let Err(e) = self.core.send_to_peer(&ack).await {
									return self.core.finish(e);
								}
								self.core.reset_retries();
								if terminal {
									if let Err(e) = self.writer.take().unwrap().finish() {
										warn!("finish failed: {e}");
										return self.core.fail_disk_io(&e.to_string()).await;
									}
									info!("received upload {} from {}", self.path.display(), self.requester);
									return self.core.finish(ErrorKind::NoError);
								}
							} else {
								let ack = Packet::ack(block);
								if let Err(e) = self.core.send_to_peer(&ack).await {
									return self.core.finish(e);
								}
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
}
