//! Client-side read transfer: send a read-request, then receive data
//! blocks in lockstep, acking each, until the terminal (short) block
//! arrives (spec §4.5).

use std::net::SocketAddr;

use log::{info, trace, warn};

use crate::config::WorkerConfig;
use crate::error::ErrorKind;
use crate::fileio::FileWriter;
use crate::packet::{Mode, Opcode, Packet, MAX_FRAME_LEN};

use super::{CompletionCallback, RecvOutcome, TransferHandle, WorkerCore};

pub struct DownloadClient {
	core: WorkerCore,
	server_addr: SocketAddr,
	remote_filename: String,
	writer: Option<FileWriter>,
	block: u16,
}

impl DownloadClient {
	/// `socket` must already be bound to a fresh local TID; `writer` is
	/// where received blocks are appended as they arrive.
	pub fn new(
		socket: tokio::net::UdpSocket,
		server_addr: SocketAddr,
		remote_filename: String,
		writer: FileWriter,
		config: WorkerConfig,
		on_complete: CompletionCallback,
	) -> (Self, TransferHandle) {
		let (core, handle) = WorkerCore::new(socket, None, config, on_complete);
		(
			Self {
				core,
				server_addr,
				remote_filename,
				writer: Some(writer),
				block: 0,
			},
			handle,
		)
	}

	pub async fn run(mut self) -> ErrorKind {
		if !self.core.enter_running() {
			return self.core.finish(ErrorKind::StateMachineBroken);
		}

		let rrq = match Packet::read_request(&self.remote_filename, Mode::Octet) {
			Ok(p) => p,
			Err(_) => return self.core.finish(ErrorKind::IllegalOperation),
		};
		if let Err(e) = self.core.send(&rrq, self.server_addr).await {
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
							warn!("server reported error {code}: {message}");
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
									info!("download of {} complete", self.remote_filename);
									return self.core.finish(ErrorKind::NoError);
								}
							} else {
								// Out-of-order or duplicate block: re-ack its own
								// number and keep waiting for the one we need.
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
