//! Client-side write transfer: send a write-request, wait for `ack(0)`,
//! then push data blocks in lockstep until the terminal (short) block is
//! acked (spec §4.6).

use std::net::SocketAddr;

use log::{info, trace, warn};

use crate::config::WorkerConfig;
use crate::error::ErrorKind;
use crate::fileio::FileReader;
use crate::packet::{Mode, Opcode, Packet, MAX_DATA_LEN, MAX_FRAME_LEN};

use super::{CompletionCallback, RecvOutcome, TransferHandle, WorkerCore};

pub struct UploadClient {
	core: WorkerCore,
	server_addr: SocketAddr,
	remote_filename: String,
	reader: FileReader,
	block: u16,
	terminal_sent: bool,
}

impl UploadClient {
	pub fn new(
		socket: tokio::net::UdpSocket,
		server_addr: SocketAddr,
		remote_filename: String,
		reader: FileReader,
		config: WorkerConfig,
		on_complete: CompletionCallback,
	) -> (Self, TransferHandle) {
		let (core, handle) = WorkerCore::new(socket, None, config, on_complete);
		(
			Self {
				core,
				server_addr,
				remote_filename,
				reader,
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

		let wrq = match Packet::write_request(&self.remote_filename, Mode::Octet) {
			Ok(p) => p,
			Err(_) => return self.core.finish(ErrorKind::IllegalOperation),
		};
		if let Err(e) = self.core.send(&wrq, self.server_addr).await {
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

					match Packet::decode(&buf[..n], Some(Opcode::Ack)) {
						Err(_) => {
							if self.core.retry_or_exhausted() {
								return self.core.finish(ErrorKind::InvalidServerResponse);
							}
						}
						Ok(Packet::Error { code, message }) => {
							warn!("server reported error {code}: {message}");
							return self.core.finish(ErrorKind::from_wire_error(code));
						}
						Ok(Packet::Ack { block }) => {
							if block != self.block {
								// Ack for a block we didn't just send; a protocol
								// anomaly rather than a different endpoint, but
								// handled the same way: bounded retry, no resend.
								if self.core.retry_or_exhausted() {
									return self.core.finish(ErrorKind::InvalidServerResponse);
								}
								continue;
							}
							self.core.reset_retries();
							if self.terminal_sent {
								info!("upload of {} complete", self.remote_filename);
								return self.core.finish(ErrorKind::NoError);
							}
							match self.send_next_block().await {
								Ok(()) => {}
								Err(ErrorKind::DiskIoError) => return self.core.fail_disk_io("local file read failed").await,
								Err(e) => return self.core.finish(e),
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

	async fn send_next_block(&mut self) -> Result<(), ErrorKind> {
		let mut chunk = [0u8; MAX_DATA_LEN];
		let (n, eof) = self.reader.read_into(&mut chunk).map_err(|_| ErrorKind::DiskIoError)?;
		self.block = self.block.wrapping_add(1);
		self.terminal_sent = eof;
		let data = Packet::data(self.block, chunk[..n].to_vec());
		self.core.send_to_peer(&data).await
	}
}
