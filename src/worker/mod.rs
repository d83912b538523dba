//! Shared transfer-worker machinery: lifecycle state, the
//! receive-with-timeout race, retry discipline and TID validation (spec
//! §4.4, §5). The four concrete worker kinds each build their own state
//! machine on top of [`WorkerCore`].

mod download_client;
mod download_server;
mod upload_client;
mod upload_server;

pub use download_client::DownloadClient;
pub use download_server::DownloadServer;
pub use upload_client::UploadClient;
pub use upload_server::UploadServer;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::error::ErrorKind;
use crate::packet::{Packet, WireErrorCode};

/// Worker lifecycle (spec §3): `Constructed` → `Running` → {`Completed`, `Aborted`}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
	Constructed,
	Running,
	Completed,
	Aborted,
}

impl WorkerState {
	fn to_u8(self) -> u8 {
		match self {
			Self::Constructed => 0,
			Self::Running => 1,
			Self::Completed => 2,
			Self::Aborted => 3,
		}
	}

	fn from_u8(v: u8) -> Self {
		match v {
			0 => Self::Constructed,
			1 => Self::Running,
			2 => Self::Completed,
			_ => Self::Aborted,
		}
	}
}

/// A handle to a running (or not-yet-started) worker. Cloning shares the
/// same underlying state; `abort()` and repeated state reads are
/// idempotent and race-free regardless of how many handles exist.
#[derive(Clone)]
pub struct TransferHandle {
	state: Arc<AtomicU8>,
	cancel: CancellationToken,
}

impl TransferHandle {
	fn new() -> Self {
		Self {
			state: Arc::new(AtomicU8::new(WorkerState::Constructed.to_u8())),
			cancel: CancellationToken::new(),
		}
	}

	pub fn state(&self) -> WorkerState {
		WorkerState::from_u8(self.state.load(Ordering::Acquire))
	}

	/// Legal only while `Running`; a second call, or a call before/after
	/// that window, is a silent no-op (spec §4.4).
	pub fn abort(&self) {
		if self
			.state
			.compare_exchange(
				WorkerState::Running.to_u8(),
				WorkerState::Aborted.to_u8(),
				Ordering::AcqRel,
				Ordering::Acquire,
			)
			.is_ok()
		{
			self.cancel.cancel();
		}
	}

	fn try_start(&self) -> bool {
		self.state
			.compare_exchange(
				WorkerState::Constructed.to_u8(),
				WorkerState::Running.to_u8(),
				Ordering::AcqRel,
				Ordering::Acquire,
			)
			.is_ok()
	}

	/// Transitions to a terminal state unless `abort()` already raced us
	/// to `Aborted` first, in which case that wins.
	fn mark_terminal(&self, success: bool) {
		let target = if success { WorkerState::Completed } else { WorkerState::Aborted };
		let _ = self.state.compare_exchange(
			WorkerState::Running.to_u8(),
			target.to_u8(),
			Ordering::AcqRel,
			Ordering::Acquire,
		);
	}
}

pub type CompletionCallback = Box<dyn FnOnce(ErrorKind) + Send + 'static>;

/// Outcome of racing one receive against the timer and the cancellation
/// token — the single awaitable spec.md §9 calls for in place of two
/// racing async operations plus a cancellation signal.
enum RecvOutcome {
	Data(SocketAddr, usize),
	Timeout,
	Aborted,
	Io(std::io::Error),
}

/// Shared state and operations for every worker kind. Not public API —
/// each worker module wraps one of these and drives its own state table.
struct WorkerCore {
	socket: UdpSocket,
	peer: Option<SocketAddr>,
	retry_count: u8,
	config: WorkerConfig,
	handle: TransferHandle,
	callback: Option<CompletionCallback>,
	last_outbound: Option<(SocketAddr, Vec<u8>)>,
}

impl WorkerCore {
	fn new(socket: UdpSocket, peer: Option<SocketAddr>, config: WorkerConfig, callback: CompletionCallback) -> (Self, TransferHandle) {
		let handle = TransferHandle::new();
		let core = Self {
			socket,
			peer,
			retry_count: 0,
			config,
			handle: handle.clone(),
			callback: Some(callback),
			last_outbound: None,
		};
		(core, handle)
	}

	/// Marks the worker `Running`. Every worker's public `start()`/`run()`
	/// entry point calls this exactly once before doing anything else.
	fn enter_running(&self) -> bool {
		self.handle.try_start()
	}

	async fn send(&mut self, pkt: &Packet, to: SocketAddr) -> Result<(), ErrorKind> {
		if let Some(delay) = &self.config.delay {
			tokio::time::sleep(delay.next_delay()).await;
		}
		let bytes = pkt.encode();
		self.socket.send_to(&bytes, to).await.map_err(ErrorKind::Io)?;
		self.last_outbound = Some((to, bytes));
		Ok(())
	}

	async fn send_to_peer(&mut self, pkt: &Packet) -> Result<(), ErrorKind> {
		let peer = self.peer.expect("peer TID must be established before send_to_peer");
		self.send(pkt, peer).await
	}

	/// Sends an Error packet to `to` and consumes the worker, invoking the
	/// completion callback with `kind`. Used for server-side open failures
	/// and mid-transfer I/O faults (spec §7).
	async fn send_error_and_finish(mut self, to: SocketAddr, code: WireErrorCode, message: &str, kind: ErrorKind) -> ErrorKind {
		let pkt = Packet::error(code, message);
		let _ = self.send(&pkt, to).await;
		self.finish(kind)
	}

	/// A mid-transfer local file read/write failure: sends a code-0 Error
	/// packet to the established peer (best-effort; a send failure here
	/// doesn't change the outcome) before exiting with `DiskIoError`
	/// (spec §7: "file read/write failures mid-transfer exit with
	/// DiskIoError and send a code-0 Error packet").
	async fn fail_disk_io(mut self, message: &str) -> ErrorKind {
		if let Some(peer) = self.peer {
			let pkt = Packet::error(WireErrorCode::NotDefined, message);
			let _ = self.send(&pkt, peer).await;
		}
		self.finish(ErrorKind::DiskIoError)
	}

	/// Re-sends whatever was last sent, verbatim (spec §4.4/§4.5-8: "re-
	/// send last outbound frame").
	async fn resend(&mut self) -> Result<(), ErrorKind> {
		if let Some((to, bytes)) = self.last_outbound.clone() {
			if let Some(delay) = &self.config.delay {
				tokio::time::sleep(delay.next_delay()).await;
			}
			self.socket.send_to(&bytes, to).await.map_err(ErrorKind::Io)?;
		}
		Ok(())
	}

	async fn recv(&self, buf: &mut [u8]) -> RecvOutcome {
		tokio::select! {
			biased;
			_ = self.handle.cancel.cancelled() => RecvOutcome::Aborted,
			res = tokio::time::timeout(self.config.timeout, self.socket.recv_from(buf)) => {
				match res {
					Ok(Ok((n, from))) => RecvOutcome::Data(from, n),
					Ok(Err(e)) => RecvOutcome::Io(e),
					Err(_elapsed) => RecvOutcome::Timeout,
				}
			}
		}
	}

	/// Returns `true` if `from` is (or becomes, on first call) the
	/// established peer TID; `false` if it's a stranger (spec §4.4).
	fn accept_peer(&mut self, from: SocketAddr) -> bool {
		match self.peer {
			None => {
				debug!("established peer TID {from}");
				self.peer = Some(from);
				true
			}
			Some(p) => p == from,
		}
	}

	/// Increments the retry counter for a recoverable condition (timeout,
	/// wrong-TID datagram, malformed frame) and reports whether the retry
	/// budget is now exhausted.
	fn retry_or_exhausted(&mut self) -> bool {
		self.retry_count += 1;
		self.retry_count > self.config.max_retries
	}

	fn reset_retries(&mut self) {
		self.retry_count = 0;
	}

	/// The single exit path (spec §4.4's "exit(kind)"): closes the socket
	/// (via `Drop`), transitions to a terminal lifecycle state and invokes
	/// the completion callback exactly once.
	fn finish(mut self, kind: ErrorKind) -> ErrorKind {
		self.handle.mark_terminal(kind.is_success());
		if let Some(cb) = self.callback.take() {
			cb(kind);
		}
		kind
	}
}

impl Drop for WorkerCore {
	fn drop(&mut self) {
		// A callback that never fired (e.g. the task was dropped without
		// reaching `finish`) must still observe exactly-once semantics;
		// in practice every code path in the four workers routes through
		// `finish`, so this only guards against future state-machine bugs.
		if let Some(cb) = self.callback.take() {
			warn!("worker dropped without reaching finish(); surfacing StateMachineBroken");
			cb(ErrorKind::StateMachineBroken);
		}
	}
}

/// Binds a fresh ephemeral UDP socket on `bind_ip`, giving the worker its
/// own local TID distinct from the listener's service port (spec §4.9).
pub(crate) async fn bind_ephemeral(bind_ip: std::net::IpAddr) -> std::io::Result<UdpSocket> {
	UdpSocket::bind(SocketAddr::new(bind_ip, 0)).await
}
