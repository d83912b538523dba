//! The joined wire/application error enumeration surfaced to completion
//! callbacks and CLI exit codes (spec §6, §7).

use std::io;

use crate::packet::WireErrorCode;

/// A single namespace joining the eight wire error codes with the
/// application-level completion kinds. `NoError` (0) means success.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
	#[error("no error")]
	NoError,
	#[error("peer reported: not defined")]
	NotDefined,
	#[error("peer reported: file not found")]
	FileNotFound,
	#[error("peer reported: access violation")]
	AccessViolation,
	#[error("peer reported: disk full or allocation exceeded")]
	DiskFull,
	#[error("peer reported: illegal TFTP operation")]
	IllegalOperation,
	#[error("peer reported: unknown transfer ID")]
	UnknownTid,
	#[error("peer reported: file already exists")]
	FileAlreadyExists,
	#[error("peer reported: no such user")]
	NoSuchUser,

	#[error("connection lost")]
	ConnectionLost,
	#[error("receive timed out after exhausting retries")]
	ReceiveTimeout,
	#[error("server sent an invalid or unparseable response")]
	InvalidServerResponse,
	#[error("server responded with an error packet")]
	ServerErrorResponse,
	#[error("internal state machine reached an impossible state")]
	StateMachineBroken,
	#[error("datagrams kept arriving from an unexpected endpoint")]
	NetworkInterference,
	#[error("local disk I/O failed mid-transfer")]
	DiskIoError,
	#[error("aborted by the user")]
	UserRequestedAbort,

	#[error("underlying I/O error: {0}")]
	Io(#[source] io::Error),
}

impl ErrorKind {
	pub fn is_success(&self) -> bool {
		matches!(self, Self::NoError)
	}

	/// The numeric code used as a process exit status (spec §7.3: the
	/// wire/app error code cast to i32, 0 on success).
	pub fn exit_code(&self) -> i32 {
		match self {
			Self::NoError => 0,
			Self::NotDefined => 1,
			Self::FileNotFound => 2,
			Self::AccessViolation => 3,
			Self::DiskFull => 4,
			Self::IllegalOperation => 5,
			Self::UnknownTid => 6,
			Self::FileAlreadyExists => 7,
			Self::NoSuchUser => 8,
			Self::ConnectionLost => 9,
			Self::ReceiveTimeout => 10,
			Self::InvalidServerResponse => 11,
			Self::ServerErrorResponse => 12,
			Self::StateMachineBroken => 13,
			Self::NetworkInterference => 14,
			Self::DiskIoError => 15,
			Self::UserRequestedAbort => 16,
			Self::Io(_) => 17,
		}
	}

	pub fn from_wire_error(code: WireErrorCode) -> Self {
		match code {
			WireErrorCode::NotDefined => Self::NotDefined,
			WireErrorCode::FileNotFound => Self::FileNotFound,
			WireErrorCode::AccessViolation => Self::AccessViolation,
			WireErrorCode::DiskFull => Self::DiskFull,
			WireErrorCode::IllegalOperation => Self::IllegalOperation,
			WireErrorCode::UnknownTid => Self::UnknownTid,
			WireErrorCode::FileAlreadyExists => Self::FileAlreadyExists,
			WireErrorCode::NoSuchUser => Self::NoSuchUser,
		}
	}
}

impl From<io::Error> for ErrorKind {
	fn from(e: io::Error) -> Self {
		Self::Io(e)
	}
}

impl From<FileIoError> for ErrorKind {
	fn from(_: FileIoError) -> Self {
		// Local file-open failures on the client side are never wire
		// events; surface them uniformly as a local disk fault.
		Self::DiskIoError
	}
}

/// Typed failures from the file I/O adapter (spec §4.2), kept distinct
/// from `ErrorKind` until a worker decides which wire error code, if any,
/// to surface for them.
#[derive(Debug, thiserror::Error)]
pub enum FileIoError {
	#[error("file not found")]
	NotFound,
	#[error("permission denied")]
	PermissionDenied,
	#[error("file already exists")]
	AlreadyExists,
	#[error("I/O error: {0}")]
	Other(#[source] io::Error),
}

impl From<io::Error> for FileIoError {
	fn from(e: io::Error) -> Self {
		match e.kind() {
			io::ErrorKind::NotFound => Self::NotFound,
			io::ErrorKind::PermissionDenied => Self::PermissionDenied,
			io::ErrorKind::AlreadyExists => Self::AlreadyExists,
			_ => Self::Other(e),
		}
	}
}

impl FileIoError {
	/// The wire error code a server sends back for this open failure.
	pub fn to_wire_error(&self) -> WireErrorCode {
		match self {
			Self::NotFound => WireErrorCode::FileNotFound,
			Self::PermissionDenied => WireErrorCode::AccessViolation,
			Self::AlreadyExists => WireErrorCode::FileAlreadyExists,
			Self::Other(_) => WireErrorCode::NotDefined,
		}
	}
}
