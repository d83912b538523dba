//! Wire frame codec for the five TFTP packet kinds (RFC 1350 §5).
//!
//! All multi-byte integers are big-endian. Request and error packets are
//! NUL-terminated; data and ack packets are not.

use std::collections::HashMap;
use std::fmt;

pub const MAX_DATA_LEN: usize = 512;
/// 4-byte data header + max payload; the largest frame this codec ever produces.
pub const MAX_FRAME_LEN: usize = 4 + MAX_DATA_LEN;

pub mod opcode {
	pub const READ_REQUEST: u16 = 1;
	pub const WRITE_REQUEST: u16 = 2;
	pub const DATA: u16 = 3;
	pub const ACK: u16 = 4;
	pub const ERROR: u16 = 5;
}

/// The 2-byte error code carried by an `Error` packet (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum WireErrorCode {
	NotDefined = 0,
	FileNotFound = 1,
	AccessViolation = 2,
	DiskFull = 3,
	IllegalOperation = 4,
	UnknownTid = 5,
	FileAlreadyExists = 6,
	NoSuchUser = 7,
}

impl WireErrorCode {
	fn from_u16(v: u16) -> Self {
		match v {
			1 => Self::FileNotFound,
			2 => Self::AccessViolation,
			3 => Self::DiskFull,
			4 => Self::IllegalOperation,
			5 => Self::UnknownTid,
			6 => Self::FileAlreadyExists,
			7 => Self::NoSuchUser,
			// Per spec, the decoder preserves whatever was on the wire; an
			// out-of-range code degrades to NotDefined rather than failing
			// the whole packet.
			_ => Self::NotDefined,
		}
	}
}

impl fmt::Display for WireErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", *self as u16)
	}
}

/// Transfer mode carried in a request packet. Only `Octet` is acted on;
/// `NetAscii` is recognized but not translated (spec §1 non-goal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	Octet,
	NetAscii,
}

impl Mode {
	pub fn parse(s: &str) -> Option<Self> {
		match s.to_ascii_lowercase().as_str() {
			"octet" => Some(Self::Octet),
			"netascii" => Some(Self::NetAscii),
			_ => None,
		}
	}

	fn as_str(&self) -> &'static str {
		match self {
			Self::Octet => "octet",
			Self::NetAscii => "netascii",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
	ReadRequest,
	WriteRequest,
	Data,
	Ack,
	Error,
}

impl Opcode {
	fn from_u16(v: u16) -> Option<Self> {
		match v {
			opcode::READ_REQUEST => Some(Self::ReadRequest),
			opcode::WRITE_REQUEST => Some(Self::WriteRequest),
			opcode::DATA => Some(Self::Data),
			opcode::ACK => Some(Self::Ack),
			opcode::ERROR => Some(Self::Error),
			_ => None,
		}
	}
}

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum PacketError {
	#[error("frame too short to contain a valid packet")]
	TooShort,
	#[error("unknown opcode")]
	UnknownOpcode,
	#[error("string field missing its NUL terminator")]
	Unterminated,
	#[error("expected opcode {expected:?}, got {got:?}")]
	OpcodeMismatch { expected: Opcode, got: Opcode },
	#[error("filename must be 1..=255 bytes with no embedded NUL")]
	InvalidFilename,
	#[error("transfer mode string is not valid UTF-8 or not recognized")]
	InvalidMode,
}

/// A parsed or to-be-encoded TFTP packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
	ReadRequest {
		filename: String,
		mode: Mode,
		options: HashMap<String, String>,
	},
	WriteRequest {
		filename: String,
		mode: Mode,
		options: HashMap<String, String>,
	},
	Data {
		block: u16,
		payload: Vec<u8>,
	},
	Ack {
		block: u16,
	},
	Error {
		code: WireErrorCode,
		message: String,
	},
}

impl Packet {
	pub fn opcode(&self) -> Opcode {
		match self {
			Self::ReadRequest { .. } => Opcode::ReadRequest,
			Self::WriteRequest { .. } => Opcode::WriteRequest,
			Self::Data { .. } => Opcode::Data,
			Self::Ack { .. } => Opcode::Ack,
			Self::Error { .. } => Opcode::Error,
		}
	}

	/// True for a `Data` packet whose payload is strictly less than
	/// [`MAX_DATA_LEN`] bytes — the terminal block of a transfer.
	pub fn is_terminal_data(&self) -> bool {
		matches!(self, Self::Data { payload, .. } if payload.len() < MAX_DATA_LEN)
	}

	pub fn read_request(filename: &str, mode: Mode) -> Result<Self, PacketError> {
		validate_filename(filename)?;
		Ok(Self::ReadRequest {
			filename: filename.to_string(),
			mode,
			options: HashMap::new(),
		})
	}

	pub fn write_request(filename: &str, mode: Mode) -> Result<Self, PacketError> {
		validate_filename(filename)?;
		Ok(Self::WriteRequest {
			filename: filename.to_string(),
			mode,
			options: HashMap::new(),
		})
	}

	pub fn data(block: u16, payload: Vec<u8>) -> Self {
		debug_assert!(payload.len() <= MAX_DATA_LEN);
		Self::Data { block, payload }
	}

	pub fn ack(block: u16) -> Self {
		Self::Ack { block }
	}

	pub fn error(code: WireErrorCode, message: impl Into<String>) -> Self {
		Self::Error {
			code,
			message: message.into(),
		}
	}

	/// Serialize this packet to its wire representation.
	pub fn encode(&self) -> Vec<u8> {
		let mut buf = Vec::with_capacity(MAX_FRAME_LEN);
		match self {
			Self::ReadRequest { filename, mode, options } | Self::WriteRequest { filename, mode, options } => {
				let op = if matches!(self, Self::ReadRequest { .. }) {
					opcode::READ_REQUEST
				} else {
					opcode::WRITE_REQUEST
				};
				buf.extend_from_slice(&op.to_be_bytes());
				buf.extend_from_slice(filename.as_bytes());
				buf.push(0);
				buf.extend_from_slice(mode.as_str().as_bytes());
				buf.push(0);
				for (k, v) in options {
					buf.extend_from_slice(k.as_bytes());
					buf.push(0);
					buf.extend_from_slice(v.as_bytes());
					buf.push(0);
				}
			}
			Self::Data { block, payload } => {
				buf.extend_from_slice(&opcode::DATA.to_be_bytes());
				buf.extend_from_slice(&block.to_be_bytes());
				buf.extend_from_slice(payload);
			}
			Self::Ack { block } => {
				buf.extend_from_slice(&opcode::ACK.to_be_bytes());
				buf.extend_from_slice(&block.to_be_bytes());
			}
			Self::Error { code, message } => {
				buf.extend_from_slice(&opcode::ERROR.to_be_bytes());
				buf.extend_from_slice(&(*code as u16).to_be_bytes());
				buf.extend_from_slice(message.as_bytes());
				buf.push(0);
			}
		}
		buf
	}

	/// Parse a wire frame. When `expect` is given and the decoded opcode
	/// differs, fails with `OpcodeMismatch` *unless* the decoded packet is
	/// an `Error` — the caller may still want to read that out (spec §4.1).
	pub fn decode(buf: &[u8], expect: Option<Opcode>) -> Result<Self, PacketError> {
		if buf.len() < 4 {
			return Err(PacketError::TooShort);
		}
		let raw_op = u16::from_be_bytes([buf[0], buf[1]]);
		let op = Opcode::from_u16(raw_op).ok_or(PacketError::UnknownOpcode)?;

		let pkt = match op {
			Opcode::ReadRequest | Opcode::WriteRequest => decode_request(buf, op)?,
			Opcode::Data => decode_data(buf)?,
			Opcode::Ack => decode_ack(buf)?,
			Opcode::Error => decode_error(buf)?,
		};

		if let Some(expected) = expect {
			if pkt.opcode() != expected && pkt.opcode() != Opcode::Error {
				return Err(PacketError::OpcodeMismatch { expected, got: pkt.opcode() });
			}
		}
		Ok(pkt)
	}
}

fn validate_filename(filename: &str) -> Result<(), PacketError> {
	let len = filename.len();
	if len == 0 || len > 255 || filename.as_bytes().contains(&0) {
		return Err(PacketError::InvalidFilename);
	}
	Ok(())
}

fn split_nul_terminated(buf: &[u8]) -> Result<(&[u8], &[u8]), PacketError> {
	let pos = buf.iter().position(|&b| b == 0).ok_or(PacketError::Unterminated)?;
	Ok((&buf[..pos], &buf[pos + 1..]))
}

fn decode_request(buf: &[u8], op: Opcode) -> Result<Packet, PacketError> {
	if buf.len() < 6 {
		return Err(PacketError::TooShort);
	}
	let rest = &buf[2..];
	let (filename_bytes, rest) = split_nul_terminated(rest)?;
	let filename = std::str::from_utf8(filename_bytes).map_err(|_| PacketError::InvalidFilename)?;
	validate_filename(filename)?;

	let (mode_bytes, mut rest) = split_nul_terminated(rest)?;
	let mode_str = std::str::from_utf8(mode_bytes).map_err(|_| PacketError::InvalidMode)?;
	let mode = Mode::parse(mode_str).ok_or(PacketError::InvalidMode)?;

	let mut options = HashMap::new();
	while !rest.is_empty() {
		let (key_bytes, after_key) = match split_nul_terminated(rest) {
			Ok(v) => v,
			Err(_) => break,
		};
		if key_bytes.is_empty() {
			break;
		}
		let (val_bytes, after_val) = split_nul_terminated(after_key)?;
		let key = std::str::from_utf8(key_bytes).map_err(|_| PacketError::InvalidFilename)?;
		let val = std::str::from_utf8(val_bytes).map_err(|_| PacketError::InvalidFilename)?;
		options.insert(key.to_string(), val.to_string());
		rest = after_val;
	}

	let filename = filename.to_string();
	Ok(match op {
		Opcode::ReadRequest => Packet::ReadRequest { filename, mode, options },
		Opcode::WriteRequest => Packet::WriteRequest { filename, mode, options },
		_ => unreachable!(),
	})
}

fn decode_data(buf: &[u8]) -> Result<Packet, PacketError> {
	if buf.len() < 4 {
		return Err(PacketError::TooShort);
	}
	let block = u16::from_be_bytes([buf[2], buf[3]]);
	Ok(Packet::Data { block, payload: buf[4..].to_vec() })
}

fn decode_ack(buf: &[u8]) -> Result<Packet, PacketError> {
	if buf.len() < 4 {
		return Err(PacketError::TooShort);
	}
	let block = u16::from_be_bytes([buf[2], buf[3]]);
	Ok(Packet::Ack { block })
}

fn decode_error(buf: &[u8]) -> Result<Packet, PacketError> {
	if buf.len() < 4 {
		return Err(PacketError::TooShort);
	}
	let code = WireErrorCode::from_u16(u16::from_be_bytes([buf[2], buf[3]]));
	let (msg_bytes, _) = split_nul_terminated(&buf[4..])?;
	let message = String::from_utf8_lossy(msg_bytes).into_owned();
	Ok(Packet::Error { code, message })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_read_request() {
		let pkt = Packet::read_request("small", Mode::Octet).unwrap();
		let encoded = pkt.encode();
		let decoded = Packet::decode(&encoded, Some(Opcode::ReadRequest)).unwrap();
		assert_eq!(pkt, decoded);
	}

	#[test]
	fn round_trips_write_request() {
		let pkt = Packet::write_request("big.bin", Mode::Octet).unwrap();
		let decoded = Packet::decode(&pkt.encode(), None).unwrap();
		assert_eq!(pkt, decoded);
	}

	#[test]
	fn round_trips_data_and_ack() {
		let data = Packet::data(7, vec![1, 2, 3]);
		assert_eq!(data, Packet::decode(&data.encode(), Some(Opcode::Data)).unwrap());

		let ack = Packet::ack(7);
		assert_eq!(ack, Packet::decode(&ack.encode(), Some(Opcode::Ack)).unwrap());
	}

	#[test]
	fn round_trips_error() {
		let err = Packet::error(WireErrorCode::FileNotFound, "nope");
		assert_eq!(err, Packet::decode(&err.encode(), Some(Opcode::Error)).unwrap());
	}

	#[test]
	fn data_of_exactly_512_is_not_terminal() {
		let pkt = Packet::data(1, vec![0u8; 512]);
		assert!(!pkt.is_terminal_data());
	}

	#[test]
	fn data_under_512_is_terminal() {
		let pkt = Packet::data(1, vec![0u8; 511]);
		assert!(pkt.is_terminal_data());
		let empty = Packet::data(2, vec![]);
		assert!(empty.is_terminal_data());
	}

	#[test]
	fn empty_filename_is_rejected() {
		assert_eq!(Packet::read_request("", Mode::Octet).unwrap_err(), PacketError::InvalidFilename);
	}

	#[test]
	fn filename_of_255_is_accepted_256_is_not() {
		let name_255 = "a".repeat(255);
		assert!(Packet::read_request(&name_255, Mode::Octet).is_ok());
		let name_256 = "a".repeat(256);
		assert_eq!(
			Packet::read_request(&name_256, Mode::Octet).unwrap_err(),
			PacketError::InvalidFilename
		);
	}

	#[test]
	fn too_short_buffer_is_rejected() {
		assert_eq!(Packet::decode(&[0, 1, 2], None).unwrap_err(), PacketError::TooShort);
	}

	#[test]
	fn unknown_opcode_is_rejected() {
		assert_eq!(Packet::decode(&[0, 9, 0, 0], None).unwrap_err(), PacketError::UnknownOpcode);
	}

	#[test]
	fn unterminated_request_is_rejected() {
		let buf = [0, 1, b'x', b'y'];
		assert_eq!(Packet::decode(&buf, None).unwrap_err(), PacketError::Unterminated);
	}

	#[test]
	fn opcode_mismatch_is_reported_unless_error_packet() {
		let ack = Packet::ack(1);
		let err = Packet::decode(&ack.encode(), Some(Opcode::Data)).unwrap_err();
		assert_eq!(err, PacketError::OpcodeMismatch { expected: Opcode::Data, got: Opcode::Ack });

		// An Error packet is accepted even if a different opcode was expected.
		let wire_err = Packet::error(WireErrorCode::FileNotFound, "boom");
		let decoded = Packet::decode(&wire_err.encode(), Some(Opcode::Ack)).unwrap();
		assert_eq!(decoded, wire_err);
	}

	#[test]
	fn request_options_are_parsed_but_optional() {
		let mut buf = Packet::read_request("f", Mode::Octet).unwrap().encode();
		buf.extend_from_slice(b"blksize\0");
		buf.extend_from_slice(b"1024\0");
		let decoded = Packet::decode(&buf, Some(Opcode::ReadRequest)).unwrap();
		match decoded {
			Packet::ReadRequest { options, .. } => {
				assert_eq!(options.get("blksize").map(String::as_str), Some("1024"));
			}
			_ => panic!("expected a read request"),
		}
	}

	#[test]
	fn netascii_mode_is_recognized() {
		let pkt = Packet::read_request("f", Mode::NetAscii).unwrap();
		let decoded = Packet::decode(&pkt.encode(), None).unwrap();
		match decoded {
			Packet::ReadRequest { mode, .. } => assert_eq!(mode, Mode::NetAscii),
			_ => panic!("expected a read request"),
		}
	}
}
