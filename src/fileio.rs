//! File I/O adapter (spec §4.2): block-oriented read/write with explicit
//! byte counts and typed open/error reporting. Deliberately blocking —
//! the worker state machines call it inline between network operations,
//! mirroring the original `cpptftp` design (`file_io.hpp`).

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::FileIoError;
use crate::packet::MAX_DATA_LEN;

/// Opens `path` for reading. Fails with `NotFound`/`PermissionDenied`/`Other`.
pub fn open_for_read(path: &Path) -> Result<FileReader, FileIoError> {
	let file = File::open(path)?;
	Ok(FileReader { inner: BufReader::new(file) })
}

/// Opens `path` for writing, truncating any existing content. Fails with
/// `AlreadyExists` when `lazy` is false and the file is already present;
/// when `lazy` is true the existence check and the actual open are
/// deferred to the first write (spec §4.2's "possibly deferred" option).
pub fn open_for_write(path: &Path, lazy: bool) -> Result<FileWriter, FileIoError> {
	if lazy {
		return Ok(FileWriter::Lazy { path: path.to_path_buf() });
	}
	let file = OpenOptions::new().write(true).create_new(true).open(path)?;
	Ok(FileWriter::Open { inner: BufWriter::new(file) })
}

pub struct FileReader {
	inner: BufReader<File>,
}

impl FileReader {
	/// Reads up to `buf.len()` bytes, returning `(bytes_read, end_of_file)`.
	/// `bytes_read < buf.len()` is only possible at end of file.
	pub fn read_into(&mut self, buf: &mut [u8; MAX_DATA_LEN]) -> io::Result<(usize, bool)> {
		let mut total = 0;
		while total < buf.len() {
			match self.inner.read(&mut buf[total..]) {
				Ok(0) => break,
				Ok(n) => total += n,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e),
			}
		}
		Ok((total, total < buf.len()))
	}
}

pub enum FileWriter {
	Lazy { path: std::path::PathBuf },
	Open { inner: BufWriter<File> },
}

impl FileWriter {
	pub fn write_block(&mut self, data: &[u8]) -> Result<(), FileIoError> {
		if let Self::Lazy { path } = self {
			let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
			*self = Self::Open { inner: BufWriter::new(file) };
		}
		match self {
			Self::Open { inner } => {
				inner.write_all(data)?;
				// Durable on every block, per spec §4.2's flush contract.
				inner.flush()?;
				Ok(())
			}
			Self::Lazy { .. } => unreachable!("converted to Open above"),
		}
	}

	/// Flushes and closes the file. A lazily-opened writer that never saw
	/// a single block still creates an empty file, matching an empty-file
	/// upload (spec §8's empty-file boundary scenario).
	pub fn finish(mut self) -> Result<(), FileIoError> {
		if let Self::Lazy { path } = &self {
			OpenOptions::new().write(true).create_new(true).open(path)?;
			return Ok(());
		}
		if let Self::Open { inner } = &mut self {
			inner.flush()?;
		}
		Ok(())
	}
}
