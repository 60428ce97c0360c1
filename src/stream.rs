//! Byte-oriented I/O primitive consumed by archive backends.
//!
//! `spec.md` §4.3 treats the stream abstraction as an external primitive;
//! this module supplies the trait and the two concrete adapters every
//! backend in this crate actually needs (a plain file, and an in-memory
//! byte slice for archive entries that have already been read into RAM).

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::Error;

/// A sequential byte source/sink with seek/tell/read/write/flush. Streams
/// must tolerate backward seeks; they are not required to be independent
/// across logical readers sharing the same backing file (`spec.md` §4.3).
pub trait Stream: Send {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

	fn write(&mut self, _buf: &[u8]) -> Result<usize, Error> {
		Err(Error::NotImplemented)
	}

	fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error>;

	fn tell(&mut self) -> Result<u64, Error> {
		self.seek(SeekFrom::Current(0))
	}

	fn flush(&mut self) -> Result<(), Error> {
		Ok(())
	}

	/// Reads the stream to the end into a fresh buffer, seeking back to the
	/// position it started at. Archive backends use this to read their
	/// whole directory/table-of-contents in one shot.
	fn read_all(&mut self) -> Result<Vec<u8>, Error> {
		let start = self.tell()?;
		self.seek(SeekFrom::End(0))?;
		let end = self.tell()?;
		self.seek(SeekFrom::Start(start))?;

		let mut buf = vec![0u8; (end - start) as usize];
		let mut filled = 0;

		while filled < buf.len() {
			let n = self.read(&mut buf[filled..])?;
			if n == 0 {
				break;
			}
			filled += n;
		}

		buf.truncate(filled);
		self.seek(SeekFrom::Start(start))?;
		Ok(buf)
	}
}

fn map_seek_err(err: std::io::Error) -> Error {
	if err.kind() == std::io::ErrorKind::InvalidInput {
		Error::BadSeek
	} else {
		Error::Io(err)
	}
}

impl Stream for std::fs::File {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		Ok(Read::read(self, buf)?)
	}

	fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
		Ok(Write::write(self, buf)?)
	}

	fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
		Seek::seek(self, pos).map_err(map_seek_err)
	}

	fn flush(&mut self) -> Result<(), Error> {
		Ok(Write::flush(self)?)
	}
}

/// A stream over an owned, in-memory byte buffer. Used for archive entries
/// that have been decompressed or otherwise materialized in RAM, and by
/// tests that synthesize archive fixtures without touching disk.
pub struct MemoryStream {
	inner: std::io::Cursor<Vec<u8>>,
}

impl MemoryStream {
	#[must_use]
	pub fn new(bytes: Vec<u8>) -> Self {
		Self {
			inner: std::io::Cursor::new(bytes),
		}
	}

	#[must_use]
	pub fn into_inner(self) -> Vec<u8> {
		self.inner.into_inner()
	}
}

impl Stream for MemoryStream {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		Ok(Read::read(&mut self.inner, buf)?)
	}

	fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
		Ok(Write::write(&mut self.inner, buf)?)
	}

	fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
		Seek::seek(&mut self.inner, pos).map_err(map_seek_err)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn memory_stream_round_trip() {
		let mut s = MemoryStream::new(b"hello world".to_vec());
		let mut buf = [0u8; 5];
		assert_eq!(Stream::read(&mut s, &mut buf).unwrap(), 5);
		assert_eq!(&buf, b"hello");
		assert_eq!(s.tell().unwrap(), 5);
		s.seek(SeekFrom::Start(6)).unwrap();
		let rest = s.read_all().unwrap();
		assert_eq!(rest, b"world");
	}
}
