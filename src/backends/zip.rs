//! The ZIP archive format, read-only, via the central directory
//! (`spec.md` §6). Parsing is delegated to `zip_structs`; entries stored
//! with compression method 8 (deflate) are inflated eagerly at open time
//! with `miniz_oxide`, the same library the rest of the corpus reaches for
//! when it needs a raw-deflate inflater.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;

use zip_structs::zip_central_directory::{ZipCentralDirectoryEnd, ZipCentralDirectoryFileHeader};
use zip_structs::zip_local_file::ZipLocalFileHeader;

use crate::backend::{ArchiveBackendFactory, Backend, BackendFile, BackendIter, FileInfo, OpenFlags};
use crate::error::Error;
use crate::path;
use crate::stream::{MemoryStream, Stream};

const METHOD_STORE: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

struct ZipEntry {
	name: String,
	data: Vec<u8>,
}

/// A parsed ZIP file. Every entry is inflated once at open time and held
/// in memory, the same trade-off `PakBackend` makes; there is no
/// incremental/streaming decompression path.
pub struct ZipBackend {
	entries: Vec<ZipEntry>,
}

impl std::fmt::Debug for ZipBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ZipBackend").field("entries", &self.entries.len()).finish()
	}
}

fn map_zip_err(err: zip_structs::zip_error::ZipReadError) -> Error {
	log::error!("rejecting corrupt ZIP archive: {err:?}");
	Error::InvalidFile("malformed ZIP archive")
}

impl ZipBackend {
	pub fn open(mut stream: Box<dyn Stream>) -> Result<Self, Error> {
		let bytes = stream.read_all()?;
		let mut cursor = Cursor::new(bytes);

		let end = ZipCentralDirectoryEnd::from_reader(&mut cursor).map_err(map_zip_err)?;

		cursor
			.seek(SeekFrom::Start(u64::from(end.central_directory_offset)))
			.map_err(Error::from)?;

		let mut headers = Vec::with_capacity(end.total_number_of_central_directory_record as usize);
		for _ in 0..end.total_number_of_central_directory_record {
			headers.push(ZipCentralDirectoryFileHeader::from_reader(&mut cursor).map_err(map_zip_err)?);
		}

		let mut entries = Vec::with_capacity(headers.len());

		for header in &headers {
			let name = String::from_utf8_lossy(&header.file_name_raw).replace('\\', "/");

			if name.ends_with('/') {
				// Explicit directory entry; implicit directories are derived
				// from file paths regardless, so this carries no information.
				continue;
			}

			cursor
				.seek(SeekFrom::Start(u64::from(header.relative_offset_of_local_file_header)))
				.map_err(Error::from)?;
			let local = ZipLocalFileHeader::from_reader(&mut cursor).map_err(map_zip_err)?;

			let mut raw = vec![0u8; local.compressed_size as usize];
			cursor.read_exact(&mut raw).map_err(Error::from)?;

			let data = match local.compression_method {
				METHOD_STORE => raw,
				METHOD_DEFLATE => miniz_oxide::inflate::decompress_to_vec(&raw).map_err(|err| {
					log::error!("rejecting corrupt ZIP entry {name:?}: inflate failed ({err:?})");
					Error::InvalidFile("failed to inflate a ZIP entry")
				})?,
				other => {
					log::error!("rejecting ZIP entry {name:?}: unsupported compression method {other}");
					return Err(Error::InvalidFile("unsupported ZIP compression method"));
				}
			};

			entries.push(ZipEntry { name, data });
		}

		Ok(Self { entries })
	}

	fn find(&self, p: &str) -> Option<&ZipEntry> {
		let p = p.trim_start_matches('/');
		self.entries.iter().find(|e| path::compare(&e.name, p))
	}
}

impl Backend for ZipBackend {
	fn info(&self, path_: &str) -> Result<FileInfo, Error> {
		if let Some(entry) = self.find(path_) {
			return Ok(FileInfo {
				size: entry.data.len() as u64,
				last_access_time: 0,
				last_modified_time: 0,
				is_directory: false,
				is_symlink: false,
			});
		}

		let p = path_.trim_start_matches('/');
		if p.is_empty() || self.entries.iter().any(|e| path::begins_with(&e.name, p)) {
			return Ok(FileInfo::directory());
		}

		Err(Error::DoesNotExist)
	}

	fn file_open(&self, path_: &str, flags: OpenFlags) -> Result<Box<dyn BackendFile>, Error> {
		if flags.contains(OpenFlags::WRITE) {
			return Err(Error::InvalidOperation("ZIP archives are read-only"));
		}

		let entry = self.find(path_).ok_or(Error::DoesNotExist)?;
		Ok(Box::new(ZipFile {
			data: MemoryStream::new(entry.data.clone()),
			size: entry.data.len() as u64,
		}))
	}

	fn first(&self, dir: &str) -> Result<Option<Box<dyn BackendIter>>, Error> {
		let dir = dir.trim_start_matches('/');
		let mut seen = std::collections::HashSet::new();
		let mut items: Vec<(String, Option<u64>)> = Vec::new();

		for entry in &self.entries {
			let Some(tail) = path::trim_base(&entry.name, dir) else {
				continue;
			};

			let Some(first_seg) = path::first_segment(tail) else {
				return Err(Error::InvalidOperation("cannot iterate a file"));
			};
			let first_seg = first_seg.as_str();

			if !seen.insert(first_seg.to_string()) {
				continue;
			}

			let is_file = path::compare(first_seg, tail);
			items.push((first_seg.to_string(), if is_file { Some(entry.data.len() as u64) } else { None }));
		}

		if items.is_empty() {
			return Ok(None);
		}

		Ok(Some(Box::new(ZipIter { items, index: 0 })))
	}
}

struct ZipFile {
	data: MemoryStream,
	size: u64,
}

impl Stream for ZipFile {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		self.data.read(buf)
	}

	fn write(&mut self, _buf: &[u8]) -> Result<usize, Error> {
		Err(Error::InvalidOperation("ZIP archives are read-only"))
	}

	fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
		self.data.seek(pos)
	}
}

impl BackendFile for ZipFile {
	fn info(&self) -> Result<FileInfo, Error> {
		Ok(FileInfo {
			size: self.size,
			last_access_time: 0,
			last_modified_time: 0,
			is_directory: false,
			is_symlink: false,
		})
	}
}

struct ZipIter {
	items: Vec<(String, Option<u64>)>,
	index: usize,
}

impl BackendIter for ZipIter {
	fn name(&self) -> &str {
		&self.items[self.index].0
	}

	fn info(&self) -> Result<FileInfo, Error> {
		let (_, size) = &self.items[self.index];
		Ok(match size {
			Some(size) => FileInfo {
				size: *size,
				last_access_time: 0,
				last_modified_time: 0,
				is_directory: false,
				is_symlink: false,
			},
			None => FileInfo::directory(),
		})
	}

	fn advance(mut self: Box<Self>) -> Result<Option<Box<dyn BackendIter>>, Error> {
		self.index += 1;
		if self.index >= self.items.len() {
			return Ok(None);
		}
		Ok(Some(self))
	}
}

/// Registers the `.zip` extension with an [`ArchiveTypeRegistry`](crate::archive::ArchiveTypeRegistry).
pub struct ZipFactory;

impl ArchiveBackendFactory for ZipFactory {
	fn open(&self, stream: Box<dyn Stream>) -> Result<Arc<dyn Backend>, Error> {
		Ok(Arc::new(ZipBackend::open(stream)?))
	}
}
