//! The bit-exact PAK archive format (`spec.md` §6): a four-byte magic, a
//! flat table of contents, and nothing else. Grounded on the original
//! C reference's `fs_pak.c` — same magic, same 64-byte TOC entry layout,
//! same little-endian TOC offsets.

use std::io::SeekFrom;
use std::sync::Arc;

use crate::backend::{ArchiveBackendFactory, Backend, BackendFile, BackendIter, FileInfo, OpenFlags};
use crate::error::Error;
use crate::path;
use crate::stream::{MemoryStream, Stream};

const MAGIC: [u8; 4] = *b"PACK";
const NAME_LEN: usize = 56;
const TOC_ENTRY_LEN: usize = NAME_LEN + 4 + 4;

fn read_exact(stream: &mut dyn Stream, buf: &mut [u8]) -> Result<(), Error> {
	let mut filled = 0;
	while filled < buf.len() {
		let n = stream.read(&mut buf[filled..])?;
		if n == 0 {
			return Err(Error::InvalidFile("unexpected end of stream while reading PACK header"));
		}
		filled += n;
	}
	Ok(())
}

fn read_u32_le(stream: &mut dyn Stream) -> Result<u32, Error> {
	let mut buf = [0u8; 4];
	read_exact(stream, &mut buf)?;
	Ok(u32::from_le_bytes(buf))
}

#[derive(Debug, Clone)]
struct TocEntry {
	name: String,
	offset: u32,
	size: u32,
}

/// A parsed PAK file. The whole archive is read into memory once at open
/// time (`bytes`); entries hand out cursors onto slices of it.
pub struct PakBackend {
	bytes: Vec<u8>,
	toc: Vec<TocEntry>,
}

impl std::fmt::Debug for PakBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PakBackend").field("entries", &self.toc.len()).finish()
	}
}

impl PakBackend {
	pub fn open(mut stream: Box<dyn Stream>) -> Result<Self, Error> {
		stream.seek(SeekFrom::Start(0))?;

		let mut magic = [0u8; 4];
		read_exact(stream.as_mut(), &mut magic)?;

		if magic != MAGIC {
			log::error!("rejecting corrupt PACK archive: bad magic {magic:?}");
			return Err(Error::InvalidFile("not a PACK archive"));
		}

		let toc_offset = read_u32_le(stream.as_mut())?;
		let toc_size = read_u32_le(stream.as_mut())?;

		if toc_size as usize % TOC_ENTRY_LEN != 0 {
			log::error!("rejecting corrupt PACK archive: TOC size {toc_size} is not a multiple of {TOC_ENTRY_LEN}");
			return Err(Error::InvalidFile("PACK table of contents size is not a multiple of the entry size"));
		}

		let bytes = stream.read_all()?;

		let toc_offset = toc_offset as usize;
		let toc_size = toc_size as usize;
		let toc_bytes = bytes.get(toc_offset..toc_offset + toc_size).ok_or_else(|| {
			log::error!("rejecting corrupt PACK archive: TOC span {toc_offset}..{} is out of range", toc_offset + toc_size);
			Error::InvalidFile("PACK table of contents offset is out of range")
		})?;

		let count = toc_size / TOC_ENTRY_LEN;
		let mut toc = Vec::with_capacity(count);

		for i in 0..count {
			let raw = &toc_bytes[i * TOC_ENTRY_LEN..(i + 1) * TOC_ENTRY_LEN];
			let name_buf = &raw[..NAME_LEN];
			let offset = u32::from_le_bytes(raw[NAME_LEN..NAME_LEN + 4].try_into().unwrap());
			let size = u32::from_le_bytes(raw[NAME_LEN + 4..NAME_LEN + 8].try_into().unwrap());

			let nul = name_buf.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
			let name = String::from_utf8_lossy(&name_buf[..nul]).into_owned();

			toc.push(TocEntry { name, offset, size });
		}

		Ok(Self { bytes, toc })
	}

	fn find(&self, p: &str) -> Option<&TocEntry> {
		let p = p.trim_start_matches('/');
		self.toc.iter().find(|e| path::compare(&e.name, p))
	}
}

impl Backend for PakBackend {
	fn info(&self, path_: &str) -> Result<FileInfo, Error> {
		if let Some(entry) = self.find(path_) {
			return Ok(FileInfo {
				size: u64::from(entry.size),
				last_access_time: 0,
				last_modified_time: 0,
				is_directory: false,
				is_symlink: false,
			});
		}

		// Not a listed file; it might still be an implicit directory.
		let p = path_.trim_start_matches('/');
		if p.is_empty() || self.toc.iter().any(|e| path::begins_with(&e.name, p)) {
			return Ok(FileInfo::directory());
		}

		Err(Error::DoesNotExist)
	}

	fn file_open(&self, path_: &str, flags: OpenFlags) -> Result<Box<dyn BackendFile>, Error> {
		if flags.contains(OpenFlags::WRITE) {
			return Err(Error::InvalidOperation("PACK archives are read-only"));
		}

		let entry = self.find(path_).ok_or(Error::DoesNotExist)?;
		let start = entry.offset as usize;
		let end = start + entry.size as usize;
		let slice = self
			.bytes
			.get(start..end)
			.ok_or_else(|| {
				log::error!("rejecting corrupt PACK entry {path_:?}: span {start}..{end} is out of range");
				Error::InvalidFile("PACK entry span is out of range")
			})?
			.to_vec();

		Ok(Box::new(PakFile {
			data: MemoryStream::new(slice),
			size: entry.size,
		}))
	}

	fn first(&self, dir: &str) -> Result<Option<Box<dyn BackendIter>>, Error> {
		let dir = dir.trim_start_matches('/');
		let mut seen = std::collections::HashSet::new();
		let mut items: Vec<(String, Option<u32>)> = Vec::new();

		for entry in &self.toc {
			let Some(tail) = path::trim_base(&entry.name, dir) else {
				continue;
			};

			let Some(first_seg) = path::first_segment(tail) else {
				// `dir` names this entry exactly; it's a file, not a directory.
				return Err(Error::InvalidOperation("cannot iterate a file"));
			};
			let first_seg = first_seg.as_str();

			if !seen.insert(first_seg.to_string()) {
				continue;
			}

			let is_file = path::compare(first_seg, tail);
			items.push((first_seg.to_string(), if is_file { Some(entry.size) } else { None }));
		}

		if items.is_empty() {
			return Ok(None);
		}

		Ok(Some(Box::new(PakIter { items, index: 0 })))
	}
}

struct PakFile {
	data: MemoryStream,
	size: u32,
}

impl Stream for PakFile {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		self.data.read(buf)
	}

	fn write(&mut self, _buf: &[u8]) -> Result<usize, Error> {
		Err(Error::InvalidOperation("PACK archives are read-only"))
	}

	fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
		self.data.seek(pos)
	}
}

impl BackendFile for PakFile {
	fn info(&self) -> Result<FileInfo, Error> {
		Ok(FileInfo {
			size: u64::from(self.size),
			last_access_time: 0,
			last_modified_time: 0,
			is_directory: false,
			is_symlink: false,
		})
	}
}

struct PakIter {
	items: Vec<(String, Option<u32>)>,
	index: usize,
}

impl BackendIter for PakIter {
	fn name(&self) -> &str {
		&self.items[self.index].0
	}

	fn info(&self) -> Result<FileInfo, Error> {
		let (_, size) = &self.items[self.index];
		Ok(match size {
			Some(size) => FileInfo {
				size: u64::from(*size),
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

/// Registers the `.pak` extension with an [`ArchiveTypeRegistry`](crate::archive::ArchiveTypeRegistry).
pub struct PakFactory;

impl ArchiveBackendFactory for PakFactory {
	fn open(&self, stream: Box<dyn Stream>) -> Result<Arc<dyn Backend>, Error> {
		Ok(Arc::new(PakBackend::open(stream)?))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn build_pak(entries: &[(&str, &[u8])]) -> Vec<u8> {
		let mut body = Vec::new();
		let mut toc = Vec::new();

		for (name, data) in entries {
			let offset = body.len() as u32;
			body.extend_from_slice(data);

			let mut name_buf = [0u8; NAME_LEN];
			let bytes = name.as_bytes();
			name_buf[..bytes.len()].copy_from_slice(bytes);
			toc.extend_from_slice(&name_buf);
			toc.extend_from_slice(&offset.to_le_bytes());
			toc.extend_from_slice(&(data.len() as u32).to_le_bytes());
		}

		let toc_offset = (4 + 4 + 4 + body.len()) as u32;
		let mut out = Vec::new();
		out.extend_from_slice(&MAGIC);
		out.extend_from_slice(&toc_offset.to_le_bytes());
		out.extend_from_slice(&(toc.len() as u32).to_le_bytes());
		out.extend_from_slice(&body);
		out.extend_from_slice(&toc);
		out
	}

	#[test]
	fn reads_flat_entries() {
		let bytes = build_pak(&[("a.txt", b"hello"), ("dir/b.txt", b"world!")]);
		let backend = PakBackend::open(Box::new(MemoryStream::new(bytes))).unwrap();

		let info = backend.info("a.txt").unwrap();
		assert_eq!(info.size, 5);
		assert!(!info.is_directory);

		let info = backend.info("dir").unwrap();
		assert!(info.is_directory);

		let mut file = backend.file_open("dir/b.txt", OpenFlags::READ).unwrap();
		let buf = file.read_all().unwrap();
		assert_eq!(buf, b"world!");
	}

	#[test]
	fn rejects_bad_magic() {
		let bytes = b"NOPE0000".to_vec();
		let result = PakBackend::open(Box::new(MemoryStream::new(bytes)));
		assert!(matches!(result, Err(Error::InvalidFile(_))));
	}

	#[test]
	fn iterates_directory_without_duplicates() {
		let bytes = build_pak(&[("dir/a.txt", b"1"), ("dir/b.txt", b"2"), ("dir/sub/c.txt", b"3")]);
		let backend = PakBackend::open(Box::new(MemoryStream::new(bytes))).unwrap();

		let mut names = Vec::new();
		let mut iter = backend.first("dir").unwrap();

		while let Some(it) = iter {
			names.push(it.name().to_string());
			iter = it.advance().unwrap();
		}

		names.sort();
		assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
	}
}
