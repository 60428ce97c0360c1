//! Abstract operations every backend implements, and the file-info type
//! shared by every operation that reports on an entry.
//!
//! `spec.md` §4.2: a backend is a value exporting a fixed operation table.
//! The core invokes only through this table; no backend ever calls
//! another backend directly, only through the owning filesystem's public
//! operations (which re-enter the resolver). In Rust this becomes a
//! trait object (`Arc<dyn Backend>`) rather than a C vtable, but the rule
//! against cyclic backend-to-backend calls is unchanged — see
//! `backends::sub`, which re-enters through `VirtualFs` rather than
//! holding a `Backend` of its own.

use std::io::SeekFrom;
use std::sync::Arc;

use crate::error::Error;
use crate::stream::Stream;

bitflags::bitflags! {
	/// Access and descent flags accepted by the public operations
	/// (`spec.md` §6).
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct OpenFlags: u32 {
		const READ                     = 1 << 0;
		const WRITE                    = 1 << 1;
		const APPEND                   = 1 << 2;
		const TRUNCATE                 = 1 << 3;
		const EXCLUSIVE                = 1 << 4;
		const TEMP                     = 1 << 5;
		const VERBOSE                  = 1 << 6;
		const TRANSPARENT              = 1 << 7;
		const ONLY_MOUNTS              = 1 << 8;
		const IGNORE_MOUNTS            = 1 << 9;
		const NO_ABOVE_ROOT_NAVIGATION = 1 << 10;
	}
}

impl Default for OpenFlags {
	fn default() -> Self {
		Self::READ | Self::TRANSPARENT
	}
}

/// `{size, last_access_time, last_modified_time, is_directory, is_symlink}`
/// (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
	pub size: u64,
	pub last_access_time: i64,
	pub last_modified_time: i64,
	pub is_directory: bool,
	pub is_symlink: bool,
}

impl FileInfo {
	#[must_use]
	pub fn directory() -> Self {
		Self {
			size: 0,
			last_access_time: 0,
			last_modified_time: 0,
			is_directory: true,
			is_symlink: false,
		}
	}
}

/// The per-file sub-contract (`spec.md` §3's "file sub-contract").
pub trait BackendFile: Stream + Send {
	fn info(&self) -> Result<FileInfo, Error>;

	/// Backends that can cheaply clone their read cursor should do so;
	/// backends that can't (e.g. a write-open native file) return
	/// [`Error::InvalidOperation`] (`spec.md` §4.8).
	fn duplicate(&self) -> Result<Box<dyn BackendFile>, Error> {
		Err(Error::InvalidOperation("this file handle cannot be duplicated"))
	}
}

/// The per-directory iterator sub-contract. `first`/`next`/`free` become a
/// type consumed by value and advanced by value: `advance` returns `None`
/// to end the sequence, which by ordinary Rust ownership also frees it
/// (`spec.md` §9's note on exposing this as an iterator-shaped type rather
/// than the source's reallocating-buffer discipline).
pub trait BackendIter: Send {
	fn name(&self) -> &str;

	fn info(&self) -> Result<FileInfo, Error>;

	fn advance(self: Box<Self>) -> Result<Option<Box<dyn BackendIter>>, Error>;
}

/// The capability bundle every backend exports (`spec.md` §3/§4.2). Any
/// operation a backend doesn't support is a null slot: the default body
/// returns [`Error::NotImplemented`], which surfaces to the caller exactly
/// as the C vtable's null function pointer would.
pub trait Backend: Send + Sync {
	/// `true` for backends that read/write the host file system directly
	/// and ignore the stream passed to `init` (native OS backends).
	/// `spec.md` §3: "root-backed".
	fn is_root_backed(&self) -> bool {
		false
	}

	fn ioctl(&self, _code: u32, _arg: &mut [u8]) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	fn remove(&self, _path: &str) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	fn rename(&self, _old: &str, _new: &str) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	fn mkdir(&self, _path: &str) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	fn info(&self, path: &str) -> Result<FileInfo, Error>;

	fn file_open(&self, path: &str, flags: OpenFlags) -> Result<Box<dyn BackendFile>, Error>;

	/// Opens a fresh, independent stream onto `path`. Used by the archive
	/// cache to feed a nested archive backend's `init` — a new stream per
	/// child rather than a shared, mutex-guarded one (`spec.md` §5's
	/// "implementation decision invisible to callers"; see `DESIGN.md`).
	fn open_stream(&self, path: &str) -> Result<Box<dyn Stream>, Error> {
		let file = self.file_open(path, OpenFlags::READ)?;
		Ok(Box::new(BackendFileStream(file)))
	}

	fn first(&self, dir: &str) -> Result<Option<Box<dyn BackendIter>>, Error>;
}

/// Adapts a [`BackendFile`] (which already implements [`Stream`]) into a
/// boxed [`Stream`] trait object.
struct BackendFileStream(Box<dyn BackendFile>);

impl Stream for BackendFileStream {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		self.0.read(buf)
	}

	fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
		self.0.write(buf)
	}

	fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
		self.0.seek(pos)
	}

	fn tell(&mut self) -> Result<u64, Error> {
		self.0.tell()
	}

	fn flush(&mut self) -> Result<(), Error> {
		self.0.flush()
	}
}

/// Creates a backend instance for one archive file. Implemented once per
/// archive format (ZIP, PAK, ...) and registered with the
/// [`archive::registry::ArchiveTypeRegistry`](crate::archive::registry::ArchiveTypeRegistry).
pub trait ArchiveBackendFactory: Send + Sync {
	/// Reads `stream` (the archive's bytes, as exposed by its parent
	/// backend) and produces a ready-to-use backend for everything inside
	/// it.
	fn open(&self, stream: Box<dyn Stream>) -> Result<Arc<dyn Backend>, Error>;
}
