//! The OS-backed backend (`spec.md` §4.2's root-backed case). Every
//! operation is a thin pass-through to `std::fs`, grounded on the original
//! C reference's `fs_posix.c` — `info`/`stat`, `file_open`/`open`,
//! `first`/`opendir`+`readdir`, one real directory entry per iteration
//! step rather than a pre-materialized listing.

use std::fs;
use std::io::{Read as _, SeekFrom, Write as _};
use std::path::PathBuf;
use std::time::SystemTime;

use crate::backend::{Backend, BackendFile, BackendIter, FileInfo, OpenFlags};
use crate::error::Error;
use crate::stream::Stream;

fn to_unix_time(t: std::io::Result<SystemTime>) -> i64 {
	t.ok()
		.and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}

fn info_from_metadata(meta: &fs::Metadata) -> FileInfo {
	FileInfo {
		size: meta.len(),
		last_access_time: to_unix_time(meta.accessed()),
		last_modified_time: to_unix_time(meta.modified()),
		is_directory: meta.is_dir(),
		is_symlink: meta.is_symlink(),
	}
}

/// Roots archive/descent operations at a real directory on the host file
/// system. `spec.md` §3: "root-backed" — [`Backend::is_root_backed`]
/// returns `true` so the resolver canonicalizes real paths it crosses
/// through this backend before using them as archive cache keys.
#[derive(Debug)]
pub struct NativeBackend {
	root: PathBuf,
}

impl NativeBackend {
	#[must_use]
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// When `root` is empty, `path` is trusted to already be a full OS
	/// path (this is how [`VirtualFs`](crate::VirtualFs) uses its single
	/// native backend: mount resolution joins a mount's physical target
	/// with the request tail before ever reaching here). A non-empty
	/// root rebases `path` underneath it instead.
	fn real_path(&self, path: &str) -> PathBuf {
		if self.root.as_os_str().is_empty() {
			return PathBuf::from(path);
		}

		self.root.join(path.trim_start_matches(['/', '\\']))
	}
}

impl Backend for NativeBackend {
	fn is_root_backed(&self) -> bool {
		true
	}

	fn remove(&self, path: &str) -> Result<(), Error> {
		let real = self.real_path(path);
		let meta = fs::symlink_metadata(&real)?;

		if meta.is_dir() {
			fs::remove_dir(&real)?;
		} else {
			fs::remove_file(&real)?;
		}

		Ok(())
	}

	fn rename(&self, old: &str, new: &str) -> Result<(), Error> {
		fs::rename(self.real_path(old), self.real_path(new))?;
		Ok(())
	}

	fn mkdir(&self, path: &str) -> Result<(), Error> {
		fs::create_dir_all(self.real_path(path))?;
		Ok(())
	}

	fn info(&self, path: &str) -> Result<FileInfo, Error> {
		let meta = fs::symlink_metadata(self.real_path(path)).map_err(|err| {
			if err.kind() == std::io::ErrorKind::NotFound {
				Error::DoesNotExist
			} else {
				Error::Io(err)
			}
		})?;
		Ok(info_from_metadata(&meta))
	}

	fn file_open(&self, path: &str, flags: OpenFlags) -> Result<Box<dyn BackendFile>, Error> {
		if let Some(stdio) = StdioFile::from_path(path) {
			return Ok(Box::new(stdio));
		}

		let real = self.real_path(path);

		let mut opts = fs::OpenOptions::new();
		opts.read(flags.contains(OpenFlags::READ));

		if flags.contains(OpenFlags::WRITE) {
			opts.write(true);

			if flags.contains(OpenFlags::EXCLUSIVE) {
				opts.create_new(true);
			} else {
				opts.create(true);
			}

			if flags.contains(OpenFlags::APPEND) {
				opts.append(true);
			} else if flags.contains(OpenFlags::TRUNCATE) {
				opts.truncate(true);
			}
		}

		let file = opts.open(&real).map_err(|err| match err.kind() {
			std::io::ErrorKind::NotFound => Error::DoesNotExist,
			std::io::ErrorKind::AlreadyExists => Error::AlreadyExists,
			_ => Error::Io(err),
		})?;

		Ok(Box::new(NativeFile { file }))
	}

	fn first(&self, dir: &str) -> Result<Option<Box<dyn BackendIter>>, Error> {
		let real = self.real_path(dir);

		let mut entries: Vec<fs::DirEntry> = match fs::read_dir(&real) {
			Ok(rd) => rd.collect::<std::io::Result<Vec<_>>>()?,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(Error::DoesNotExist),
			Err(err) => return Err(Error::Io(err)),
		};

		entries.sort_by_key(fs::DirEntry::file_name);

		NativeIter::start(entries)
	}
}

struct NativeFile {
	file: fs::File,
}

impl Stream for NativeFile {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		Stream::read(&mut self.file, buf)
	}

	fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
		Stream::write(&mut self.file, buf)
	}

	fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
		Stream::seek(&mut self.file, pos)
	}

	fn flush(&mut self) -> Result<(), Error> {
		Stream::flush(&mut self.file)
	}
}

impl BackendFile for NativeFile {
	fn info(&self) -> Result<FileInfo, Error> {
		Ok(info_from_metadata(&self.file.metadata()?))
	}

	fn duplicate(&self) -> Result<Box<dyn BackendFile>, Error> {
		Ok(Box::new(NativeFile {
			file: self.file.try_clone()?,
		}))
	}
}

const STDIN_PATH: &str = ":stdi:";
const STDOUT_PATH: &str = ":stdo:";
const STDERR_PATH: &str = ":stde:";

/// The three magic paths that resolve to the process's standard streams
/// rather than a real file (`spec.md` §6's "special filesystem paths"),
/// grounded directly on `fs_posix.c`'s `FS_STDIN`/`FS_STDOUT`/`FS_STDERR`
/// handling in `fs_file_open_posix`.
enum StdioFile {
	In(std::io::Stdin),
	Out(std::io::Stdout),
	Err(std::io::Stderr),
}

impl StdioFile {
	fn from_path(path: &str) -> Option<Self> {
		match path {
			STDIN_PATH => Some(Self::In(std::io::stdin())),
			STDOUT_PATH => Some(Self::Out(std::io::stdout())),
			STDERR_PATH => Some(Self::Err(std::io::stderr())),
			_ => None,
		}
	}
}

impl Stream for StdioFile {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		match self {
			Self::In(s) => Ok(s.read(buf)?),
			Self::Out(_) | Self::Err(_) => Err(Error::InvalidOperation("this standard stream is not readable")),
		}
	}

	fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
		match self {
			Self::Out(s) => Ok(s.write(buf)?),
			Self::Err(s) => Ok(s.write(buf)?),
			Self::In(_) => Err(Error::InvalidOperation("this standard stream is not writable")),
		}
	}

	fn seek(&mut self, _pos: SeekFrom) -> Result<u64, Error> {
		Err(Error::InvalidOperation("standard streams cannot be seeked"))
	}

	fn flush(&mut self) -> Result<(), Error> {
		match self {
			Self::Out(s) => Ok(s.flush()?),
			Self::Err(s) => Ok(s.flush()?),
			Self::In(_) => Ok(()),
		}
	}
}

impl BackendFile for StdioFile {
	fn info(&self) -> Result<FileInfo, Error> {
		Ok(FileInfo {
			size: 0,
			last_access_time: 0,
			last_modified_time: 0,
			is_directory: false,
			is_symlink: false,
		})
	}
}

struct NativeIter {
	entries: Vec<fs::DirEntry>,
	index: usize,
	name: String,
	info: FileInfo,
}

impl NativeIter {
	fn start(entries: Vec<fs::DirEntry>) -> Result<Option<Box<dyn BackendIter>>, Error> {
		if entries.is_empty() {
			return Ok(None);
		}

		let (name, info) = Self::resolve(&entries[0])?;
		Ok(Some(Box::new(Self { entries, index: 0, name, info })))
	}

	fn resolve(entry: &fs::DirEntry) -> Result<(String, FileInfo), Error> {
		let name = entry.file_name().to_string_lossy().into_owned();
		let meta = entry.metadata()?;
		Ok((name, info_from_metadata(&meta)))
	}
}

impl BackendIter for NativeIter {
	fn name(&self) -> &str {
		&self.name
	}

	fn info(&self) -> Result<FileInfo, Error> {
		Ok(self.info)
	}

	fn advance(mut self: Box<Self>) -> Result<Option<Box<dyn BackendIter>>, Error> {
		self.index += 1;

		if self.index >= self.entries.len() {
			return Ok(None);
		}

		let (name, info) = Self::resolve(&self.entries[self.index])?;
		self.name = name;
		self.info = info;
		Ok(Some(self))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn reads_and_lists_a_real_directory() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("a.txt"), b"hi").unwrap();
		fs::create_dir(dir.path().join("sub")).unwrap();

		let backend = NativeBackend::new(dir.path());

		let info = backend.info("a.txt").unwrap();
		assert_eq!(info.size, 2);
		assert!(!info.is_directory);

		let mut names = Vec::new();
		let mut iter = backend.first("").unwrap();
		while let Some(it) = iter {
			names.push(it.name().to_string());
			iter = it.advance().unwrap();
		}
		names.sort();
		assert_eq!(names, vec!["a.txt", "sub"]);
	}

	#[test]
	fn missing_file_is_does_not_exist() {
		let dir = tempfile::tempdir().unwrap();
		let backend = NativeBackend::new(dir.path());
		assert!(matches!(backend.info("nope.txt"), Err(Error::DoesNotExist)));
	}

	#[test]
	fn stdio_paths_bypass_real_files() {
		let dir = tempfile::tempdir().unwrap();
		let backend = NativeBackend::new(dir.path());

		let mut stdout = backend.file_open(":stdo:", OpenFlags::WRITE).unwrap();
		stdout.write(b"").unwrap();
		assert!(matches!(stdout.read(&mut [0u8; 1]), Err(Error::InvalidOperation(_))));

		assert!(!dir.path().join(":stdo:").exists());
	}

	#[test]
	fn write_then_read_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let backend = NativeBackend::new(dir.path());

		let mut file = backend.file_open("out.txt", OpenFlags::WRITE).unwrap();
		file.write(b"payload").unwrap();
		drop(file);

		let mut file = backend.file_open("out.txt", OpenFlags::READ).unwrap();
		let buf = file.read_all().unwrap();
		assert_eq!(buf, b"payload");
	}
}
