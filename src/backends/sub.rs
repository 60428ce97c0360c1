//! A sub-filesystem view: every operation re-enters an owning
//! [`VirtualFs`] with `root_dir` prepended, after normalizing the
//! incoming path with above-root navigation forbidden. Grounded on the
//! original C reference's `fs_sub.c`, which is exactly this — a backend
//! that holds no storage of its own and forwards every call to
//! `pOwnerFS` with the path rewritten. The source carries this under two
//! names, `fs_sub` and `fs_subfs`; this crate collapses them into the
//! one type here rather than treating them as separate features.

use std::sync::Arc;

use crate::backend::{Backend, BackendFile, BackendIter, FileInfo, OpenFlags};
use crate::error::Error;
use crate::path::{self, NormalizeFlags};
use crate::stream::Stream;
use crate::VirtualFs;

/// Reprojects a subtree of `owner` as its own root. Paths passed to this
/// backend's operations are normalized with
/// [`NormalizeFlags::NO_ABOVE_ROOT_NAVIGATION`] and then appended to
/// `root_dir` before being handed to `owner`; a path that would navigate
/// above this backend's root fails with [`Error::DoesNotExist`] rather
/// than escaping into the owner's wider namespace.
#[derive(Debug)]
pub struct SubBackend {
	owner: Arc<VirtualFs>,
	root_dir: String,
}

impl SubBackend {
	#[must_use]
	pub fn new(owner: Arc<VirtualFs>, root_dir: impl Into<String>) -> Self {
		let mut root_dir = root_dir.into();
		if !root_dir.ends_with('/') {
			root_dir.push('/');
		}

		Self { owner, root_dir }
	}

	fn rewrite(&self, path_: &str) -> Result<String, Error> {
		let clean = path::normalize(path_, NormalizeFlags::NO_ABOVE_ROOT_NAVIGATION).map_err(|_| Error::DoesNotExist)?;
		Ok(path::append(&self.root_dir, &clean))
	}
}

impl Backend for SubBackend {
	fn ioctl(&self, code: u32, arg: &mut [u8]) -> Result<(), Error> {
		self.owner.ioctl(code, arg)
	}

	fn remove(&self, path_: &str) -> Result<(), Error> {
		self.owner.remove(&self.rewrite(path_)?)
	}

	fn rename(&self, old: &str, new: &str) -> Result<(), Error> {
		self.owner.rename(&self.rewrite(old)?, &self.rewrite(new)?)
	}

	fn mkdir(&self, path_: &str) -> Result<(), Error> {
		self.owner.mkdir(&self.rewrite(path_)?, OpenFlags::IGNORE_MOUNTS)
	}

	fn info(&self, path_: &str) -> Result<FileInfo, Error> {
		self.owner.info(&self.rewrite(path_)?, OpenFlags::default())
	}

	fn file_open(&self, path_: &str, flags: OpenFlags) -> Result<Box<dyn BackendFile>, Error> {
		let handle = self.owner.file_open(&self.rewrite(path_)?, flags)?;
		Ok(Box::new(SubFile { handle }))
	}

	fn first(&self, dir: &str) -> Result<Option<Box<dyn BackendIter>>, Error> {
		let dir = self.rewrite(dir)?;
		let mut iter = self.owner.first(&dir)?;

		let Some(entry) = iter.next() else {
			return Ok(None);
		};

		Ok(Some(Box::new(SubIter { iter, current: entry? })))
	}
}

struct SubFile {
	handle: crate::handle::FileHandle,
}

impl Stream for SubFile {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		self.handle.read(buf)
	}

	fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
		self.handle.write(buf)
	}

	fn seek(&mut self, pos: std::io::SeekFrom) -> Result<u64, Error> {
		self.handle.seek(pos)
	}

	fn tell(&mut self) -> Result<u64, Error> {
		self.handle.tell()
	}

	fn flush(&mut self) -> Result<(), Error> {
		self.handle.flush()
	}
}

impl BackendFile for SubFile {
	fn info(&self) -> Result<FileInfo, Error> {
		self.handle.info()
	}
}

struct SubIter {
	iter: crate::handle::DirIter,
	current: crate::handle::DirEntry,
}

impl BackendIter for SubIter {
	fn name(&self) -> &str {
		&self.current.name
	}

	fn info(&self) -> Result<FileInfo, Error> {
		Ok(self.current.info)
	}

	fn advance(mut self: Box<Self>) -> Result<Option<Box<dyn BackendIter>>, Error> {
		match self.iter.next() {
			Some(entry) => {
				self.current = entry?;
				Ok(Some(self))
			}
			None => Ok(None),
		}
	}
}
