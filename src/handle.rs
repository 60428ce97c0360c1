//! Opaque file and iterator handles (`spec.md` §3/§4.8).
//!
//! A handle owns a backend-private file/iterator object plus the chain of
//! archive cache keys its resolution passed through. Dropping a handle
//! releases exactly one reference per entry in that chain — the Rust
//! `Drop` impl is what replaces the source's explicit `close`/`free`
//! calls (`spec.md` §9's note on ownership replacing co-allocation).

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::archive::ArchiveCache;
use crate::backend::{BackendFile, BackendIter, FileInfo, OpenFlags};
use crate::error::Error;

/// A directory entry produced by iteration: its name and its info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
	pub name: String,
	pub info: FileInfo,
}

fn release_chain(cache: &Mutex<ArchiveCache>, chain: &[PathBuf]) {
	if chain.is_empty() {
		return;
	}

	let mut guard = cache.lock();
	for key in chain.iter().rev() {
		guard.release(key);
	}
}

/// An open file (`spec.md` §3's "file handle"). Reads, writes, seeks, and
/// reports info through the backend it resolved to; for archive-resident
/// files it also holds one reference on each archive cache entry in its
/// resolution chain, released on drop.
pub struct FileHandle {
	inner: Box<dyn BackendFile>,
	cache: Arc<Mutex<ArchiveCache>>,
	chain: Vec<PathBuf>,
	mode: OpenFlags,
}

impl FileHandle {
	pub(crate) fn new(
		inner: Box<dyn BackendFile>,
		cache: Arc<Mutex<ArchiveCache>>,
		chain: Vec<PathBuf>,
		mode: OpenFlags,
	) -> Self {
		Self {
			inner,
			cache,
			chain,
			mode,
		}
	}

	#[must_use]
	pub fn mode(&self) -> OpenFlags {
		self.mode
	}

	pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		crate::stream::Stream::read(self.inner.as_mut(), buf)
	}

	pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
		crate::stream::Stream::write(self.inner.as_mut(), buf)
	}

	pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
		crate::stream::Stream::seek(self.inner.as_mut(), pos)
	}

	pub fn tell(&mut self) -> Result<u64, Error> {
		crate::stream::Stream::tell(self.inner.as_mut())
	}

	pub fn flush(&mut self) -> Result<(), Error> {
		crate::stream::Stream::flush(self.inner.as_mut())
	}

	pub fn info(&self) -> Result<FileInfo, Error> {
		self.inner.info()
	}

	/// Duplicates the handle, acquiring one extra reference per archive in
	/// its chain so both copies can be dropped independently
	/// (`spec.md` §4.8).
	pub fn duplicate(&self) -> Result<FileHandle, Error> {
		let inner = self.inner.duplicate()?;

		if !self.chain.is_empty() {
			let mut guard = self.cache.lock();
			for key in &self.chain {
				// The entry is known-live (this handle holds a reference
				// on it), so re-opening cannot fail; `get_or_open` with
				// `lazy_allowed: true` just bumps the refcount.
				let _ = guard.get_or_open(key.clone(), None, true, || {
					unreachable!("duplicate() only bumps refcounts on already-live entries")
				});
			}
		}

		Ok(FileHandle {
			inner,
			cache: self.cache.clone(),
			chain: self.chain.clone(),
			mode: self.mode,
		})
	}
}

impl Drop for FileHandle {
	fn drop(&mut self) {
		release_chain(&self.cache, &self.chain);
	}
}

/// A lazy forward cursor over a directory's contents, merged across every
/// read-mount whose virtual prefix matches the iteration target
/// (`spec.md` §3's "iterator handle", §4.6's iteration merge).
pub struct DirIter {
	sources: std::vec::IntoIter<(Box<dyn BackendIter>, Vec<PathBuf>)>,
	current: Option<(Box<dyn BackendIter>, Vec<PathBuf>)>,
	seen: HashSet<String>,
	cache: Arc<Mutex<ArchiveCache>>,
}

impl DirIter {
	pub(crate) fn new(sources: Vec<(Box<dyn BackendIter>, Vec<PathBuf>)>, cache: Arc<Mutex<ArchiveCache>>) -> Self {
		let mut sources = sources.into_iter();
		let current = sources.next();

		Self {
			sources,
			current,
			seen: HashSet::new(),
			cache,
		}
	}
}

impl Iterator for DirIter {
	type Item = Result<DirEntry, Error>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let Some((iter, chain)) = self.current.take() else {
				return None;
			};

			let name = iter.name().to_string();
			let info = match iter.info() {
				Ok(info) => info,
				Err(err) => {
					release_chain(&self.cache, &chain);
					self.current = self.sources.next();
					return Some(Err(err));
				}
			};

			let advanced = iter.advance();

			match advanced {
				Ok(next_iter) => {
					self.current = next_iter.map(|it| (it, chain)).or_else(|| {
						release_chain(&self.cache, &chain);
						self.sources.next()
					});
				}
				Err(err) => {
					release_chain(&self.cache, &chain);
					self.current = self.sources.next();
					return Some(Err(err));
				}
			}

			if self.seen.insert(name.clone()) {
				return Some(Ok(DirEntry { name, info }));
			}
			// De-duplicated in favor of a higher-precedence source that
			// already yielded this name; keep pulling.
		}
	}
}

impl Drop for DirIter {
	fn drop(&mut self) {
		if let Some((_, chain)) = self.current.take() {
			release_chain(&self.cache, &chain);
		}

		for (_, chain) in self.sources.by_ref() {
			release_chain(&self.cache, &chain);
		}
	}
}
