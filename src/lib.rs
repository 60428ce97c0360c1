//! A virtual file system: one namespace assembled from an arbitrary
//! number of real directories, overlaid in last-mounted-first order, with
//! transparent descent into archives (ZIP, PAK, or any format registered
//! against [`FsConfig`]) as though they were ordinary directories.
//!
//! [`VirtualFs`] is the single entry point. Everything else in this crate
//! — path normalization (`path`), the backend contract (`backend`), the
//! archive type/instance registries (`archive`), mount precedence
//! (`mount`), and the path-to-backend walk (`resolver`) — exists to
//! support it.

pub mod archive;
pub mod backend;
pub mod backends;
pub mod config;
pub mod error;
pub mod handle;
pub mod mount;
pub mod path;
pub mod resolver;
pub mod stream;

#[cfg(test)]
mod test;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

pub use archive::{ArchiveCache, ArchiveTypeRegistry, GcPolicy};
pub use backend::{ArchiveBackendFactory, Backend, BackendFile, BackendIter, FileInfo, OpenFlags};
pub use backends::{NativeBackend, PakFactory, SubBackend, ZipFactory};
pub use config::FsConfig;
pub use error::Error;
pub use handle::{DirEntry, DirIter, FileHandle};
pub use mount::MountMode;

use path::NormalizeFlags;

fn normalize_flags(flags: OpenFlags) -> NormalizeFlags {
	if flags.contains(OpenFlags::NO_ABOVE_ROOT_NAVIGATION) {
		NormalizeFlags::NO_ABOVE_ROOT_NAVIGATION
	} else {
		NormalizeFlags::empty()
	}
}

/// A virtual file system instance. Every public operation is `&self` —
/// internally mutable state (the mount registry, the archive cache) is
/// guarded by `parking_lot` mutexes so a [`VirtualFs`] can be shared as an
/// `Arc` between ordinary callers and backends that re-enter it, such as
/// [`SubBackend`](backends::SubBackend).
pub struct VirtualFs {
	mounts: Mutex<mount::MountRegistry>,
	archive_types: ArchiveTypeRegistry,
	cache: Arc<Mutex<ArchiveCache>>,
	native: Arc<dyn Backend>,
	gc_policy: GcPolicy,
	lazy_archives: bool,
}

impl std::fmt::Debug for VirtualFs {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VirtualFs")
			.field("archives_open", &self.cache.lock().len())
			.finish_non_exhaustive()
	}
}

impl VirtualFs {
	/// Builds a fresh, empty instance (no mounts) from `config`. Nothing
	/// here can fail: archive type registration and policy selection are
	/// pure data, so unlike `mount`, this has no `Result`.
	#[must_use]
	pub fn init(config: FsConfig) -> Self {
		Self {
			mounts: Mutex::new(mount::MountRegistry::new()),
			archive_types: config.archive_types,
			cache: Arc::new(Mutex::new(ArchiveCache::new())),
			native: Arc::new(NativeBackend::new("")),
			gc_policy: config.gc_policy,
			lazy_archives: config.lazy_archives,
		}
	}

	/// Registers `physical_target` (a real directory) under
	/// `virtual_prefix`, in `mode`. Later mounts at the same prefix take
	/// precedence over earlier ones (`spec.md` §4.6).
	pub fn mount(&self, physical_target: impl AsRef<Path>, virtual_prefix: impl Into<String>, mode: MountMode) -> Result<(), Error> {
		let canon = std::fs::canonicalize(physical_target.as_ref())?;
		let prefix = virtual_prefix.into();
		log::debug!("mount: {:?} -> {prefix:?} ({mode:?})", canon);
		self.mounts.lock().mount(canon, prefix, mode);
		Ok(())
	}

	/// Removes the most-recently-added mount matching `physical_target`
	/// and `mode`. Returns `false` if none matched or `physical_target`
	/// could not be resolved on the host file system.
	pub fn unmount(&self, physical_target: impl AsRef<Path>, mode: MountMode) -> bool {
		let removed = match std::fs::canonicalize(physical_target.as_ref()) {
			Ok(canon) => self.mounts.lock().unmount(&canon, mode),
			Err(_) => false,
		};
		log::debug!("unmount: {:?} ({mode:?}), removed: {removed}", physical_target.as_ref());
		removed
	}

	fn resolve_read(&self, path_: &str, flags: OpenFlags) -> Result<resolver::Descended, Error> {
		let clean = path::normalize(path_, normalize_flags(flags))?;
		let only_mounts = flags.contains(OpenFlags::ONLY_MOUNTS);
		let candidates = self.mounts.lock().read_candidates(&clean, only_mounts);

		let mut last_err = Error::DoesNotExist;

		for candidate in candidates {
			let mut cache = self.cache.lock();
			match resolver::descend(&self.archive_types, &mut cache, &self.native, &candidate, flags, self.lazy_archives) {
				Ok(descended) => return Ok(descended),
				Err(err) if err.is_does_not_exist() => {
					log::debug!("descent fallback: {candidate:?} did not resolve, trying next read candidate");
					last_err = err;
				}
				Err(err) => return Err(err),
			}
		}

		Err(last_err)
	}

	fn resolve_write(&self, path_: &str, flags: OpenFlags) -> Result<resolver::Descended, Error> {
		let clean = path::normalize(path_, normalize_flags(flags))?;
		let ignore_mounts = flags.contains(OpenFlags::IGNORE_MOUNTS);
		let candidate = self
			.mounts
			.lock()
			.write_candidate(&clean, ignore_mounts)
			.ok_or(Error::DoesNotExist)?;

		let mut cache = self.cache.lock();
		resolver::descend(&self.archive_types, &mut cache, &self.native, &candidate, flags, self.lazy_archives)
	}

	fn release_chain(&self, chain: &[PathBuf]) {
		if chain.is_empty() {
			return;
		}

		let mut cache = self.cache.lock();
		for key in chain.iter().rev() {
			cache.release(key);
		}
	}

	/// Dispatches an opaque backend-defined request. No backend currently
	/// registered with this crate implements one; this exists so
	/// [`SubBackend`](backends::SubBackend) has something to forward to.
	pub fn ioctl(&self, _code: u32, _arg: &mut [u8]) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Reports on the entry at `path`, walking through mounts and, per
	/// `flags`, archives (`spec.md` §4.7).
	pub fn info(&self, path_: &str, flags: OpenFlags) -> Result<FileInfo, Error> {
		let descended = self.resolve_read(path_, flags)?;
		let result = descended.backend.info(&descended.tail);
		self.release_chain(&descended.chain);
		result
	}

	/// Opens `path`. A request carrying [`OpenFlags::WRITE`] resolves
	/// through the write-mount list (no read-mount fallback); everything
	/// else resolves through the read-mount list (`spec.md` §4.6).
	pub fn file_open(&self, path_: &str, flags: OpenFlags) -> Result<FileHandle, Error> {
		let descended = if flags.contains(OpenFlags::WRITE) {
			self.resolve_write(path_, flags)?
		} else {
			self.resolve_read(path_, flags)?
		};

		match descended.backend.file_open(&descended.tail, flags) {
			Ok(inner) => Ok(FileHandle::new(inner, self.cache.clone(), descended.chain, flags)),
			Err(err) => {
				self.release_chain(&descended.chain);
				Err(err)
			}
		}
	}

	/// Removes the entry at `path`. Resolves through the write-mount list
	/// only, like [`mkdir`](Self::mkdir) and [`rename`](Self::rename).
	pub fn remove(&self, path_: &str) -> Result<(), Error> {
		let descended = self.resolve_write(path_, OpenFlags::TRANSPARENT)?;
		let result = descended.backend.remove(&descended.tail);
		self.release_chain(&descended.chain);
		result
	}

	/// Renames `old` to `new`. Both must resolve to the same backend;
	/// renaming across a mount or archive boundary is not supported,
	/// mirroring the host file system's own `rename` (`spec.md` §6, §9's
	/// "only what the reference backends actually support").
	pub fn rename(&self, old: &str, new: &str) -> Result<(), Error> {
		let old_d = self.resolve_write(old, OpenFlags::TRANSPARENT)?;
		let new_d = match self.resolve_write(new, OpenFlags::TRANSPARENT) {
			Ok(d) => d,
			Err(err) => {
				self.release_chain(&old_d.chain);
				return Err(err);
			}
		};

		let result = if Arc::ptr_eq(&old_d.backend, &new_d.backend) {
			old_d.backend.rename(&old_d.tail, &new_d.tail)
		} else {
			Err(Error::InvalidOperation("rename cannot cross a mount or archive boundary"))
		};

		self.release_chain(&old_d.chain);
		self.release_chain(&new_d.chain);
		result
	}

	/// Creates a directory at `path`, including any missing parents.
	pub fn mkdir(&self, path_: &str, flags: OpenFlags) -> Result<(), Error> {
		let descended = self.resolve_write(path_, flags)?;
		let result = descended.backend.mkdir(&descended.tail);
		self.release_chain(&descended.chain);
		result
	}

	/// Iterates `dir`, merging every read-mount whose virtual prefix
	/// matches it, highest precedence first, de-duplicated by entry name
	/// (`spec.md` §4.6's iteration merge).
	pub fn first(&self, dir: &str) -> Result<DirIter, Error> {
		let clean = path::normalize(dir, NormalizeFlags::empty())?;
		let candidates = self.mounts.lock().iter_candidates(&clean);
		let mut sources = Vec::new();

		for candidate in candidates {
			let descended = {
				let mut cache = self.cache.lock();
				match resolver::descend(&self.archive_types, &mut cache, &self.native, &candidate, OpenFlags::default(), self.lazy_archives) {
					Ok(d) => d,
					Err(_) => continue,
				}
			};

			match descended.backend.first(&descended.tail) {
				Ok(Some(iter)) => sources.push((iter, descended.chain)),
				Ok(None) => self.release_chain(&descended.chain),
				Err(_) => self.release_chain(&descended.chain),
			}
		}

		Ok(DirIter::new(sources, self.cache.clone()))
	}

	/// Runs this instance's configured garbage collection policy over the
	/// archive cache (`spec.md` §4.5).
	pub fn gc_archives(&self) {
		self.cache.lock().gc(self.gc_policy);
	}

	/// `true` once every outstanding archive reference has been released
	/// — every [`FileHandle`]/[`DirIter`] resolved through an archive has
	/// been dropped. Exposed for callers that want to assert clean
	/// shutdown before dropping the filesystem itself.
	#[must_use]
	pub fn archives_idle(&self) -> bool {
		self.cache.lock().all_refcounts_zero()
	}
}

impl Drop for VirtualFs {
	/// [`FileHandle`]/[`DirIter`] hold an `Arc` to the cache rather than a
	/// borrow of the filesystem, so they are free to outlive it; this
	/// assert only catches the case where every handle was in fact closed
	/// first but something still left a stray reference behind
	/// (`spec.md` §8's reference-count-soundness property).
	fn drop(&mut self) {
		let mut cache = self.cache.lock();
		debug_assert!(cache.all_refcounts_zero(), "VirtualFs dropped with archive references still outstanding");
		cache.clear();
	}
}
