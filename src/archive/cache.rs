//! Opened-archive table keyed by canonical path; reference counts;
//! garbage collection (`spec.md` §4.5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use crate::backend::Backend;
use crate::error::Error;

/// Garbage collection policies (`spec.md` §4.5).
#[derive(Debug, Clone, Copy)]
pub enum GcPolicy {
	/// Collect idle entries whose refcount is 0 and whose idle time
	/// exceeds `idle`.
	Threshold(Duration),
	/// Collect every refcount-0 entry regardless of idle time.
	Age,
	/// Collect recursively until no refcount-0 entry remains, parents only
	/// after their children (invariant I4).
	Full,
}

struct Entry {
	backend: Arc<dyn Backend>,
	refcount: usize,
	parent: Option<PathBuf>,
	idle_since: Option<Instant>,
}

/// The opened-archive table. Keyed by the canonicalized absolute path of
/// the archive file, including any enclosing archive chain for nested
/// archives (`spec.md` §3's "archive cache entry").
///
/// Invariants upheld by this type alone (the others — I2, child lifetime
/// within parent's, and I4, parent-after-children collection order — are
/// upheld by [`gc`](Self::gc) and by [`VirtualFs::uninit`] tearing down
/// children before parents):
///
/// - I1: at most one live entry per canonical key (`HashMap` keys are
///   unique by construction; [`get_or_open`](Self::get_or_open) never
///   inserts a second entry for a key that already resolves).
/// - I3: refcount 0 implies eligible for collection, not yet collected
///   (entries linger until [`gc`](Self::gc) runs).
#[derive(Default)]
pub struct ArchiveCache {
	entries: HashMap<PathBuf, Entry>,
}

impl ArchiveCache {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	#[must_use]
	pub fn contains(&self, key: &Path) -> bool {
		self.entries.contains_key(key)
	}

	/// Returns the backend for `key`, opening it via `opener` if it isn't
	/// already cached. Concurrent resolvers within the same single-threaded
	/// filesystem instance always observe this as either "already open,
	/// take a reference" or "I will open it" — never both (`spec.md`
	/// §4.5's single-initialization guarantee), because `&mut self` rules
	/// out a second call running between the lookup and the insert.
	///
	/// If the entry is not cached and `lazy_allowed` is `false`, returns
	/// [`Error::DoesNotExist`] without opening anything (`spec.md` §4.5's
	/// eager/lazy switch).
	pub fn get_or_open(
		&mut self,
		key: PathBuf,
		parent: Option<PathBuf>,
		lazy_allowed: bool,
		opener: impl FnOnce() -> Result<Arc<dyn Backend>, Error>,
	) -> Result<Arc<dyn Backend>, Error> {
		if let Some(entry) = self.entries.get_mut(&key) {
			entry.refcount += 1;
			entry.idle_since = None;
			return Ok(entry.backend.clone());
		}

		if !lazy_allowed {
			return Err(Error::DoesNotExist);
		}

		let backend = opener()?;
		debug!("archive cache: opened {}", key.display());

		self.entries.insert(
			key,
			Entry {
				backend: backend.clone(),
				refcount: 1,
				parent,
				idle_since: None,
			},
		);

		Ok(backend)
	}

	/// Releases one reference on `key`. Once refcount reaches 0 the entry
	/// becomes eligible for collection but is not collected here
	/// (invariant I3) — a later [`gc`](Self::gc) call does that.
	pub fn release(&mut self, key: &Path) {
		if let Some(entry) = self.entries.get_mut(key) {
			debug_assert!(entry.refcount > 0, "refcount underflow releasing {key:?}");
			entry.refcount = entry.refcount.saturating_sub(1);

			if entry.refcount == 0 {
				entry.idle_since = Some(Instant::now());
			}
		}
	}

	/// Runs `policy`, removing eligible entries. Parents are only removed
	/// after all of their children (invariant I4) regardless of policy.
	pub fn gc(&mut self, policy: GcPolicy) {
		loop {
			// A key is removable this pass only if nothing still present
			// names it as a parent — that upholds I4 (children collected
			// before parents) one generation at a time; `GcPolicy::Full`
			// loops until a pass removes nothing.
			let to_remove: Vec<PathBuf> = self
				.entries
				.iter()
				.filter(|(_, e)| e.refcount == 0)
				.filter(|(_, e)| match policy {
					GcPolicy::Threshold(idle) => e.idle_since.is_some_and(|t| t.elapsed() >= idle),
					GcPolicy::Age | GcPolicy::Full => true,
				})
				.filter(|(key, _)| {
					!self
						.entries
						.values()
						.any(|other| other.parent.as_deref() == Some(key.as_path()))
				})
				.map(|(k, _)| k.clone())
				.collect();

			if to_remove.is_empty() {
				break;
			}

			for key in &to_remove {
				debug!("archive cache: collected {}", key.display());
				self.entries.remove(key);
			}

			if !matches!(policy, GcPolicy::Full) {
				break;
			}
		}
	}

	/// Forcibly drops every entry, regardless of refcount. Used by
	/// `VirtualFs::uninit`/`Drop` after every user handle has already been
	/// closed (at which point every refcount should already be 0; see the
	/// reference-count-soundness property in `spec.md` §8).
	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn all_refcounts_zero(&self) -> bool {
		self.entries.values().all(|e| e.refcount == 0)
	}
}

/// Builds the synthetic cache key for an archive nested inside `parent`
/// at `tail` (a path with no backing OS file of its own). Keeps key
/// construction in one place so nested keys stay structurally distinct
/// from sibling entries at different depths.
#[must_use]
pub fn nested_key(parent: &Path, tail: &str) -> PathBuf {
	let mut s = parent.as_os_str().to_os_string();
	s.push("\u{0}archive\u{0}");
	s.push(tail);
	PathBuf::from(s)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::backend::{BackendFile, FileInfo};
	use crate::stream::Stream;

	struct Dummy;

	impl Backend for Dummy {
		fn info(&self, _path: &str) -> Result<FileInfo, Error> {
			Err(Error::NotImplemented)
		}

		fn file_open(&self, _path: &str, _flags: crate::backend::OpenFlags) -> Result<Box<dyn BackendFile>, Error> {
			Err(Error::NotImplemented)
		}

		fn first(&self, _dir: &str) -> Result<Option<Box<dyn crate::backend::BackendIter>>, Error> {
			Ok(None)
		}
	}

	fn dummy() -> Arc<dyn Backend> {
		Arc::new(Dummy)
	}

	#[test]
	fn single_initialization() {
		let mut cache = ArchiveCache::new();
		let key = PathBuf::from("/a/b.zip");

		let mut opens = 0;
		let _ = cache
			.get_or_open(key.clone(), None, true, || {
				opens += 1;
				Ok(dummy())
			})
			.unwrap();

		let _ = cache
			.get_or_open(key.clone(), None, true, || {
				opens += 1;
				Ok(dummy())
			})
			.unwrap();

		assert_eq!(opens, 1);
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn lazy_disallowed_misses_as_not_found() {
		let mut cache = ArchiveCache::new();
		let key = PathBuf::from("/a/b.zip");
		let result = cache.get_or_open(key, None, false, || Ok(dummy()));
		assert!(matches!(result, Err(Error::DoesNotExist)));
	}

	#[test]
	fn refcount_soundness_after_release() {
		let mut cache = ArchiveCache::new();
		let key = PathBuf::from("/a/b.zip");

		cache.get_or_open(key.clone(), None, true, || Ok(dummy())).unwrap();
		cache.get_or_open(key.clone(), None, true, || Ok(dummy())).unwrap();

		assert!(!cache.all_refcounts_zero());
		cache.release(&key);
		assert!(!cache.all_refcounts_zero());
		cache.release(&key);
		assert!(cache.all_refcounts_zero());
	}

	#[test]
	fn gc_full_collects_parent_after_child() {
		let mut cache = ArchiveCache::new();
		let parent_key = PathBuf::from("/a/outer.zip");
		let child_key = nested_key(&parent_key, "inner.zip");

		cache.get_or_open(parent_key.clone(), None, true, || Ok(dummy())).unwrap();
		cache
			.get_or_open(child_key.clone(), Some(parent_key.clone()), true, || Ok(dummy()))
			.unwrap();

		cache.release(&parent_key);
		cache.release(&child_key);

		cache.gc(GcPolicy::Full);

		assert!(cache.is_empty());
	}
}
