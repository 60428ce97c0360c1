//! `FsConfig`: the archive-type registration surface and the
//! default garbage-collection/laziness policy passed to
//! [`VirtualFs::init`](crate::VirtualFs::init) (`spec.md` §6's
//! `init(config)`, ambient configuration layer per `SPEC_FULL.md` §4.12).

use std::sync::Arc;

use crate::archive::{ArchiveTypeRegistry, GcPolicy};
use crate::backend::ArchiveBackendFactory;

/// Builder-style configuration for a [`VirtualFs`](crate::VirtualFs)
/// instance.
pub struct FsConfig {
	pub(crate) archive_types: ArchiveTypeRegistry,
	pub(crate) gc_policy: GcPolicy,
	pub(crate) lazy_archives: bool,
}

impl Default for FsConfig {
	fn default() -> Self {
		Self {
			archive_types: ArchiveTypeRegistry::new(),
			gc_policy: GcPolicy::Threshold(std::time::Duration::from_secs(60)),
			lazy_archives: true,
		}
	}
}

impl FsConfig {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an `(extension, backend factory)` pair
	/// (`spec.md` §4.4). Order matters: the first extension registered
	/// wins a tie when a segment could match more than one.
	#[must_use]
	pub fn with_archive_type(mut self, extension: impl Into<String>, factory: Arc<dyn ArchiveBackendFactory>) -> Self {
		self.archive_types.register(extension, factory);
		self
	}

	#[must_use]
	pub fn with_gc_policy(mut self, policy: GcPolicy) -> Self {
		self.gc_policy = policy;
		self
	}

	/// When `true` (the default), descent into an archive not already in
	/// the cache opens it on demand. When `false`, such a descent fails
	/// with [`Error::DoesNotExist`](crate::error::Error::DoesNotExist)
	/// instead — used by quick lookups that must not pay for an archive
	/// open (`spec.md` §4.5's eager/lazy switch; see `DESIGN.md` for why
	/// this is a per-instance default here rather than a public
	/// per-call flag).
	#[must_use]
	pub fn with_lazy_archives(mut self, lazy: bool) -> Self {
		self.lazy_archives = lazy;
		self
	}
}
