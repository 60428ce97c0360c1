//! Path → (backend, backend-path) pipeline; archive descent
//! (`spec.md` §4.7).
//!
//! The walker's states map onto `spec.md` §4.7's state machine as follows:
//! `at-fs` is every iteration of the `while` loop below, `entering-archive`
//! is a call to [`ArchiveCache::get_or_open`], and `terminal` is the
//! `Ok(Descended { .. })` returned once segments are exhausted. Failure
//! anywhere after at least one archive was entered unwinds every
//! reference this call acquired (the `acquired` guard), which is how
//! `spec.md` §4.7/§7's "descent unwind" rule is upheld without having to
//! distinguish "speculative" from "explicit" descent at unwind time: a
//! failed attempt releases everything it opened either way, and only a
//! successful attempt hands its references off to the resulting handle.

use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::cache::nested_key;
use crate::archive::{ArchiveCache, ArchiveTypeRegistry};
use crate::backend::{Backend, OpenFlags};
use crate::error::Error;
use crate::path as vpath;

/// The result of walking a candidate path all the way to its terminal
/// backend: the backend that owns the remaining tail, the tail itself
/// (the path to hand to `file_open`/`info`/`first`), and the chain of
/// archive cache keys entered along the way (for the caller to record on
/// the resulting handle).
pub struct Descended {
	pub backend: Arc<dyn Backend>,
	pub tail: String,
	pub chain: Vec<PathBuf>,
}

/// Walks `candidate` segment by segment starting from `native`, promoting
/// any segment that names (explicitly, or — in transparent mode —
/// speculatively) a registered archive extension into an archive open via
/// `cache`. Returns the terminal backend and the remaining tail once
/// segments are exhausted.
pub fn descend(
	archive_types: &ArchiveTypeRegistry,
	cache: &mut ArchiveCache,
	native: &Arc<dyn Backend>,
	candidate: &str,
	flags: OpenFlags,
	lazy_allowed: bool,
) -> Result<Descended, Error> {
	let mut acquired: Vec<PathBuf> = Vec::new();

	match descend_inner(archive_types, cache, native, candidate, flags, lazy_allowed, &mut acquired) {
		Ok(mut descended) => {
			descended.chain = acquired;
			Ok(descended)
		}
		Err(err) => {
			for key in acquired.iter().rev() {
				cache.release(key);
			}
			Err(err)
		}
	}
}

fn descend_inner(
	archive_types: &ArchiveTypeRegistry,
	cache: &mut ArchiveCache,
	native: &Arc<dyn Backend>,
	candidate: &str,
	flags: OpenFlags,
	lazy_allowed: bool,
	acquired: &mut Vec<PathBuf>,
) -> Result<Descended, Error> {
	let segments: Vec<&str> = vpath::segments(candidate).map(|s| s.text).collect();

	let mut backend = native.clone();
	// `key` is `None` while we're still walking the native backend's own
	// real path; it becomes `Some` once we've entered at least one
	// archive, so nested archives can build a synthetic key off it.
	let mut key: Option<PathBuf> = None;

	if archive_types.is_empty() || !flags.intersects(OpenFlags::VERBOSE | OpenFlags::TRANSPARENT) {
		return Ok(Descended {
			backend,
			tail: candidate.to_string(),
			chain: Vec::new(),
		});
	}

	// `accum` starts at the root marker text (e.g. "/", "C:", "//host") so
	// the native backend's real path stays absolute as we walk; the root
	// marker segment itself is never a candidate for archive descent.
	let (mut accum, mut i) = match vpath::root_prefix(candidate) {
		Some(prefix) => (prefix.to_string(), 1),
		None => (String::new(), 0),
	};

	while i < segments.len() {
		let seg = segments[i];
		let is_last = i == segments.len() - 1;

		if seg.is_empty() {
			i += 1;
			continue;
		}

		let probe = vpath::append(&accum, seg);

		// Verbose: the path spells the archive out explicitly.
		if let Some(factory) = archive_types.match_segment(seg) {
			let entry_key = match &key {
				None => native_archive_key(&backend, &probe),
				Some(parent) => nested_key(parent, &probe),
			};

			let opened = open_entry(cache, &backend, &probe, entry_key.clone(), key.clone(), lazy_allowed, factory.clone())?;
			acquired.push(entry_key.clone());
			backend = opened;
			key = Some(entry_key);
			accum.clear();
			i += 1;
			continue;
		}

		// Transparent: `seg` alone doesn't name an archive, but maybe
		// `seg.<ext>` does, and no directory called `seg` exists.
		if flags.contains(OpenFlags::TRANSPARENT) && !is_last && backend.info(&probe).map(|fi| fi.is_directory).unwrap_or(false) == false {
			if let Some((archive_name, factory)) = first_existing_candidate(archive_types, &backend, &accum, seg) {
				let entry_key = match &key {
					None => native_archive_key(&backend, &archive_name),
					Some(parent) => nested_key(parent, &archive_name),
				};

				let opened = open_entry(cache, &backend, &archive_name, entry_key.clone(), key.clone(), lazy_allowed, factory.clone())?;
				acquired.push(entry_key.clone());
				backend = opened;
				key = Some(entry_key);
				accum.clear();
				i += 1;
				continue;
			}
		}

		accum = probe;
		i += 1;
	}

	Ok(Descended {
		backend,
		tail: accum,
		chain: Vec::new(),
	})
}

fn first_existing_candidate<'a>(
	archive_types: &'a ArchiveTypeRegistry,
	backend: &Arc<dyn Backend>,
	accum: &str,
	seg: &str,
) -> Option<(String, &'a Arc<dyn crate::backend::ArchiveBackendFactory>)> {
	let stem = vpath::append(accum, seg);

	archive_types
		.candidates_for(&stem)
		.find(|(name, _)| backend.info(name).is_ok())
}

fn open_entry(
	cache: &mut ArchiveCache,
	backend: &Arc<dyn Backend>,
	real_path: &str,
	key: PathBuf,
	parent_key: Option<PathBuf>,
	lazy_allowed: bool,
	factory: Arc<dyn crate::backend::ArchiveBackendFactory>,
) -> Result<Arc<dyn Backend>, Error> {
	let real_path = real_path.to_string();
	let backend = backend.clone();

	cache.get_or_open(key, parent_key, lazy_allowed, move || {
		let stream = backend.open_stream(&real_path)?;
		factory.open(stream)
	})
}

fn native_archive_key(native: &Arc<dyn Backend>, real_path: &str) -> PathBuf {
	if native.is_root_backed() {
		std::fs::canonicalize(real_path).unwrap_or_else(|_| PathBuf::from(real_path))
	} else {
		PathBuf::from(real_path)
	}
}
