//! Mapping from filename extension to backend (`spec.md` §4.4).

use std::sync::Arc;

use crate::backend::ArchiveBackendFactory;
use crate::path;

/// A filesystem's configured `(extension, backend)` pairs. The resolver
/// consults this to decide whether a path segment is an archive-descent
/// point; order is the tie-breaker when more than one extension could
/// match a segment (first registered wins).
#[derive(Clone, Default)]
pub struct ArchiveTypeRegistry {
	entries: Vec<(String, Arc<dyn ArchiveBackendFactory>)>,
}

impl ArchiveTypeRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, extension: impl Into<String>, factory: Arc<dyn ArchiveBackendFactory>) {
		self.entries.push((extension.into(), factory));
	}

	/// If `segment`'s trailing dot-separated component matches a
	/// registered extension (case-insensitively), returns that
	/// extension's factory.
	#[must_use]
	pub fn match_segment(&self, segment: &str) -> Option<&Arc<dyn ArchiveBackendFactory>> {
		let ext = path::extension(segment)?;
		self.entries
			.iter()
			.find(|(registered, _)| registered.eq_ignore_ascii_case(ext))
			.map(|(_, factory)| factory)
	}

	/// Builds the candidate archive file name for `stem` under each
	/// registered extension, in registration order, for transparent
	/// speculative descent (`spec.md` §4.7).
	pub fn candidates_for<'a>(&'a self, stem: &str) -> impl Iterator<Item = (String, &'a Arc<dyn ArchiveBackendFactory>)> + 'a {
		let stem = stem.to_string();
		self.entries
			.iter()
			.map(move |(ext, factory)| (format!("{stem}.{ext}"), factory))
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::backend::Backend;
	use crate::error::Error;
	use crate::stream::Stream;

	struct NullFactory;

	impl ArchiveBackendFactory for NullFactory {
		fn open(&self, _stream: Box<dyn Stream>) -> Result<Arc<dyn Backend>, Error> {
			Err(Error::NotImplemented)
		}
	}

	#[test]
	fn first_registered_wins() {
		let mut reg = ArchiveTypeRegistry::new();
		reg.register("zip", Arc::new(NullFactory));
		reg.register("pak", Arc::new(NullFactory));

		assert!(reg.match_segment("data.zip").is_some());
		assert!(reg.match_segment("data.pak").is_some());
		assert!(reg.match_segment("data.txt").is_none());
	}

	#[test]
	fn case_insensitive_match() {
		let mut reg = ArchiveTypeRegistry::new();
		reg.register("zip", Arc::new(NullFactory));
		assert!(reg.match_segment("DATA.ZIP").is_some());
	}
}
