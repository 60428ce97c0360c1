//! Segment iteration, normalization, and lexical path algebra.
//!
//! Paths in this crate are plain `&str`/`String`; there is no
//! null-terminated convention to model in safe Rust, so every operation
//! here takes and returns ordinary UTF-8 slices. `\` is accepted as a
//! separator on input and normalized to `/` on output everywhere a path
//! is reconstructed.

use crate::error::Error;

#[inline]
fn is_sep(c: char) -> bool {
	c == '/' || c == '\\'
}

/// Classifies the leading segment of a path so that root markers
/// (`/`, a drive letter, a UNC authority, or a literal `~`) round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
	/// No root marker; the path is relative.
	None,
	/// A single leading `/` or `\`.
	Absolute,
	/// `C:` (or any single ASCII letter followed by `:`).
	DriveLetter,
	/// `//host` or `\\host`.
	Unc,
}

/// Returns the root marker present at the start of `path`, if any.
#[must_use]
pub fn root_kind(path: &str) -> RootKind {
	let bytes = path.as_bytes();

	if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
		return RootKind::DriveLetter;
	}

	if bytes.len() >= 2 && is_sep(bytes[0] as char) && is_sep(bytes[1] as char) {
		let rest = &path[2..];
		if !rest.is_empty() && !is_sep(rest.chars().next().unwrap()) {
			return RootKind::Unc;
		}
	}

	if bytes.first().is_some_and(|b| is_sep(*b as char)) {
		return RootKind::Absolute;
	}

	RootKind::None
}

/// A single segment of a path: the name text plus its byte offset and
/// length in the original string it was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
	pub text: &'a str,
	pub offset: usize,
	pub len: usize,
}

impl<'a> Segment<'a> {
	#[must_use]
	pub fn as_str(&self) -> &'a str {
		self.text
	}
}

/// The literal root-marker text to reconstruct `path`'s absolute prefix
/// from (`"/"` for a leading separator, the drive letter or UNC authority
/// text otherwise). `None` for a relative path.
#[must_use]
pub fn root_prefix(path: &str) -> Option<&str> {
	match root_kind(path) {
		RootKind::None => None,
		RootKind::Absolute => Some("/"),
		RootKind::DriveLetter => Some(&path[0..2]),
		RootKind::Unc => {
			let rest = &path[2..];
			let end = rest.find(is_sep).map(|i| i + 2).unwrap_or(path.len());
			Some(&path[0..end])
		}
	}
}

/// Forward segment cursor. Consecutive separators collapse to one
/// boundary; a trailing separator does not yield an empty terminal
/// segment. The UNC authority and drive-letter root markers are yielded
/// as distinct leading segments so reconstruction restores the original
/// string (the round-trip law, `spec.md` §4.1/§8).
pub struct Segments<'a> {
	path: &'a str,
	pos: usize,
	root_emitted: bool,
	root: RootKind,
}

/// Produces a forward segment cursor over `path`.
#[must_use]
pub fn segments(path: &str) -> Segments<'_> {
	Segments {
		path,
		pos: 0,
		root_emitted: false,
		root: root_kind(path),
	}
}

impl<'a> Iterator for Segments<'a> {
	type Item = Segment<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		if !self.root_emitted {
			self.root_emitted = true;

			match self.root {
				RootKind::Absolute => {
					self.pos = 1;
					return Some(Segment {
						text: "",
						offset: 0,
						len: 0,
					});
				}
				RootKind::DriveLetter => {
					self.pos = 2;
					return Some(Segment {
						text: &self.path[0..2],
						offset: 0,
						len: 2,
					});
				}
				RootKind::Unc => {
					// `//host` — find the end of `host`.
					let rest = &self.path[2..];
					let end = rest.find(is_sep).map(|i| i + 2).unwrap_or(self.path.len());
					self.pos = end;
					return Some(Segment {
						text: &self.path[0..end],
						offset: 0,
						len: end,
					});
				}
				RootKind::None => {}
			}
		}

		loop {
			if self.pos >= self.path.len() {
				return None;
			}

			let rest = &self.path[self.pos..];
			let first = rest.chars().next().unwrap();

			if is_sep(first) {
				self.pos += 1;
				continue;
			}

			let end = rest.find(is_sep).map(|i| i + self.pos).unwrap_or(self.path.len());
			let seg = Segment {
				text: &self.path[self.pos..end],
				offset: self.pos,
				len: end - self.pos,
			};
			self.pos = end;
			return Some(seg);
		}
	}
}

/// Reverse segment cursor, used by [`last_segment`] and by callers that
/// want to walk a path from the tail (e.g. extension/file-stem logic).
pub struct RSegments<'a> {
	forward: Vec<Segment<'a>>,
	idx: usize,
}

#[must_use]
pub fn rsegments(path: &str) -> RSegments<'_> {
	RSegments {
		forward: segments(path).collect(),
		idx: 0,
	}
}

impl<'a> Iterator for RSegments<'a> {
	type Item = Segment<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.idx >= self.forward.len() {
			return None;
		}

		let seg = self.forward[self.forward.len() - 1 - self.idx];
		self.idx += 1;
		Some(seg)
	}
}

#[must_use]
pub fn first_segment(path: &str) -> Option<Segment<'_>> {
	segments(path).next()
}

#[must_use]
pub fn last_segment(path: &str) -> Option<Segment<'_>> {
	rsegments(path).next()
}

/// Reconstructs a path from its forward segments, normalizing every
/// separator to `/`. Used by the round-trip property test and by
/// [`normalize`] to render its result.
#[must_use]
pub fn rebuild(segs: &[&str]) -> String {
	let mut out = String::new();

	for (i, s) in segs.iter().enumerate() {
		if s.is_empty() && i == 0 {
			out.push('/');
			continue;
		}

		if i > 0 && !out.is_empty() && !out.ends_with('/') {
			out.push('/');
		}

		out.push_str(s);
	}

	out
}

bitflags::bitflags! {
	/// Flags accepted by [`normalize`].
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct NormalizeFlags: u32 {
		const NO_ABOVE_ROOT_NAVIGATION = 1 << 0;
	}
}

/// Lexical fold: removes `.` segments, and folds `..` against the
/// preceding segment. Purely lexical — never touches the filesystem.
///
/// A zero-length input yields a zero-length output, successfully.
///
/// When [`NormalizeFlags::NO_ABOVE_ROOT_NAVIGATION`] is set, normalization
/// fails with [`Error::AboveRoot`] the moment a `..` would pop past the
/// root (for an absolute path) or past the start (for a relative one).
/// Without that flag, leading `..` segments that can't be folded are kept
/// verbatim, per `spec.md` §4.1.
pub fn normalize(path: &str, flags: NormalizeFlags) -> Result<String, Error> {
	if path.is_empty() {
		return Ok(String::new());
	}

	let no_above_root = flags.contains(NormalizeFlags::NO_ABOVE_ROOT_NAVIGATION);
	let root = root_kind(path);
	let mut it = segments(path);

	let root_text: Option<String> = match root {
		RootKind::None => None,
		_ => it.next().map(|s| s.text.to_string()),
	};

	let mut stack: Vec<String> = Vec::new();

	for seg in it {
		match seg.text {
			"" => continue,
			"." => continue,
			".." => {
				match stack.last().map(String::as_str) {
					Some(top) if top != ".." => {
						stack.pop();
					}
					_ => {
						if no_above_root {
							return Err(Error::AboveRoot);
						}

						stack.push("..".to_string());
					}
				}
			}
			other => stack.push(other.to_string()),
		}
	}

	let mut out = String::new();

	if let Some(r) = &root_text {
		if matches!(root, RootKind::Absolute) {
			out.push('/');
		} else {
			out.push_str(r);
		}
	}

	for seg in stack.iter() {
		if !out.is_empty() && !out.ends_with('/') {
			out.push('/');
		}

		out.push_str(seg);
	}

	Ok(out)
}

/// Segment-structural comparison: separators are equivalent regardless of
/// kind, everything else is codepoint-exact.
#[must_use]
pub fn compare(a: &str, b: &str) -> bool {
	segments(a).map(|s| s.text).eq(segments(b).map(|s| s.text))
}

/// `true` if every segment of `base` is a prefix (in order) of `path`'s
/// segments.
#[must_use]
pub fn begins_with(path: &str, base: &str) -> bool {
	let mut p = segments(path).map(|s| s.text);
	let b = segments(base).map(|s| s.text);

	for base_seg in b {
		match p.next() {
			Some(path_seg) if path_seg == base_seg => continue,
			_ => return false,
		}
	}

	true
}

/// Returns the portion of `path` after `base`, or `None` if `base` is not
/// a segment-aligned prefix of `path`.
#[must_use]
pub fn trim_base<'a>(path: &'a str, base: &str) -> Option<&'a str> {
	if !begins_with(path, base) {
		return None;
	}

	let base_count = segments(base).count();
	let mut it = segments(path);

	for _ in 0..base_count {
		it.next();
	}

	match it.next() {
		Some(seg) => Some(&path[seg.offset..]),
		None => Some(""),
	}
}

/// Concatenates `base` and `tail` with exactly one separator between them.
/// An empty `base` or `tail` is a no-op for that side.
#[must_use]
pub fn append(base: &str, tail: &str) -> String {
	if base.is_empty() {
		return tail.to_string();
	}

	if tail.is_empty() {
		return base.to_string();
	}

	let mut out = base.trim_end_matches(['/', '\\']).to_string();
	out.push('/');
	out.push_str(tail.trim_start_matches(['/', '\\']));
	out
}

/// The trailing dot-separated component of the last segment, used by the
/// archive-type registry to match extensions case-insensitively.
#[must_use]
pub fn extension(path: &str) -> Option<&str> {
	let last = last_segment(path)?;
	let text = last.text;
	let dot = text.rfind('.')?;

	if dot == 0 {
		return None;
	}

	Some(&text[dot + 1..])
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn forward_segments() {
		let segs: Vec<_> = segments("/abc/def/ghi").map(|s| s.text).collect();
		assert_eq!(segs, vec!["", "abc", "def", "ghi"]);

		let segs: Vec<_> = segments("abc/def").map(|s| s.text).collect();
		assert_eq!(segs, vec!["abc", "def"]);

		let segs: Vec<_> = segments("abc\\def/ghi").map(|s| s.text).collect();
		assert_eq!(segs, vec!["abc", "def", "ghi"]);

		let segs: Vec<_> = segments("abc//def").map(|s| s.text).collect();
		assert_eq!(segs, vec!["abc", "def"]);

		let segs: Vec<_> = segments("abc/").map(|s| s.text).collect();
		assert_eq!(segs, vec!["abc"]);
	}

	#[test]
	fn root_markers_round_trip() {
		for p in ["/abc/def", "C:/abc", "//host/share", "~/abc", "abc/def"] {
			let segs: Vec<&str> = segments(p).map(|s| s.text).collect();
			assert_eq!(rebuild(&segs), p.replace('\\', "/"), "round-trip failed for {p}");
		}
	}

	#[test]
	fn reverse_matches_forward_reversed() {
		let p = "/lorem/ipsum/dolor/sit.amet";
		let fwd: Vec<_> = segments(p).map(|s| s.text).collect();
		let mut rev: Vec<_> = rsegments(p).map(|s| s.text).collect();
		rev.reverse();
		assert_eq!(fwd, rev);
	}

	#[test]
	fn normalize_examples() {
		assert_eq!(
			normalize("abc/../def", NormalizeFlags::empty()).unwrap(),
			"def"
		);
		assert_eq!(
			normalize("/abc/def/", NormalizeFlags::empty()).unwrap(),
			"/abc/def"
		);
		assert!(normalize("/..", NormalizeFlags::NO_ABOVE_ROOT_NAVIGATION).is_err());
		assert_eq!(normalize("", NormalizeFlags::empty()).unwrap(), "");
	}

	#[test]
	fn normalize_idempotent() {
		for p in ["abc/../def", "/abc/./def/../ghi", "a/b/c", "/x/y/../../z"] {
			let once = normalize(p, NormalizeFlags::empty()).unwrap();
			let twice = normalize(&once, NormalizeFlags::empty()).unwrap();
			assert_eq!(once, twice, "not idempotent for {p}");
		}
	}

	#[test]
	fn above_root_preserves_leading_dotdot_when_allowed() {
		let out = normalize("../abc", NormalizeFlags::empty()).unwrap();
		assert_eq!(out, "../abc");
	}

	#[test]
	fn begins_with_and_trim() {
		assert!(begins_with("mnt/hello", "mnt"));
		assert!(!begins_with("mounted/hello", "mnt"));
		assert_eq!(trim_base("mnt/hello", "mnt"), Some("hello"));
		assert_eq!(trim_base("mnt", "mnt"), Some(""));
		assert_eq!(trim_base("other/hello", "mnt"), None);
	}

	#[test]
	fn append_examples() {
		assert_eq!(append("mnt", "hello"), "mnt/hello");
		assert_eq!(append("", "hello"), "hello");
		assert_eq!(append("mnt", ""), "mnt");
		assert_eq!(append("mnt/", "/hello"), "mnt/hello");
	}

	#[test]
	fn extension_examples() {
		assert_eq!(extension("archive.zip"), Some("zip"));
		assert_eq!(extension("testvectors/testvectors2.zip"), Some("zip"));
		assert_eq!(extension("noext"), None);
		assert_eq!(extension(".hidden"), None);
	}
}
