//! Ordered read/write mount lists and their precedence rules
//! (`spec.md` §4.6).

use std::path::{Path, PathBuf};

use crate::path as vpath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
	Read,
	Write,
}

/// `(virtual-prefix, physical-target, access-mode)` (`spec.md` §3's
/// "mount entry"; priority is implicit in list position).
#[derive(Debug, Clone)]
pub struct MountEntry {
	pub virtual_prefix: String,
	pub physical_target: PathBuf,
	pub mode: MountMode,
}

/// Two ordered collections, one per access mode, in last-mounted-first
/// precedence order (`spec.md` §4.6).
#[derive(Default)]
pub struct MountRegistry {
	read_mounts: Vec<MountEntry>,
	write_mounts: Vec<MountEntry>,
}

impl MountRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Mounting appends; later mounts take precedence, so resolution
	/// always walks the list in reverse.
	pub fn mount(&mut self, physical_target: PathBuf, virtual_prefix: impl Into<String>, mode: MountMode) {
		let entry = MountEntry {
			virtual_prefix: virtual_prefix.into(),
			physical_target,
			mode,
		};

		match mode {
			MountMode::Read => self.read_mounts.push(entry),
			MountMode::Write => self.write_mounts.push(entry),
		}
	}

	/// Removes the most-recently-added mount matching `physical_target`
	/// and `mode`. Returns `true` if one was removed.
	pub fn unmount(&mut self, physical_target: &Path, mode: MountMode) -> bool {
		let list = match mode {
			MountMode::Read => &mut self.read_mounts,
			MountMode::Write => &mut self.write_mounts,
		};

		if let Some(pos) = list.iter().rposition(|m| m.physical_target == physical_target) {
			list.remove(pos);
			true
		} else {
			false
		}
	}

	#[must_use]
	pub fn read_mounts(&self) -> &[MountEntry] {
		&self.read_mounts
	}

	#[must_use]
	pub fn write_mounts(&self) -> &[MountEntry] {
		&self.write_mounts
	}

	/// Candidate absolute paths for a read request, highest precedence
	/// first, optionally followed by the raw path relative to the owning
	/// filesystem unless `only_mounts` is set (`spec.md` §4.6, rule 1-2).
	#[must_use]
	pub fn read_candidates(&self, request: &str, only_mounts: bool) -> Vec<String> {
		let mut out: Vec<String> = self
			.read_mounts
			.iter()
			.rev()
			.filter_map(|m| {
				vpath::trim_base(request, &m.virtual_prefix)
					.map(|tail| join_physical(&m.physical_target, tail))
			})
			.collect();

		if !only_mounts {
			out.push(request.to_string());
		}

		out
	}

	/// The single write candidate for `request`: the first matching
	/// write-mount in precedence order, with no fallback, or `request`
	/// itself if `ignore_mounts` is set and nothing matched
	/// (`spec.md` §4.6, write resolution rule).
	#[must_use]
	pub fn write_candidate(&self, request: &str, ignore_mounts: bool) -> Option<String> {
		let found = self.write_mounts.iter().rev().find_map(|m| {
			vpath::trim_base(request, &m.virtual_prefix).map(|tail| join_physical(&m.physical_target, tail))
		});

		found.or_else(|| ignore_mounts.then(|| request.to_string()))
	}

	/// For iteration: every read-mount whose `virtual_prefix` is a
	/// segment-prefix of (or equal to) `dir`, paired with the physical
	/// candidate to iterate, highest precedence first. The resolver
	/// merges and de-duplicates the results by entry name
	/// (`spec.md` §4.6, iteration merge).
	#[must_use]
	pub fn iter_candidates(&self, dir: &str) -> Vec<String> {
		let mut out: Vec<String> = self
			.read_mounts
			.iter()
			.rev()
			.filter_map(|m| {
				vpath::trim_base(dir, &m.virtual_prefix).map(|tail| join_physical(&m.physical_target, tail))
			})
			.collect();

		out.push(dir.to_string());
		out
	}
}

fn join_physical(physical_target: &Path, tail: &str) -> String {
	let base = physical_target.to_string_lossy();
	vpath::append(&base, tail)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn precedence_is_last_mounted_first() {
		let mut reg = MountRegistry::new();
		reg.mount(PathBuf::from("/src1"), "mnt", MountMode::Read);
		reg.mount(PathBuf::from("/src2"), "mnt", MountMode::Read);

		let candidates = reg.read_candidates("mnt/hello", false);
		assert_eq!(candidates[0], "/src2/hello");
		assert_eq!(candidates[1], "/src1/hello");
		assert_eq!(candidates[2], "mnt/hello");
	}

	#[test]
	fn only_mounts_drops_direct_candidate() {
		let mut reg = MountRegistry::new();
		reg.mount(PathBuf::from("/src1"), "mnt", MountMode::Read);
		let candidates = reg.read_candidates("mnt/hello", true);
		assert_eq!(candidates, vec!["/src1/hello".to_string()]);
	}

	#[test]
	fn write_mount_has_no_fallback() {
		let mut reg = MountRegistry::new();
		reg.mount(PathBuf::from("/cfg"), "config/editor", MountMode::Write);

		assert_eq!(
			reg.write_candidate("config/editor/editor.cfg", false),
			Some("/cfg/editor.cfg".to_string())
		);
		assert_eq!(reg.write_candidate("other/path", false), None);
		assert_eq!(
			reg.write_candidate("other/path", true),
			Some("other/path".to_string())
		);
	}

	#[test]
	fn unmount_removes_most_recent() {
		let mut reg = MountRegistry::new();
		reg.mount(PathBuf::from("/src1"), "mnt", MountMode::Read);
		reg.mount(PathBuf::from("/src2"), "mnt", MountMode::Read);

		assert!(reg.unmount(Path::new("/src2"), MountMode::Read));
		let candidates = reg.read_candidates("mnt/hello", true);
		assert_eq!(candidates, vec!["/src1/hello".to_string()]);
	}
}
