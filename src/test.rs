//! Integration-style coverage of `VirtualFs` as a whole, reproducing
//! `spec.md` §8's canonical end-to-end scenarios — per-module unit tests
//! live alongside their own code instead.

use std::sync::Arc;

use super::*;
use crate::backends::PakFactory;

const NAME_LEN: usize = 56;

fn build_pak(entries: &[(&str, &[u8])]) -> Vec<u8> {
	let mut body = Vec::new();
	let mut toc = Vec::new();

	for (name, data) in entries {
		let offset = body.len() as u32;
		body.extend_from_slice(data);

		let mut name_buf = [0u8; NAME_LEN];
		name_buf[..name.len()].copy_from_slice(name.as_bytes());
		toc.extend_from_slice(&name_buf);
		toc.extend_from_slice(&offset.to_le_bytes());
		toc.extend_from_slice(&(data.len() as u32).to_le_bytes());
	}

	let toc_offset = (4 + 4 + 4 + body.len()) as u32;
	let mut out = Vec::new();
	out.extend_from_slice(b"PACK");
	out.extend_from_slice(&toc_offset.to_le_bytes());
	out.extend_from_slice(&(toc.len() as u32).to_le_bytes());
	out.extend_from_slice(&body);
	out.extend_from_slice(&toc);
	out
}

fn read_all(handle: &mut FileHandle) -> Vec<u8> {
	let mut buf = Vec::new();
	let mut chunk = [0u8; 64];
	loop {
		let n = handle.read(&mut chunk).unwrap();
		if n == 0 {
			break;
		}
		buf.extend_from_slice(&chunk[..n]);
	}
	buf
}

fn fs_with_pak() -> VirtualFs {
	VirtualFs::init(FsConfig::new().with_archive_type("pak", Arc::new(PakFactory)))
}

/// Scenario 1: overlay precedence (`spec.md` §8).
#[test]
fn overlay_precedence_uses_last_mounted() {
	let src1 = tempfile::tempdir().unwrap();
	let src2 = tempfile::tempdir().unwrap();
	std::fs::write(src1.path().join("hello"), b"one").unwrap();
	std::fs::write(src2.path().join("hello"), b"two").unwrap();

	let fs = VirtualFs::init(FsConfig::new());
	fs.mount(src1.path(), "mnt", MountMode::Read).unwrap();
	fs.mount(src2.path(), "mnt", MountMode::Read).unwrap();

	let mut handle = fs.file_open("mnt/hello", OpenFlags::READ).unwrap();
	assert_eq!(read_all(&mut handle), b"two");
}

/// Mount precedence monotonicity (`spec.md` §8): unmounting the overlay
/// falls back to the underlay.
#[test]
fn mount_precedence_monotonicity_after_unmount() {
	let src1 = tempfile::tempdir().unwrap();
	let src2 = tempfile::tempdir().unwrap();
	std::fs::write(src1.path().join("hello"), b"one").unwrap();
	std::fs::write(src2.path().join("hello"), b"two").unwrap();

	let fs = VirtualFs::init(FsConfig::new());
	fs.mount(src1.path(), "mnt", MountMode::Read).unwrap();
	fs.mount(src2.path(), "mnt", MountMode::Read).unwrap();

	assert!(fs.unmount(src2.path(), MountMode::Read));

	let mut handle = fs.file_open("mnt/hello", OpenFlags::READ).unwrap();
	assert_eq!(read_all(&mut handle), b"one");
}

/// Scenario 3: transparent archive descent (`spec.md` §8), reproduced
/// against a PAK fixture rather than ZIP (see `DESIGN.md`).
#[test]
fn transparent_archive_descent() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("testvectors.pak"), build_pak(&[("miniaudio.h", b"// header")])).unwrap();

	let fs = fs_with_pak();
	fs.mount(dir.path(), "", MountMode::Read).unwrap();

	let mut handle = fs
		.file_open("testvectors/miniaudio.h", OpenFlags::READ | OpenFlags::TRANSPARENT)
		.unwrap();
	assert_eq!(read_all(&mut handle), b"// header");
}

/// Scenario 4: nested archives (`spec.md` §8) — two sequential opens
/// share one cache entry per archive; after both close and a full GC,
/// the cache is empty.
#[test]
fn nested_archives_share_cache_entries_and_gc_to_zero() {
	let inner = build_pak(&[("miniaudio.h", b"// header")]);
	let outer = build_pak(&[("testvectors.pak", &inner)]);

	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("testvectors2.pak"), outer).unwrap();

	let fs = fs_with_pak();
	fs.mount(dir.path(), "", MountMode::Read).unwrap();

	let path = "testvectors2.pak/testvectors.pak/miniaudio.h";
	let flags = OpenFlags::READ | OpenFlags::TRANSPARENT;

	let mut first = fs.file_open(path, flags).unwrap();
	assert_eq!(read_all(&mut first), b"// header");
	assert_eq!(fs.cache.lock().len(), 2);

	let mut second = fs.file_open(path, flags).unwrap();
	assert_eq!(read_all(&mut second), b"// header");
	assert_eq!(fs.cache.lock().len(), 2);

	drop(first);
	drop(second);

	fs.gc_archives();
	assert!(fs.archives_idle());
	assert_eq!(fs.cache.lock().len(), 0);
}

/// Scenario 5: `mnt/../testvectors/miniaudio.h` normalizes away the
/// `mnt` prefix entirely (`spec.md` §8) — the request no longer matches
/// the mount's virtual prefix, so resolution falls through to the direct
/// candidate, which does not exist relative to the process's own
/// working directory.
#[test]
fn above_root_via_mount_fails() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("miniaudio.h"), b"// header").unwrap();

	let fs = VirtualFs::init(FsConfig::new());
	fs.mount(dir.path(), "mnt", MountMode::Read).unwrap();

	let result = fs.file_open(
		"mnt/../testvectors/miniaudio.h",
		OpenFlags::READ | OpenFlags::NO_ABOVE_ROOT_NAVIGATION,
	);
	assert!(matches!(result, Err(Error::DoesNotExist)));
}

/// Scenario 6: write-mount exclusivity (`spec.md` §8) — a write-open
/// creates exactly the mapped file on the underlying file system and
/// nothing else.
#[test]
fn write_mount_exclusivity_creates_only_target_file() {
	let dir = tempfile::tempdir().unwrap();
	let editor_dir = dir.path().join("config").join("editor");
	std::fs::create_dir_all(&editor_dir).unwrap();

	let fs = VirtualFs::init(FsConfig::new());
	fs.mount(&editor_dir, "config/editor", MountMode::Write).unwrap();

	let mut handle = fs
		.file_open("config/editor/editor.cfg", OpenFlags::WRITE | OpenFlags::TRUNCATE)
		.unwrap();
	handle.write(b"font=mono").unwrap();
	drop(handle);

	let entries: Vec<_> = std::fs::read_dir(&editor_dir).unwrap().collect::<std::io::Result<_>>().unwrap();
	assert_eq!(entries.len(), 1);
	assert_eq!(entries[0].file_name(), "editor.cfg");
	assert_eq!(std::fs::read(editor_dir.join("editor.cfg")).unwrap(), b"font=mono");
}

/// Reference-count soundness (`spec.md` §8): dropping a `VirtualFs` with
/// every handle already closed never trips the debug assertion.
#[test]
fn drop_with_no_outstanding_handles_is_clean() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("a.pak"), build_pak(&[("x", b"y")])).unwrap();

	let fs = fs_with_pak();
	fs.mount(dir.path(), "", MountMode::Read).unwrap();

	let handle = fs.file_open("a.pak/x", OpenFlags::READ | OpenFlags::TRANSPARENT).unwrap();
	drop(handle);

	assert!(fs.archives_idle());
}
