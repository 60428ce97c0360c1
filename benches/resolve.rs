use std::sync::Arc;

use vfs::{FsConfig, MountMode, OpenFlags, PakFactory, VirtualFs};

criterion::criterion_group!(benches, mount_precedence, archive_descent);
criterion::criterion_main!(benches);

fn build_pak(entries: &[(&str, &[u8])]) -> Vec<u8> {
	const NAME_LEN: usize = 56;

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

fn mount_precedence(crit: &mut criterion::Criterion) {
	let mut grp = crit.benchmark_group("Mount precedence");

	let base = tempfile::tempdir().unwrap();
	let overlay = tempfile::tempdir().unwrap();
	std::fs::write(base.path().join("hello.txt"), b"base").unwrap();
	std::fs::write(overlay.path().join("hello.txt"), b"overlay").unwrap();

	let fs = VirtualFs::init(FsConfig::new());
	fs.mount(base.path(), "", MountMode::Read).unwrap();
	fs.mount(overlay.path(), "", MountMode::Read).unwrap();

	grp.bench_function("shadowed read", |bencher| {
		bencher.iter(|| {
			let mut handle = fs.file_open("hello.txt", OpenFlags::READ).unwrap();
			handle.read(&mut [0u8; 16]).unwrap();
		});
	});

	grp.finish();
}

fn archive_descent(crit: &mut criterion::Criterion) {
	let mut grp = crit.benchmark_group("Archive descent");

	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("assets.pak"), build_pak(&[("sprites/imp.png", b"not really png data")])).unwrap();

	let fs = VirtualFs::init(FsConfig::new().with_archive_type("pak", Arc::new(PakFactory)));
	fs.mount(dir.path(), "", MountMode::Read).unwrap();

	grp.bench_function("transparent descent into a PAK entry", |bencher| {
		bencher.iter(|| {
			let mut handle = fs
				.file_open("assets.pak/sprites/imp.png", OpenFlags::READ | OpenFlags::TRANSPARENT)
				.unwrap();
			handle.read(&mut [0u8; 64]).unwrap();
		});
	});

	grp.finish();
}
