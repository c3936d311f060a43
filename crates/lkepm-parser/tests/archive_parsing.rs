//! End-to-end parsing of real archives through every source kind.

use flate2::write::GzEncoder;
use flate2::Compression;
use lkepm_parser::{parse_source, PackageSource, ParseError, ParseStatus, PluginParser};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

fn manifest_json(name: &str, version: &str) -> String {
    format!(r#"{{"name": "{name}", "version": "{version}", "backendFiles": ["index.js"]}}"#)
}

fn tar_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, body) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        builder
            .append_data(&mut header, path, body.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn write_file(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

#[test]
fn root_manifest_is_returned_exactly() {
    let body = manifest_json("hello-world", "1.0.0");
    let data = tar_archive(&[("manifest.json", body.as_str()), ("index.js", "//")]);
    let manifest = parse_source(data).unwrap();
    assert_eq!(manifest.name, "hello-world");
    assert_eq!(manifest.version, "1.0.0");
    assert_eq!(manifest.backend_files, Some(vec!["index.js".to_owned()]));
}

#[test]
fn root_manifest_wins_regardless_of_entry_order() {
    let root = manifest_json("root", "1.0.0");
    let wrapped = manifest_json("wrapped", "9.9.9");

    let root_first = tar_archive(&[
        ("manifest.json", root.as_str()),
        ("package/manifest.json", wrapped.as_str()),
    ]);
    let root_last = tar_archive(&[
        ("package/manifest.json", wrapped.as_str()),
        ("manifest.json", root.as_str()),
    ]);

    assert_eq!(parse_source(root_first).unwrap().name, "root");
    assert_eq!(parse_source(root_last).unwrap().name, "root");
}

#[test]
fn last_wrapped_manifest_wins_without_root() {
    let first = manifest_json("first", "1.0.0");
    let second = manifest_json("second", "1.0.0");
    let data = tar_archive(&[
        ("package/manifest.json", first.as_str()),
        ("package/README.md", "docs"),
        ("package/manifest.json", second.as_str()),
    ]);
    for _ in 0..3 {
        assert_eq!(parse_source(data.clone()).unwrap().name, "second");
    }
}

#[test]
fn deeply_nested_manifest_is_never_selected() {
    let deep = manifest_json("deep", "1.0.0");
    let data = tar_archive(&[
        ("package/nested/manifest.json", deep.as_str()),
        ("a/b/c/manifest.json", deep.as_str()),
    ]);
    assert_eq!(
        parse_source(data).unwrap_err(),
        ParseError::ManifestNotFound
    );

    let wrapped = manifest_json("wrapped", "2.0.0");
    let data = tar_archive(&[
        ("package/manifest.json", wrapped.as_str()),
        ("package/nested/manifest.json", deep.as_str()),
    ]);
    assert_eq!(parse_source(data).unwrap().name, "wrapped");
}

#[test]
fn foreign_wrapper_directory_is_ignored() {
    let body = manifest_json("elsewhere", "1.0.0");
    let data = tar_archive(&[("dist/manifest.json", body.as_str())]);
    assert_eq!(
        parse_source(data).unwrap_err(),
        ParseError::ManifestNotFound
    );
}

#[test]
fn gzip_archive_file_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let body = manifest_json("compressed", "3.1.4");
    let data = gzip(&tar_archive(&[("package/manifest.json", body.as_str())]));
    let path = write_file(dir.path(), "compressed.lke", &data);

    let mut parser = PluginParser::new(path.as_path());
    assert_eq!(parser.parse().unwrap().version, "3.1.4");
    assert_eq!(parser.normalized_name(), "lke-plugin-compressed-v3.1.4.lke");
}

#[test]
fn symlinked_archive_is_followed() {
    let dir = tempfile::tempdir().unwrap();
    let body = manifest_json("linked", "1.0.0");
    let target = write_file(
        dir.path(),
        "real.lke",
        &tar_archive(&[("manifest.json", body.as_str())]),
    );
    let link = dir.path().join("link.lke");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    assert_eq!(parse_source(link.as_path()).unwrap().name, "linked");
}

#[test]
fn stream_source_is_consumed_once() {
    let body = manifest_json("streamed", "1.0.0");
    let data = tar_archive(&[("manifest.json", body.as_str())]);
    let mut parser = PluginParser::new(PackageSource::stream(Cursor::new(data)));

    assert_eq!(parser.parse().unwrap().name, "streamed");
    assert_eq!(parser.parse().unwrap_err(), ParseError::AlreadyParsed);
    assert_eq!(parser.status(), ParseStatus::Parsed);
    assert_eq!(parser.manifest().unwrap().name, "streamed");
}

#[test]
fn non_archive_file_has_no_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "picture.gif", b"GIF89a\x01\x00\x01\x00");
    assert_eq!(
        parse_source(path.as_path()).unwrap_err(),
        ParseError::ManifestNotFound
    );
}

#[test]
fn malformed_manifest_in_archive() {
    let data = tar_archive(&[("manifest.json", "{\"name\": \"broken\",")]);
    let mut parser = PluginParser::new(data);
    assert!(matches!(
        parser.parse(),
        Err(ParseError::MalformedManifest(_))
    ));
    assert_eq!(parser.normalized_name(), "");
}

#[test]
fn directory_source_ignores_wrapper() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("package")).unwrap();
    fs::write(
        dir.path().join("package/manifest.json"),
        manifest_json("wrapped", "1.0.0"),
    )
    .unwrap();
    assert_eq!(
        parse_source(dir.path()).unwrap_err(),
        ParseError::ManifestNotFound
    );
}

/// `package/manifest.json`, a 4 KiB payload, then the root `manifest.json`.
/// Returns the archive and the offset of the root manifest's header.
fn wrapped_then_root() -> (Vec<u8>, usize) {
    let wrapped = manifest_json("wrapped", "1.0.0");
    let root = manifest_json("root", "1.0.0");
    // Incompressible, so the payload survives gzip at full size.
    let payload: Vec<u8> = (0..4096u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect();

    let mut builder = tar::Builder::new(Vec::new());
    for (path, body) in [
        ("package/manifest.json", wrapped.as_bytes()),
        ("package/big.bin", payload.as_slice()),
        ("manifest.json", root.as_bytes()),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, path, body).unwrap();
    }
    let data = builder.into_inner().unwrap();
    let root_header = 512 + 512 + 512 + payload.len();
    assert!(data[root_header..].starts_with(b"manifest.json"));
    (data, root_header)
}

#[test]
fn intact_archive_with_late_root_picks_root() {
    let (data, _) = wrapped_then_root();
    assert_eq!(parse_source(data.clone()).unwrap().name, "root");
    assert_eq!(parse_source(gzip(&data)).unwrap().name, "root");
}

#[test]
fn truncated_tar_is_rejected_not_half_parsed() {
    let (mut data, root_header) = wrapped_then_root();
    data.truncate(root_header + 100);

    let err = parse_source(data).unwrap_err();
    assert!(matches!(err, ParseError::Unhandled(_)), "{err:?}");
}

#[test]
fn truncated_tar_inside_payload_is_rejected() {
    let (mut data, _) = wrapped_then_root();
    data.truncate(512 + 512 + 512 + 1000);
    assert!(matches!(
        parse_source(data).unwrap_err(),
        ParseError::Unhandled(_)
    ));
}

#[test]
fn truncated_gzip_is_rejected_not_half_parsed() {
    let (data, _) = wrapped_then_root();
    let mut compressed = gzip(&data);
    compressed.truncate(compressed.len() - 60);

    let mut parser = PluginParser::new(PackageSource::buffer(compressed));
    assert!(matches!(parser.parse(), Err(ParseError::Unhandled(_))));
    assert_eq!(parser.status(), ParseStatus::Error);
    assert!(parser.manifest().is_none());
    assert_eq!(parser.normalized_name(), "");
}

#[test]
fn gzip_missing_its_trailer_is_rejected() {
    let (data, _) = wrapped_then_root();
    let mut compressed = gzip(&data);
    compressed.truncate(compressed.len() - 4);
    assert!(matches!(
        parse_source(compressed).unwrap_err(),
        ParseError::Unhandled(_)
    ));
}
