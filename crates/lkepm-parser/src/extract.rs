//! Manifest discovery inside archives and directories.
//!
//! A `manifest.json` is a candidate when it sits at the package root or one
//! level down inside the [`WRAPPER_DIR`] directory that `npm pack` produces.
//! Anything deeper is never considered. When several candidates exist, the
//! last root candidate wins; without one, the last candidate overall wins.

use crate::ParseError;
use flate2::read::GzDecoder;
use lkepm_schema::{parse_manifest_bytes, Manifest, MANIFEST_FILE_NAME};
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Component, Path};
use tracing::{debug, trace, warn};

/// The one wrapper directory a manifest may be nested in.
pub const WRAPPER_DIR: &str = "package";
/// Manifests larger than this are rejected without being decoded.
pub const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDepth {
    /// Directly at the package root.
    Root,
    /// Inside the wrapper directory.
    Wrapped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestCandidate {
    pub path: String,
    pub depth: CandidateDepth,
    pub bytes: Vec<u8>,
}

/// Decide whether an entry path is a manifest candidate, and at which depth.
///
/// `.` components are ignored, so `./manifest.json` counts as a root entry.
/// Absolute paths and `..` components never match.
pub fn classify_entry(path: &Path) -> Option<CandidateDepth> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    match parts.as_slice() {
        [base] if *base == MANIFEST_FILE_NAME => Some(CandidateDepth::Root),
        [dir, base] if *dir == WRAPPER_DIR && *base == MANIFEST_FILE_NAME => {
            Some(CandidateDepth::Wrapped)
        }
        _ => None,
    }
}

/// Pick the authoritative candidate: the last root one, else the last one.
pub fn select_candidate(candidates: Vec<ManifestCandidate>) -> Option<ManifestCandidate> {
    let index = candidates
        .iter()
        .rposition(|c| c.depth == CandidateDepth::Root)
        .or_else(|| candidates.len().checked_sub(1))?;
    candidates.into_iter().nth(index)
}

/// Collect manifest candidates from a tar archive stream, gzip or plain.
///
/// Entries are visited in stream order. A stream whose first header cannot be
/// read is not a tar archive: the scan ends with a warning and no candidates,
/// so garbage input surfaces as a missing manifest. Once an entry has been
/// read, a format error means the archive is truncated or corrupt and fails
/// the scan, since the authoritative manifest may sit in the lost tail. Gzip
/// input is read to its trailer so a cut-off stream is caught even when the
/// damage falls after the last complete entry.
pub fn scan_archive<R: Read>(reader: R) -> Result<Vec<ManifestCandidate>, ParseError> {
    let mut reader = BufReader::new(reader);
    let gzipped = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    let decoded: Box<dyn Read + '_> = if gzipped {
        trace!("archive is gzip-compressed");
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    let mut archive = tar::Archive::new(decoded);
    let mut candidates = Vec::new();
    let mut entries_read = 0usize;
    for entry in archive.entries()? {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) if entries_read == 0 && is_format_error(&e) => {
                warn!("not a package archive: {e}");
                return Ok(candidates);
            }
            Err(e) => return Err(damaged(&e)),
        };
        entries_read += 1;

        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = match entry.path() {
            Ok(path) => path.into_owned(),
            Err(e) => {
                trace!("skipping entry with unreadable path: {e}");
                continue;
            }
        };
        let Some(depth) = classify_entry(&path) else {
            continue;
        };

        let size = entry.size();
        if size > MAX_MANIFEST_BYTES {
            return Err(ParseError::MalformedManifest(format!(
                "{} is {size} bytes, limit is {MAX_MANIFEST_BYTES}",
                path.display()
            )));
        }
        let mut bytes = Vec::with_capacity(size as usize);
        entry.read_to_end(&mut bytes).map_err(|e| damaged(&e))?;

        debug!("found manifest candidate {} ({depth:?})", path.display());
        candidates.push(ManifestCandidate {
            path: path.to_string_lossy().into_owned(),
            depth,
            bytes,
        });
    }

    if gzipped && entries_read > 0 {
        io::copy(&mut archive.into_inner(), &mut io::sink()).map_err(|e| damaged(&e))?;
    }
    Ok(candidates)
}

/// Collect the manifest candidate of an unpacked package directory.
///
/// A directory handed over by the caller is assumed to be unwrapped already,
/// so only a `manifest.json` file at its top level is considered.
pub fn scan_directory(dir: &Path) -> Result<Vec<ManifestCandidate>, ParseError> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() != MANIFEST_FILE_NAME {
            continue;
        }
        let path = entry.path();
        if !path.is_file() {
            trace!("ignoring non-file {}", path.display());
            continue;
        }

        let size = fs::metadata(&path)?.len();
        if size > MAX_MANIFEST_BYTES {
            return Err(ParseError::MalformedManifest(format!(
                "{} is {size} bytes, limit is {MAX_MANIFEST_BYTES}",
                path.display()
            )));
        }

        debug!("found manifest candidate {}", path.display());
        candidates.push(ManifestCandidate {
            path: MANIFEST_FILE_NAME.to_owned(),
            depth: CandidateDepth::Root,
            bytes: fs::read(&path)?,
        });
    }
    Ok(candidates)
}

/// Select among candidates and decode the winner.
pub(crate) fn resolve_manifest(candidates: Vec<ManifestCandidate>) -> Result<Manifest, ParseError> {
    let count = candidates.len();
    let selected = select_candidate(candidates).ok_or(ParseError::ManifestNotFound)?;
    if count > 1 {
        debug!("{count} manifest candidates, using {}", selected.path);
    }
    Ok(parse_manifest_bytes(&selected.bytes)?)
}

fn damaged(e: &io::Error) -> ParseError {
    ParseError::Unhandled(format!("truncated or corrupt package archive: {e}"))
}

/// Errors that mean "this is not a tar archive" rather than a failing device.
fn is_format_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::Other
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(path: &str, depth: CandidateDepth, body: &str) -> ManifestCandidate {
        ManifestCandidate {
            path: path.to_owned(),
            depth,
            bytes: body.as_bytes().to_vec(),
        }
    }

    fn tar_with(entries: &[(&str, &str)]) -> Vec<u8> {
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

    #[test]
    fn classifies_root_and_wrapped_entries() {
        assert_eq!(
            classify_entry(Path::new("manifest.json")),
            Some(CandidateDepth::Root)
        );
        assert_eq!(
            classify_entry(Path::new("./manifest.json")),
            Some(CandidateDepth::Root)
        );
        assert_eq!(
            classify_entry(Path::new("package/manifest.json")),
            Some(CandidateDepth::Wrapped)
        );
        assert_eq!(
            classify_entry(Path::new("./package/manifest.json")),
            Some(CandidateDepth::Wrapped)
        );
    }

    #[test]
    fn rejects_deep_foreign_and_unsafe_entries() {
        assert_eq!(classify_entry(Path::new("package/sub/manifest.json")), None);
        assert_eq!(classify_entry(Path::new("a/b/c/manifest.json")), None);
        assert_eq!(classify_entry(Path::new("other/manifest.json")), None);
        assert_eq!(classify_entry(Path::new("/manifest.json")), None);
        assert_eq!(classify_entry(Path::new("../manifest.json")), None);
        assert_eq!(classify_entry(Path::new("manifest.json.bak")), None);
        assert_eq!(classify_entry(Path::new("package")), None);
    }

    #[test]
    fn select_prefers_last_root_candidate() {
        let picked = select_candidate(vec![
            candidate("manifest.json", CandidateDepth::Root, "first"),
            candidate("package/manifest.json", CandidateDepth::Wrapped, "wrapped"),
            candidate("manifest.json", CandidateDepth::Root, "second"),
            candidate("package/manifest.json", CandidateDepth::Wrapped, "late"),
        ])
        .unwrap();
        assert_eq!(picked.bytes, b"second");
    }

    #[test]
    fn select_falls_back_to_last_candidate() {
        let picked = select_candidate(vec![
            candidate("package/manifest.json", CandidateDepth::Wrapped, "one"),
            candidate("package/manifest.json", CandidateDepth::Wrapped, "two"),
        ])
        .unwrap();
        assert_eq!(picked.bytes, b"two");
        assert!(select_candidate(Vec::new()).is_none());
    }

    #[test]
    fn scan_archive_collects_in_stream_order() {
        let data = tar_with(&[
            ("package/manifest.json", "wrapped"),
            ("package/index.js", "code"),
            ("manifest.json", "root"),
            ("package/deep/manifest.json", "deep"),
        ]);
        let found = scan_archive(data.as_slice()).unwrap();
        let bodies: Vec<_> = found.iter().map(|c| c.bytes.as_slice()).collect();
        assert_eq!(bodies, vec![b"wrapped".as_slice(), b"root".as_slice()]);
        assert_eq!(found[0].depth, CandidateDepth::Wrapped);
        assert_eq!(found[1].depth, CandidateDepth::Root);
    }

    #[test]
    fn scan_archive_tolerates_garbage() {
        let found = scan_archive(&b"GIF89a definitely not a tar archive"[..]).unwrap();
        assert!(found.is_empty());
        let found = scan_archive(&b""[..]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn scan_archive_rejects_oversized_manifest() {
        let huge = "x".repeat(MAX_MANIFEST_BYTES as usize + 1);
        let data = tar_with(&[("manifest.json", huge.as_str())]);
        let err = scan_archive(data.as_slice()).unwrap_err();
        assert!(matches!(err, ParseError::MalformedManifest(_)));
    }

    #[test]
    fn scan_directory_reads_only_top_level() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("package")).unwrap();
        fs::write(dir.path().join("package/manifest.json"), "wrapped").unwrap();
        assert!(scan_directory(dir.path()).unwrap().is_empty());

        fs::write(dir.path().join("manifest.json"), "root").unwrap();
        let found = scan_directory(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bytes, b"root");
    }

    #[test]
    fn scan_directory_ignores_manifest_named_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("manifest.json")).unwrap();
        assert!(scan_directory(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn resolve_reports_missing_and_malformed() {
        assert_eq!(
            resolve_manifest(Vec::new()).unwrap_err(),
            ParseError::ManifestNotFound
        );
        let err = resolve_manifest(vec![candidate(
            "manifest.json",
            CandidateDepth::Root,
            "{not json",
        )])
        .unwrap_err();
        assert!(matches!(err, ParseError::MalformedManifest(_)));
    }
}
