use crate::ParseError;
use std::fmt;
use std::fs::{self, File};
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a plugin package comes from.
pub enum PackageSource {
    /// A file (archive) or directory on the local filesystem.
    Path(PathBuf),
    /// A complete archive held in memory.
    Buffer(Vec<u8>),
    /// A sequential archive byte source, consumed exactly once.
    Stream(Box<dyn Read + Send>),
}

impl PackageSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn buffer(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Buffer(bytes.into())
    }

    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        Self::Stream(Box::new(reader))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Buffer(_) => "buffer",
            Self::Stream(_) => "stream",
        }
    }
}

impl fmt::Debug for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Buffer(bytes) => write!(f, "Buffer({} bytes)", bytes.len()),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<PathBuf> for PackageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for PackageSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&PathBuf> for PackageSource {
    fn from(path: &PathBuf) -> Self {
        Self::Path(path.clone())
    }
}

impl From<Vec<u8>> for PackageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Buffer(bytes)
    }
}

/// A classified source, ready for manifest extraction.
pub(crate) enum OpenedSource {
    Archive(Box<dyn Read + Send>),
    Directory(PathBuf),
}

impl fmt::Debug for OpenedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive(_) => f.write_str("Archive(..)"),
            Self::Directory(dir) => f.debug_tuple("Directory").field(dir).finish(),
        }
    }
}

/// Classify and open a source. No decoding happens here.
pub(crate) fn open_source(source: PackageSource) -> Result<OpenedSource, ParseError> {
    match source {
        PackageSource::Path(path) => open_path(&path),
        PackageSource::Buffer(bytes) => Ok(OpenedSource::Archive(Box::new(Cursor::new(bytes)))),
        PackageSource::Stream(reader) => Ok(OpenedSource::Archive(reader)),
    }
}

fn open_path(path: &Path) -> Result<OpenedSource, ParseError> {
    if path.as_os_str().is_empty() {
        return Err(ParseError::InvalidSource("empty path".to_owned()));
    }

    // Classify the symlink target, not the link.
    let resolved = match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ParseError::PathNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let file_type = fs::symlink_metadata(&resolved)?.file_type();
    if file_type.is_file() {
        debug!("opening package archive {}", resolved.display());
        Ok(OpenedSource::Archive(Box::new(File::open(&resolved)?)))
    } else if file_type.is_dir() {
        debug!("reading package directory {}", resolved.display());
        Ok(OpenedSource::Directory(resolved))
    } else {
        Err(ParseError::InvalidObject(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_path_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.lke");
        let err = open_source(PackageSource::path(&missing)).unwrap_err();
        assert_eq!(err, ParseError::PathNotFound(missing));
    }

    #[test]
    fn dangling_symlink_is_path_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("dangling.lke");
        std::os::unix::fs::symlink(dir.path().join("gone"), &link).unwrap();
        let err = open_source(PackageSource::path(&link)).unwrap_err();
        assert!(matches!(err, ParseError::PathNotFound(_)));
    }

    #[test]
    fn empty_path_is_invalid_source() {
        let err = open_source(PackageSource::path("")).unwrap_err();
        assert!(matches!(err, ParseError::InvalidSource(_)));
    }

    #[test]
    fn file_opens_as_archive() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plugin.lke");
        fs::write(&file, b"bytes").unwrap();
        let opened = open_source(PackageSource::path(&file)).unwrap();
        assert!(matches!(opened, OpenedSource::Archive(_)));
    }

    #[test]
    fn directory_is_recognized_without_stream() {
        let dir = tempfile::tempdir().unwrap();
        let opened = open_source(PackageSource::path(dir.path())).unwrap();
        assert!(matches!(opened, OpenedSource::Directory(_)));
    }

    #[test]
    fn symlinked_directory_resolves_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real");
        fs::create_dir(&target).unwrap();
        let link = dir.path().join("link.lke");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        match open_source(PackageSource::path(&link)).unwrap() {
            OpenedSource::Directory(resolved) => {
                assert_eq!(resolved, fs::canonicalize(&target).unwrap());
            }
            other @ OpenedSource::Archive(_) => panic!("expected directory, got {other:?}"),
        }
    }

    #[test]
    fn socket_is_invalid_object() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("plugin.sock");
        let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();
        let err = open_source(PackageSource::path(&socket)).unwrap_err();
        assert_eq!(err, ParseError::InvalidObject(socket));
    }

    #[test]
    fn buffer_and_stream_open_as_archives() {
        let opened = open_source(PackageSource::buffer(vec![1, 2, 3])).unwrap();
        assert!(matches!(opened, OpenedSource::Archive(_)));
        let opened = open_source(PackageSource::stream(Cursor::new(vec![4, 5]))).unwrap();
        assert!(matches!(opened, OpenedSource::Archive(_)));
    }

    #[test]
    fn source_kind_labels() {
        assert_eq!(PackageSource::path("/x").kind(), "path");
        assert_eq!(PackageSource::buffer(Vec::new()).kind(), "buffer");
        assert_eq!(PackageSource::stream(std::io::empty()).kind(), "stream");
    }
}
