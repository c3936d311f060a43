use crate::extract::{resolve_manifest, scan_archive, scan_directory};
use crate::source::{open_source, OpenedSource, PackageSource};
use crate::ParseError;
use lkepm_schema::Manifest;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    Initialized,
    Parsed,
    Error,
}

impl fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseStatus::Initialized => write!(f, "initialized"),
            ParseStatus::Parsed => write!(f, "parsed"),
            ParseStatus::Error => write!(f, "error"),
        }
    }
}

enum ParserState {
    Unparsed(PackageSource),
    Parsed(Manifest),
    Errored(ParseError),
}

impl ParserState {
    /// Leave `Unparsed`, handing out the source. Terminal states are kept as-is.
    fn take_source(&mut self) -> Result<PackageSource, ParseError> {
        match std::mem::replace(self, ParserState::Errored(ParseError::AlreadyParsed)) {
            ParserState::Unparsed(source) => Ok(source),
            terminal => {
                *self = terminal;
                Err(ParseError::AlreadyParsed)
            }
        }
    }

    fn finish(&mut self, outcome: Result<Manifest, ParseError>) -> Result<&Manifest, ParseError> {
        *self = match outcome {
            Ok(manifest) => ParserState::Parsed(manifest),
            Err(error) => ParserState::Errored(error),
        };
        match &*self {
            ParserState::Parsed(manifest) => Ok(manifest),
            ParserState::Errored(error) => Err(error.clone()),
            ParserState::Unparsed(_) => Err(ParseError::AlreadyParsed),
        }
    }
}

/// Single-use parser for one plugin package source.
///
/// The first [`parse`](Self::parse) consumes the source and moves the parser
/// to a terminal state; every later call fails with
/// [`ParseError::AlreadyParsed`] and leaves the first outcome untouched.
pub struct PluginParser {
    state: ParserState,
}

impl PluginParser {
    pub fn new(source: impl Into<PackageSource>) -> Self {
        Self {
            state: ParserState::Unparsed(source.into()),
        }
    }

    pub fn status(&self) -> ParseStatus {
        match self.state {
            ParserState::Unparsed(_) => ParseStatus::Initialized,
            ParserState::Parsed(_) => ParseStatus::Parsed,
            ParserState::Errored(_) => ParseStatus::Error,
        }
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        match &self.state {
            ParserState::Parsed(manifest) => Some(manifest),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ParseError> {
        match &self.state {
            ParserState::Errored(error) => Some(error),
            _ => None,
        }
    }

    /// Canonical artifact name of the parsed package, or an empty string when
    /// the parser has no complete manifest.
    pub fn normalized_name(&self) -> String {
        match self.manifest() {
            Some(manifest) if manifest.is_complete() => manifest.normalized_name().into_inner(),
            _ => String::new(),
        }
    }

    pub fn parse(&mut self) -> Result<&Manifest, ParseError> {
        let source = self.state.take_source()?;
        let kind = source.kind();
        debug!("parsing plugin package from {kind} source");

        let outcome = read_manifest(source);
        match &outcome {
            Ok(manifest) => debug!(
                "parsed plugin '{}' version '{}'",
                manifest.name, manifest.version
            ),
            Err(e) => debug!("plugin parse failed: {e}"),
        }
        self.state.finish(outcome)
    }
}

impl fmt::Debug for PluginParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginParser")
            .field("status", &self.status())
            .field("manifest", &self.manifest())
            .field("error", &self.error())
            .finish()
    }
}

fn read_manifest(source: PackageSource) -> Result<Manifest, ParseError> {
    let candidates = match open_source(source)? {
        OpenedSource::Archive(reader) => scan_archive(reader)?,
        OpenedSource::Directory(dir) => scan_directory(&dir)?,
    };
    resolve_manifest(candidates)
}

/// Parse a source once and take ownership of its manifest.
pub fn parse_source(source: impl Into<PackageSource>) -> Result<Manifest, ParseError> {
    let mut parser = PluginParser::new(source);
    parser.parse().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn manifest_dir(body: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("manifest.json"), body).unwrap();
        dir
    }

    #[test]
    fn new_parser_is_initialized() {
        let parser = PluginParser::new(PackageSource::buffer(Vec::new()));
        assert_eq!(parser.status(), ParseStatus::Initialized);
        assert!(parser.manifest().is_none());
        assert!(parser.error().is_none());
        assert_eq!(parser.normalized_name(), "");
    }

    #[test]
    fn parses_directory_source() {
        let dir = manifest_dir(r#"{"name": "foo", "version": "1.2.3"}"#);
        let mut parser = PluginParser::new(dir.path());
        let manifest = parser.parse().unwrap();
        assert_eq!(manifest.name, "foo");
        assert_eq!(parser.status(), ParseStatus::Parsed);
        assert_eq!(parser.normalized_name(), "lke-plugin-foo-v1.2.3.lke");
    }

    #[test]
    fn second_parse_fails_and_keeps_first_result() {
        let dir = manifest_dir(r#"{"name": "foo", "version": "1.2.3"}"#);
        let mut parser = PluginParser::new(dir.path());
        parser.parse().unwrap();

        assert_eq!(parser.parse().unwrap_err(), ParseError::AlreadyParsed);
        assert_eq!(parser.status(), ParseStatus::Parsed);
        assert_eq!(parser.manifest().unwrap().version, "1.2.3");
        assert!(parser.error().is_none());
    }

    #[test]
    fn second_parse_after_error_keeps_first_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut parser = PluginParser::new(dir.path());
        assert_eq!(parser.parse().unwrap_err(), ParseError::ManifestNotFound);

        assert_eq!(parser.parse().unwrap_err(), ParseError::AlreadyParsed);
        assert_eq!(parser.status(), ParseStatus::Error);
        assert_eq!(parser.error(), Some(&ParseError::ManifestNotFound));
        assert!(parser.manifest().is_none());
        assert_eq!(parser.normalized_name(), "");
    }

    #[test]
    fn malformed_manifest_is_error_state() {
        let dir = manifest_dir("{ nope");
        let mut parser = PluginParser::new(dir.path());
        assert!(matches!(
            parser.parse(),
            Err(ParseError::MalformedManifest(_))
        ));
        assert_eq!(parser.status(), ParseStatus::Error);
    }

    #[test]
    fn incomplete_manifest_parses_without_normalized_name() {
        let dir = manifest_dir(r#"{"name": "foo"}"#);
        let mut parser = PluginParser::new(dir.path());
        assert!(!parser.parse().unwrap().is_complete());
        assert_eq!(parser.status(), ParseStatus::Parsed);
        assert_eq!(parser.normalized_name(), "");
    }

    #[test]
    fn parse_source_returns_owned_manifest() {
        let dir = manifest_dir(r#"{"name": "lke-plugin-bar", "version": "0.1.0"}"#);
        let manifest = parse_source(dir.path()).unwrap();
        assert_eq!(manifest.normalized_name(), "lke-plugin-bar-v0.1.0.lke");
    }

    #[test]
    fn status_display_matches_labels() {
        assert_eq!(ParseStatus::Initialized.to_string(), "initialized");
        assert_eq!(ParseStatus::Parsed.to_string(), "parsed");
        assert_eq!(ParseStatus::Error.to_string(), "error");
    }
}
