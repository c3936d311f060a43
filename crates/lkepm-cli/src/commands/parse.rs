use super::{json_pretty, print_manifest, read_stdin, EXIT_SUCCESS};
use lkepm_core::CoreError;
use lkepm_parser::{PackageSource, ParseStatus, PluginParser};

pub fn run(source: &str, json: bool) -> Result<u8, CoreError> {
    let source = if source == "-" {
        PackageSource::buffer(read_stdin()?)
    } else {
        PackageSource::path(source)
    };
    let mut parser = PluginParser::new(source);
    // The terminal state stays on the parser; the result is read back below.
    let _ = parser.parse();

    if json {
        let payload = serde_json::json!({
            "status": parser.status(),
            "normalizedName": parser.manifest().map(|_| parser.normalized_name()),
            "manifest": parser.manifest(),
            "error": parser.error().map(ToString::to_string),
        });
        println!("{}", json_pretty(&payload)?);
    } else if let Some(manifest) = parser.manifest() {
        println!("status:      {}", parser.status());
        println!("file name:   {}", parser.normalized_name());
        print_manifest(manifest);
    }

    match (parser.status(), parser.error()) {
        (ParseStatus::Parsed, _) => Ok(EXIT_SUCCESS),
        (_, Some(e)) => Err(CoreError::Parse(e.clone())),
        (_, None) => Err(CoreError::Parse(lkepm_parser::ParseError::Unhandled(
            "parser finished without a result".to_owned(),
        ))),
    }
}
