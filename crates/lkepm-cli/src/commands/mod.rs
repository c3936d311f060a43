pub mod inspect;
pub mod install;
pub mod lifecycle;
pub mod list;
pub mod logs;
pub mod manifest;
pub mod parse;
pub mod purge;

use indicatif::{ProgressBar, ProgressStyle};
use lkepm_core::{CoreError, ErrorKind};
use lkepm_schema::Manifest;
use std::io::Read;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PACKAGE_ERROR: u8 = 2;
pub const EXIT_ACTION_ERROR: u8 = 3;
pub const EXIT_UNHANDLED: u8 = 4;

/// Exit code family of an error. Setup failures (config, locking) are generic.
pub fn exit_code_for(error: &CoreError) -> u8 {
    if matches!(error, CoreError::Config(_) | CoreError::Lock(_)) {
        return EXIT_FAILURE;
    }
    match error.kind() {
        ErrorKind::PathNotFound
        | ErrorKind::InvalidObject
        | ErrorKind::InvalidSource
        | ErrorKind::ManifestNotFound
        | ErrorKind::MalformedManifest
        | ErrorKind::PackageNotFound => EXIT_PACKAGE_ERROR,
        ErrorKind::AlreadyParsed
        | ErrorKind::InvalidSelfAction
        | ErrorKind::InvalidFileName
        | ErrorKind::InvalidParameter => EXIT_ACTION_ERROR,
        ErrorKind::Unhandled => EXIT_UNHANDLED,
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CoreError> {
    serde_json::to_string_pretty(value).map_err(|e| CoreError::Io(e.into()))
}

/// Read an archive from stdin when the argument is `-`.
pub fn read_stdin() -> Result<Vec<u8>, CoreError> {
    let mut bytes = Vec::new();
    std::io::stdin().lock().read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Spinner on stderr, hidden in JSON mode and when stderr is not a terminal.
pub fn spinner(msg: &str, json: bool) -> ProgressBar {
    if json || !console::Term::stderr().is_term() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        style("{spinner:.cyan} {msg}")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(style("{msg}"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(style("{msg}"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "enabled" => Style::new().green().apply_to(state).to_string(),
        "disabled" => Style::new().yellow().apply_to(state).to_string(),
        "recyclebin" => Style::new().dim().apply_to(state).to_string(),
        "available" => Style::new().cyan().apply_to(state).to_string(),
        "deployed" => Style::new().blue().bold().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}

/// Human-readable manifest block.
pub fn print_manifest(manifest: &Manifest) {
    println!("name:        {}", manifest.name);
    println!("version:     {}", manifest.version);
    if let Some(api) = &manifest.plugin_api_version {
        println!("plugin api:  {api}");
    }
    if let Some(lke) = &manifest.linkurious_version {
        println!("linkurious:  {lke}");
    }
    if let Some(route) = &manifest.public_route {
        println!("public:      {route}");
    }
    if let Some(index) = &manifest.single_page_app_index {
        println!("spa index:   {index}");
    }
    if let Some(files) = &manifest.backend_files {
        println!("backend:     {}", files.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_manifest() {
        let manifest = Manifest::new("foo", "1.0.0");
        let result = json_pretty(&manifest).unwrap();
        assert!(result.contains("\"name\": \"foo\""));
    }

    #[test]
    fn exit_codes_by_family() {
        use lkepm_parser::ParseError;
        use lkepm_store::StoreError;

        let code = |e: CoreError| exit_code_for(&e);
        assert_eq!(code(ParseError::ManifestNotFound.into()), EXIT_PACKAGE_ERROR);
        assert_eq!(
            code(CoreError::PackageNotFound("x".into())),
            EXIT_PACKAGE_ERROR
        );
        assert_eq!(
            code(CoreError::InvalidSelfAction("x".into())),
            EXIT_ACTION_ERROR
        );
        assert_eq!(
            code(StoreError::InvalidFileName("../x".into()).into()),
            EXIT_ACTION_ERROR
        );
        assert_eq!(code(ParseError::Unhandled("boom".into()).into()), EXIT_UNHANDLED);
        assert_eq!(code(CoreError::Config("bad".into())), EXIT_FAILURE);
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_PACKAGE_ERROR,
            EXIT_ACTION_ERROR,
            EXIT_UNHANDLED,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn colorize_state_keeps_label() {
        for state in ["enabled", "disabled", "recyclebin", "available", "deployed"] {
            assert!(colorize_state(state).contains(state));
        }
        assert_eq!(colorize_state("unknown"), "unknown");
    }

    #[test]
    fn hidden_spinner_in_json_mode() {
        let pb = spinner("installing...", true);
        assert!(pb.is_hidden());
        spin_ok(&pb, "done");
    }

    #[test]
    fn spinner_fail_finishes() {
        let pb = spinner("testing...", false);
        spin_fail(&pb, "failed");
    }
}
