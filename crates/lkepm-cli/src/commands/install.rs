use super::{json_pretty, read_stdin, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use lkepm_core::{CoreError, PluginManager};
use lkepm_parser::PackageSource;
use lkepm_schema::ArtifactName;
use std::path::Path;

pub fn run(
    manager: &PluginManager,
    source: &str,
    consume: bool,
    json: bool,
) -> Result<u8, CoreError> {
    let pb = spinner(&format!("installing {source}..."), json);
    let result = if source == "-" {
        read_stdin().and_then(|bytes| manager.install(PackageSource::buffer(bytes)))
    } else if consume {
        manager.install_upload(Path::new(source))
    } else {
        manager.install(PackageSource::path(source))
    };
    report(&pb, result, json)
}

pub fn run_available(manager: &PluginManager, name: &str, json: bool) -> Result<u8, CoreError> {
    let pb = spinner(&format!("installing {name} from the catalog..."), json);
    report(&pb, manager.install_from_catalog(name), json)
}

fn report(
    pb: &indicatif::ProgressBar,
    result: Result<ArtifactName, CoreError>,
    json: bool,
) -> Result<u8, CoreError> {
    match result {
        Ok(file_name) => {
            spin_ok(pb, &format!("installed {file_name}"));
            if json {
                let payload = serde_json::json!({
                    "status": "ok",
                    "fileName": file_name,
                });
                println!("{}", json_pretty(&payload)?);
            } else if pb.is_hidden() {
                println!("installed {file_name}");
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            spin_fail(pb, "install failed");
            Err(e)
        }
    }
}
