use super::{json_pretty, print_manifest, EXIT_SUCCESS};
use lkepm_core::{CoreError, PluginManager};

pub fn run(manager: &PluginManager, json: bool) -> Result<u8, CoreError> {
    let manifest = manager.get_manifest();
    if json {
        println!("{}", json_pretty(manifest)?);
    } else {
        print_manifest(manifest);
        println!("file name:   {}", manifest.normalized_name());
        if let Some(root) = manager.layout().host_root() {
            println!("host root:   {}", root.display());
        }
    }
    Ok(EXIT_SUCCESS)
}
