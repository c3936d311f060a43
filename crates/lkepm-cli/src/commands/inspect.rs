use super::{json_pretty, print_manifest, EXIT_SUCCESS};
use lkepm_core::{CoreError, PluginManager};

pub fn run(manager: &PluginManager, file: &str, json: bool) -> Result<u8, CoreError> {
    let manifest = manager.inspect(file)?;
    if json {
        println!("{}", json_pretty(&manifest)?);
    } else {
        println!("file:        {file}");
        print_manifest(&manifest);
    }
    Ok(EXIT_SUCCESS)
}
