use super::{colorize_state, json_pretty, EXIT_SUCCESS};
use lkepm_core::{CoreError, PluginManager};
use lkepm_store::DeploymentState;

pub fn run(manager: &PluginManager, state: DeploymentState, json: bool) -> Result<u8, CoreError> {
    let packages = manager.list_packages(state)?;
    if json {
        println!("{}", json_pretty(&packages)?);
    } else if packages.is_empty() {
        println!("no {state} plugins found");
    } else {
        println!("{:<44} {:<28} {:<12} STATE", "FILE", "NAME", "VERSION");
        let state_str = colorize_state(&state.to_string());
        for (file, manifest) in &packages {
            println!(
                "{:<44} {:<28} {:<12} {}",
                file, manifest.name, manifest.version, state_str
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
