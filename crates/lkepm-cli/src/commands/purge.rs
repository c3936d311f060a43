use super::{colorize_state, json_pretty, EXIT_SUCCESS};
use lkepm_core::{CoreError, PluginManager};
use lkepm_store::DeploymentState;

pub fn run(manager: &PluginManager, state: DeploymentState, json: bool) -> Result<u8, CoreError> {
    let removed = manager.purge_state(state)?;
    if json {
        let payload = serde_json::json!({
            "status": "ok",
            "state": state,
            "removed": removed,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "purged {removed} entries from {}",
            colorize_state(&state.to_string())
        );
    }
    Ok(EXIT_SUCCESS)
}
