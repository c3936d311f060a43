use super::{colorize_state, json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use lkepm_core::{CoreError, PluginManager};
use lkepm_store::DeploymentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Disable,
    Enable,
    Restore,
    Delete,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Disable => "disable",
            Action::Enable => "enable",
            Action::Restore => "restore",
            Action::Delete => "delete",
        }
    }

    /// State the package ends up in.
    fn target(self) -> DeploymentState {
        match self {
            Action::Disable => DeploymentState::Disabled,
            Action::Enable | Action::Restore => DeploymentState::Enabled,
            Action::Delete => DeploymentState::RecycleBin,
        }
    }
}

pub fn run(manager: &PluginManager, action: Action, file: &str, json: bool) -> Result<u8, CoreError> {
    let pb = spinner(&format!("{}: {file}...", action.verb()), json);
    let result = match action {
        Action::Disable => manager.disable(file),
        Action::Enable => manager.enable(file),
        Action::Restore => manager.restore(file),
        Action::Delete => manager.delete(file),
    };
    if let Err(e) = result {
        spin_fail(&pb, &format!("{} failed", action.verb()));
        return Err(e);
    }

    let target = action.target();
    spin_ok(&pb, &format!("{file} -> {}", colorize_state(&target.to_string())));
    if json {
        let payload = serde_json::json!({
            "status": "ok",
            "fileName": file,
            "state": target,
        });
        println!("{}", json_pretty(&payload)?);
    } else if pb.is_hidden() {
        println!("{file} -> {target}");
    }
    Ok(EXIT_SUCCESS)
}
