use super::EXIT_SUCCESS;
use lkepm_core::{CoreError, PluginManager};
use std::io::{self, Write};

pub fn run(manager: &PluginManager, instance: Option<&str>) -> Result<u8, CoreError> {
    let Some(instance) = instance else {
        return Err(CoreError::InvalidParameter {
            param: "instance",
            value: String::new(),
            expected: "an instance name, or `instance` in the config file".to_owned(),
        });
    };
    let mut log = manager.get_logs(instance)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut log, &mut out)?;
    out.flush()?;
    Ok(EXIT_SUCCESS)
}
