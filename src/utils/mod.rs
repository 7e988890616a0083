pub mod http;

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Directory holding `config.json`: `$LINEHOOK_HOME`, else `~/.linehook`.
pub fn get_linehook_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("LINEHOOK_HOME") {
        return Ok(PathBuf::from(home));
    }
    Ok(dirs::home_dir()
        .context("Could not determine home directory")?
        .join(".linehook"))
}
