//! Required external command checks.
use anyhow::{anyhow, Result};

/// Return the required commands that do not resolve on `PATH`, in input order.
pub fn missing_commands(required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|name| which::which(name.as_str()).is_err())
        .cloned()
        .collect()
}

/// Fail with a message naming every missing command.
pub fn ensure_commands(required: &[String]) -> Result<()> {
    let missing = missing_commands(required);
    if missing.is_empty() {
        tracing::debug!(commands = ?required, "required commands present");
        return Ok(());
    }
    Err(anyhow!(
        "missing required command{}: {} (install {} and retry)",
        if missing.len() == 1 { "" } else { "s" },
        missing.join(", "),
        if missing.len() == 1 { "it" } else { "them" }
    ))
}
