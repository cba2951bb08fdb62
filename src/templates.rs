//! Commit and pull-request text.
//!
//! Commit message, PR title, and PR body all list the relevant modules with the
//! same separator so reruns converge on identical text.

/// Separator between module names in every generated message.
pub const MODULE_SEPARATOR: &str = " ";

const SUMMARY_PREFIX: &str = "Update ECS templates for modified modules:";

pub fn module_list(modules: &[String]) -> String {
    modules.join(MODULE_SEPARATOR)
}

pub fn commit_message(modules: &[String]) -> String {
    format!("{SUMMARY_PREFIX} {}", module_list(modules))
}

pub fn pull_request_title(modules: &[String]) -> String {
    commit_message(modules)
}

pub fn pull_request_body(modules: &[String]) -> String {
    format!(
        "This PR updates the ECS index templates for the following modules: {}",
        module_list(modules)
    )
}
