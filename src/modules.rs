//! Module allow-list and relevant-module selection.
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Immutable map from ECS module name to downstream template file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMap {
    entries: BTreeMap<String, String>,
}

impl ModuleMap {
    pub fn new(entries: BTreeMap<String, String>) -> Result<Self> {
        if entries.is_empty() {
            return Err(anyhow!("module map must contain at least one module"));
        }
        for (module, file) in &entries {
            if !is_plain_name(module) {
                return Err(anyhow!("invalid module name {module:?}"));
            }
            if !is_plain_name(file) {
                return Err(anyhow!(
                    "module {module:?} maps to invalid template file name {file:?}"
                ));
            }
        }
        Ok(Self { entries })
    }

    pub fn template_for(&self, module: &str) -> Option<&str> {
        self.entries.get(module).map(String::as_str)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.entries.contains_key(module)
    }
}

/// Result of intersecting detected modules with the allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleSelection {
    /// Mapped modules, in first-detection order.
    pub relevant: Vec<String>,
    /// Detected modules with no mapped template.
    pub skipped: Vec<String>,
}

/// Keep detected modules that have a mapped template, preserving order.
///
/// Unmapped modules are logged and reported, never treated as errors.
pub fn select_relevant(detected: &[String], map: &ModuleMap) -> ModuleSelection {
    let mut seen = HashSet::new();
    let mut selection = ModuleSelection::default();
    for module in detected {
        if !seen.insert(module.as_str()) {
            continue;
        }
        if map.contains(module) {
            selection.relevant.push(module.clone());
        } else {
            tracing::info!(module = %module, "skipping module without mapped template");
            selection.skipped.push(module.clone());
        }
    }
    selection
}

fn is_plain_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}
