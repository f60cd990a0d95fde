//! Condition loading for CLI commands

use std::fs;
use std::path::Path;

use clap::Args;

use pc_compiler::{parse_condition_json, parse_condition_list};
use pc_core::Condition;

/// Where a command reads its conditions from.
#[derive(Args, Debug, Default)]
pub struct ConditionSource {
    /// Inline condition in compact text form (repeatable)
    #[arg(short, long = "condition")]
    pub conditions: Vec<String>,

    /// Condition list file, or a JSON document when it ends in `.json`
    #[arg(short, long = "file")]
    pub files: Vec<String>,
}

impl ConditionSource {
    /// Load files first, then inline conditions, keeping their order.
    pub fn load(&self) -> Result<Vec<Condition>, String> {
        if self.conditions.is_empty() && self.files.is_empty() {
            return Err("No conditions given (use --condition or --file)".to_string());
        }

        let mut all = Vec::new();
        for path in &self.files {
            let loaded = load_file(path)?;
            log::info!("loaded {} conditions from '{}'", loaded.len(), path);
            all.extend(loaded);
        }
        for text in &self.conditions {
            let condition = Condition::parse(text)
                .ok_or_else(|| format!("Unparsable condition '{}'", text))?;
            all.push(condition);
        }
        Ok(all)
    }
}

fn load_file(path: &str) -> Result<Vec<Condition>, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;

    let is_json = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        parse_condition_json(&content)
    } else {
        parse_condition_list(&content)
    };
    parsed.map_err(|e| format!("Invalid conditions in '{}': {}", path, e))
}
