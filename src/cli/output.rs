//! Output formatting for CLI commands.
//!
//! This module renders run results for the operator: a per-module state
//! table plus issue and attribute listings in text mode, or the serialized
//! result in JSON mode.

use std::fmt::Write;

use chrono::Local;
use colored::Colorize;
use tabled::{Table, Tabled};

use crate::module::ModuleState;
use crate::orchestrator::OverallResult;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Module state row for table display.
#[derive(Tabled)]
struct ModuleRow {
    #[tabled(rename = "Section")]
    section: String,
    #[tabled(rename = "State")]
    state: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a run result for display.
    #[must_use]
    pub fn format_result(&self, result: &OverallResult, applied: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => Self::format_result_text(result, applied),
        }
    }

    /// Formats a result as text.
    fn format_result_text(result: &OverallResult, applied: bool) -> String {
        let mut output = String::new();

        let mode = if applied { "Configuration run" } else { "Configuration check" };
        let _ = writeln!(
            output,
            "\n{mode} at {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let rows: Vec<ModuleRow> = result
            .per_module
            .iter()
            .map(|(section, state)| ModuleRow {
                section: section.clone(),
                state: Self::format_state(*state),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if !result.issues.is_empty() {
            let _ = writeln!(output, "\n{} Validation issues:", "!".yellow());
            for issue in &result.issues {
                let _ = writeln!(output, "   - {issue}");
            }
        }

        if applied && !result.attributes.is_empty() {
            let _ = writeln!(output, "\nExported attributes:");
            for (name, value) in &result.attributes {
                let _ = writeln!(output, "   {name}={value}");
            }
        }

        if result.ok {
            let _ = writeln!(output, "\n{} All modules completed.", "OK".green());
        } else {
            let _ = writeln!(output, "\n{} Some modules failed.", "FAILED".red());
        }

        output
    }

    /// Colors a module state for table display.
    fn format_state(state: ModuleState) -> String {
        match state {
            ModuleState::Configured | ModuleState::Validated => state.to_string().green().to_string(),
            ModuleState::Failed => state.to_string().red().to_string(),
            ModuleState::New | ModuleState::Parsed => state.to_string().yellow().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn result() -> OverallResult {
        let mut per_module = BTreeMap::new();
        per_module.insert(String::from("Gateway"), ModuleState::Configured);
        per_module.insert(String::from("Cache Proxy"), ModuleState::Failed);
        OverallResult {
            per_module,
            attributes: BTreeMap::new(),
            issues: Vec::new(),
            ok: false,
        }
    }

    #[test]
    fn test_text_output_names_every_module() {
        let rendered = OutputFormatter::new(OutputFormat::Text).format_result(&result(), true);
        assert!(rendered.contains("Gateway"));
        assert!(rendered.contains("Cache Proxy"));
        assert!(rendered.contains("Some modules failed"));
    }

    #[test]
    fn test_json_output_is_valid_json() {
        let rendered = OutputFormatter::new(OutputFormat::Json).format_result(&result(), true);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["ok"], serde_json::Value::Bool(false));
    }
}
