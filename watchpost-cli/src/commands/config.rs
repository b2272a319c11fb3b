//! `watchpost config` command handler

use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use tracing::info;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::commands::ConfigSource;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Sections accepted by `config show --section`.
const SECTIONS: [&str; 6] = ["general", "scheduler", "http", "plugins", "plans", "reports"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    source: &ConfigSource,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(source, writer).await,
        ConfigAction::Show { section } => execute_show(source, section, writer).await,
    }
}

/// Loads and validates the configuration, reporting any errors.
///
/// # Errors
///
/// Returns `CliError::Config` if the file is missing, malformed or holds
/// out-of-range values.
async fn execute_validate(source: &ConfigSource, writer: &OutputWriter) -> Result<(), CliError> {
    info!(source = %source.describe(), "validating configuration");

    let report = match source.load().await {
        Ok(_) => ConfigValidationReport {
            source: source.describe(),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: source.describe(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Displays the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Core` if loading fails or `CliError::Command` if the
/// section name is unknown.
async fn execute_show(
    source: &ConfigSource,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(source = %source.describe(), "loading configuration");

    let config = source.load().await?;

    let config_toml = match section.as_deref() {
        None => to_toml(&config),
        Some("general") => to_toml(&config.general),
        Some("scheduler") => to_toml(&config.scheduler),
        Some("http") => to_toml(&config.http),
        Some("plugins") => to_toml(&config.plugins),
        Some("plans") => to_toml(&config.plans),
        Some("reports") => to_toml(&config.reports),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    let report = ConfigReport {
        source: source.describe(),
        section,
        config_toml,
    };
    writer.render(&report)?;
    Ok(())
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {})", e))
}

/// Config validation result.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", "Configuration Validation".bold())?;
        writeln!(w, "Source: {}", self.source)?;
        if self.valid {
            writeln!(w, "Status: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "Status: {}", "INVALID".red().bold())?;
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for error in &self.errors {
                writeln!(w, "  - {}", error.red())?;
            }
        }
        Ok(())
    }
}

/// Effective configuration, whole or one section.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(rename = "config")]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        write!(w, "{}", "Configuration".bold())?;
        if let Some(section) = &self.section {
            write!(w, " [{}]", section.cyan())?;
        }
        writeln!(w)?;
        writeln!(w, "Source: {}", self.source)?;
        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::cli::OutputFormat;

    #[test]
    fn test_validation_report_text_lists_errors() {
        colored::control::set_override(false);
        let report = ConfigValidationReport {
            source: "watchpost.toml".to_owned(),
            valid: false,
            errors: vec!["scheduler.workers must be greater than 0".to_owned()],
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("INVALID"));
        assert!(output.contains("scheduler.workers"));
    }

    #[test]
    fn test_config_report_json_renames_body() {
        let report = ConfigReport {
            source: "(defaults)".to_owned(),
            section: Some("scheduler".to_owned()),
            config_toml: "workers = 4\n".to_owned(),
        };
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["config"], "workers = 4\n");
        assert_eq!(json["section"], "scheduler");
    }

    #[tokio::test]
    async fn test_validate_missing_file_is_config_error() {
        let source = ConfigSource::File(PathBuf::from("/nonexistent/watchpost.toml"));
        let writer = OutputWriter::new(OutputFormat::Json);
        let err = execute_validate(&source, &writer).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_show_rejects_unknown_section() {
        let writer = OutputWriter::new(OutputFormat::Json);
        let err = execute_show(&ConfigSource::Defaults, Some("ebpf".to_owned()), &writer)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown section: ebpf"));
    }
}
