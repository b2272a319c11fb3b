//! `watchpost plugins` command handler

use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use watchpost_core::{PluginDescriptor, WatchpostConfig, WatchpostError};
use watchpost_engine::PluginRegistry;

use crate::cli::{PluginsAction, PluginsArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `plugins` command.
pub fn execute(
    args: PluginsArgs,
    config: &WatchpostConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        PluginsAction::List => {
            let registry = PluginRegistry::from_config(&config.plugins, &config.http)
                .map_err(WatchpostError::from)?;
            writer.render(&PluginListReport {
                plugins: registry.descriptors(),
            })
        }
    }
}

/// Registered plugins in id order.
#[derive(Serialize)]
pub struct PluginListReport {
    pub plugins: Vec<PluginDescriptor>,
}

impl Render for PluginListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "{:<24} {:<24} {:<8} {:<6} MODE",
            "ID".bold(),
            "NAME".bold(),
            "VERSION".bold(),
            "WEIGHT".bold()
        )?;
        writeln!(w, "{}", "-".repeat(80))?;
        for plugin in &self.plugins {
            writeln!(
                w,
                "{:<24} {:<24} {:<8} {:<6} {}",
                plugin.identifier, plugin.name, plugin.version, plugin.weight, plugin.mode
            )?;
        }
        writeln!(w)?;
        writeln!(w, "Total: {} plugins", self.plugins.len())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_lists_required_plugins() {
        let registry = PluginRegistry::from_config(
            &WatchpostConfig::default().plugins,
            &WatchpostConfig::default().http,
        )
        .expect("default registry");
        let report = PluginListReport {
            plugins: registry.descriptors(),
        };
        let ids: Vec<&str> = report.plugins.iter().map(|p| p.identifier.as_str()).collect();
        assert!(ids.contains(&"alive"));
        assert!(ids.contains(&"x-frame-options"));

        colored::control::set_override(false);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("alive"));
    }
}
