//! `watchpost plans` command handler

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use tracing::info;

use watchpost_core::{CatalogError, WatchpostConfig, WatchpostError};
use watchpost_engine::{PlanCatalog, PlanSummary, PluginRegistry, ResolvedPlan};

use crate::cli::{PlansAction, PlansArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `plans` command.
pub async fn execute(
    args: PlansArgs,
    config: &WatchpostConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let catalog = load_catalog(config).await?;
    match args.action {
        PlansAction::List => {
            let report = PlanListReport {
                plans: catalog.list(),
            };
            writer.render(&report)
        }
        PlansAction::Show { name } => {
            let plan = catalog
                .get(&name)
                .map_err(WatchpostError::from)?
                .ok_or_else(|| WatchpostError::from(CatalogError::UnknownPlan { name }))?;
            writer.render(&PlanDetailReport { plan })
        }
    }
}

async fn load_catalog(config: &WatchpostConfig) -> Result<PlanCatalog, CliError> {
    let registry = PluginRegistry::from_config(&config.plugins, &config.http)
        .map_err(WatchpostError::from)?;
    let catalog = PlanCatalog::load(&config.plans, Arc::new(registry)).await?;
    info!(plans = catalog.len(), "plan catalog loaded");
    Ok(catalog)
}

/// Every plan in catalog order.
#[derive(Serialize)]
pub struct PlanListReport {
    pub plans: Vec<PlanSummary>,
}

impl Render for PlanListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.plans.is_empty() {
            writeln!(w, "No plans defined.")?;
            return Ok(());
        }

        writeln!(
            w,
            "{:<20} {:<5} {:<6} DESCRIPTION",
            "NAME".bold(),
            "REV".bold(),
            "STEPS".bold()
        )?;
        writeln!(w, "{}", "-".repeat(80))?;
        for plan in &self.plans {
            writeln!(
                w,
                "{:<20} {:<5} {:<6} {}",
                plan.name,
                plan.revision,
                plan.plugins.len(),
                plan.description
            )?;
        }
        writeln!(w)?;
        writeln!(w, "Total: {} plans", self.plans.len())?;
        Ok(())
    }
}

/// One plan with its steps resolved against the registry.
#[derive(Serialize)]
pub struct PlanDetailReport {
    #[serde(flatten)]
    pub plan: ResolvedPlan,
}

impl Render for PlanDetailReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let plan = &self.plan;
        writeln!(w, "{} (revision {})", plan.name.bold(), plan.revision)?;
        if !plan.description.is_empty() {
            writeln!(w, "{}", plan.description)?;
        }
        writeln!(w)?;
        for (n, step) in plan.workflow.iter().enumerate() {
            writeln!(
                w,
                "{:>2}. {} [{}]",
                n + 1,
                step.plugin.identifier.cyan(),
                step.plugin.weight
            )?;
            if !step.description.is_empty() {
                writeln!(w, "    {}", step.description)?;
            }
            for (key, value) in &step.configuration {
                writeln!(w, "    {} = {}", key, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_catalog_lists_basic_plan() {
        let catalog = load_catalog(&WatchpostConfig::default())
            .await
            .expect("built-in catalog loads");
        let report = PlanListReport {
            plans: catalog.list(),
        };
        assert!(report.plans.iter().any(|p| p.name == "basic"));

        colored::control::set_override(false);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("basic"));
        assert!(output.contains("Total:"));
    }

    #[tokio::test]
    async fn test_show_unknown_plan_fails() {
        let args = PlansArgs {
            action: PlansAction::Show {
                name: "nope".to_owned(),
            },
        };
        let writer = OutputWriter::new(crate::cli::OutputFormat::Json);
        let err = execute(args, &WatchpostConfig::default(), &writer)
            .await
            .unwrap_err();
        match err {
            CliError::Core(e) => assert_eq!(e.reason(), "no-such-plan"),
            other => panic!("expected core error, got {other:?}"),
        }
    }
}
