//! CLI argument parsing using clap derive API
//!
//! Purely declarative; no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Watchpost -- run security scan plans against web targets.
///
/// Use `watchpost <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "watchpost", version, about, long_about = None)]
pub struct Cli {
    /// Path to the watchpost.toml configuration file.
    ///
    /// Without it, `./watchpost.toml` is used when present, else defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a plan against a target and wait for the result.
    Scan(ScanArgs),

    /// Inspect the plan catalog.
    Plans(PlansArgs),

    /// Inspect registered plugins.
    Plugins(PluginsArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- scan ----

/// Create a scan, start it and report its issues.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Target URL.
    pub target: String,

    /// Plan to run.
    #[arg(short, long, default_value = "basic")]
    pub plan: String,

    /// Extra scan configuration as key=value (dotted keys nest, values may be JSON).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,

    /// Tag recorded on the scan (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Owner recorded on the scan.
    #[arg(long)]
    pub owner: Option<String>,
}

// ---- plans ----

#[derive(Args, Debug)]
pub struct PlansArgs {
    #[command(subcommand)]
    pub action: PlansAction,
}

#[derive(Subcommand, Debug)]
pub enum PlansAction {
    /// List every plan.
    List,
    /// Show one plan with its resolved steps.
    Show {
        /// Plan name.
        name: String,
    },
}

// ---- plugins ----

#[derive(Args, Debug)]
pub struct PluginsArgs {
    #[command(subcommand)]
    pub action: PluginsAction,
}

#[derive(Subcommand, Debug)]
pub enum PluginsAction {
    /// List available plugins.
    List,
}

// ---- config ----

/// Manage watchpost configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, scheduler, http, plugins, plans, reports).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_scan_defaults() {
        let cli = Cli::try_parse_from(["watchpost", "scan", "https://example.com"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.target, "https://example.com");
                assert_eq!(args.plan, "basic");
                assert!(args.settings.is_empty());
                assert!(args.tags.is_empty());
                assert!(args.owner.is_none());
            }
            _ => panic!("expected Scan command"),
        }
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_parse_scan_with_options() {
        let cli = Cli::try_parse_from([
            "watchpost",
            "scan",
            "https://example.com",
            "--plan",
            "headers",
            "--set",
            "follow_redirects=false",
            "--set",
            "opts.depth=2",
            "--tag",
            "nightly",
            "--owner",
            "alice",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.plan, "headers");
                assert_eq!(args.settings, vec!["follow_redirects=false", "opts.depth=2"]);
                assert_eq!(args.tags, vec!["nightly"]);
                assert_eq!(args.owner.as_deref(), Some("alice"));
            }
            _ => panic!("expected Scan command"),
        }
    }

    #[test]
    fn test_cli_parse_scan_requires_target() {
        assert!(Cli::try_parse_from(["watchpost", "scan"]).is_err());
    }

    #[test]
    fn test_cli_parse_plans_show() {
        let cli = Cli::try_parse_from(["watchpost", "plans", "show", "basic"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Plans(args) => match args.action {
                PlansAction::Show { name } => assert_eq!(name, "basic"),
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Plans command"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "watchpost",
            "plugins",
            "list",
            "--output",
            "json",
            "--config",
            "/etc/watchpost.toml",
            "--log-level",
            "debug",
        ])
        .expect("parse succeeded");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/watchpost.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["watchpost", "config", "show", "--section", "scheduler"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(args) => match args.action {
                ConfigAction::Show { section } => {
                    assert_eq!(section.as_deref(), Some("scheduler"));
                }
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_output_format() {
        let result = Cli::try_parse_from(["watchpost", "plans", "list", "--output", "yaml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_command_is_well_formed() {
        Cli::command().debug_assert();
    }
}
