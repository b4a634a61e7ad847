use clap::{Args, Parser, Subcommand};

use crate::config::{CliOverrides, OutputFormat, DEFAULT_PROFILE, RUN_MAX_WORKERS};

#[derive(Parser)]
#[command(name = "kosty", version, about = "Cost and security audits for AWS accounts and organizations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators and non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file (default: ./kosty.yaml, then ~/.kosty/config.yaml)
    #[arg(long, global = true)]
    pub config_file: Option<String>,

    /// Configuration profile
    #[arg(long, global = true, default_value = DEFAULT_PROFILE)]
    pub profile: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one operation of one service
    Run(RunArgs),
    /// Run the full audit of every registered service
    All(ScopeArgs),
    /// List services and their operations
    List,
    /// Validate the configuration
    Validate,
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Service name (e.g. eip, sg)
    pub service: String,

    /// Operation name (audit, cost_audit, security_audit or a check name)
    pub operation: String,

    /// Operation parameter, repeatable
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    #[command(flatten)]
    pub scope: ScopeArgs,
}

impl RunArgs {
    /// Scope flags plus the higher concurrency default of service commands.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            default_max_workers: Some(RUN_MAX_WORKERS),
            ..self.scope.overrides()
        }
    }
}

/// Scope and output flags shared by `run` and `all`.
#[derive(Args, Clone, Default)]
pub struct ScopeArgs {
    /// Scan every active account of the organization
    #[arg(long)]
    pub organization: bool,

    /// Single region
    #[arg(long, conflicts_with = "regions")]
    pub region: Option<String>,

    /// Comma-separated regions
    #[arg(long, value_delimiter = ',')]
    pub regions: Option<Vec<String>>,

    /// Maximum accounts processed concurrently
    #[arg(long)]
    pub max_workers: Option<i64>,

    /// Role assumed in each member account
    #[arg(long)]
    pub cross_account_role: Option<String>,

    /// Account to list the organization from
    #[arg(long)]
    pub org_admin_account_id: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Directory for JSON and CSV reports
    #[arg(long)]
    pub output_dir: Option<String>,
}

impl ScopeArgs {
    pub fn overrides(&self) -> CliOverrides {
        let regions = match (&self.region, &self.regions) {
            (Some(region), _) => Some(vec![region.clone()]),
            (None, Some(regions)) => Some(
                regions
                    .iter()
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect(),
            ),
            (None, None) => None,
        };
        CliOverrides {
            // The flag can only switch organization mode on.
            organization: self.organization.then_some(true),
            regions,
            max_workers: self.max_workers,
            default_max_workers: None,
            output: self.output,
            cross_account_role: self.cross_account_role.clone(),
            org_admin_account_id: self.org_admin_account_id.clone(),
            save_to: self.output_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::parse_from([
            "kosty",
            "run",
            "eip",
            "check-unattached-eips",
            "--organization",
            "--regions",
            "us-east-1,eu-west-1",
            "--max-workers",
            "10",
            "--param",
            "days=14",
            "--output",
            "json",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.service, "eip");
        assert_eq!(args.params, vec!["days=14"]);

        let overrides = args.scope.overrides();
        assert_eq!(overrides.organization, Some(true));
        assert_eq!(overrides.regions, Some(vec!["us-east-1".to_string(), "eu-west-1".to_string()]));
        assert_eq!(overrides.max_workers, Some(10));
        assert_eq!(overrides.output, Some(OutputFormat::Json));
    }

    #[test]
    fn test_run_defaults_to_ten_workers_all_to_five() {
        let Commands::Run(args) = Cli::parse_from(["kosty", "run", "eip", "audit"]).command else {
            panic!("expected run");
        };
        let settings = Settings::default().with_overrides(&args.overrides());
        assert_eq!(settings.max_workers, 10);

        let Commands::All(scope) = Cli::parse_from(["kosty", "all"]).command else {
            panic!("expected all");
        };
        let settings = Settings::default().with_overrides(&scope.overrides());
        assert_eq!(settings.max_workers, 5);

        let Commands::Run(args) = Cli::parse_from(["kosty", "run", "eip", "audit", "--max-workers", "3"]).command
        else {
            panic!("expected run");
        };
        assert_eq!(Settings::default().with_overrides(&args.overrides()).max_workers, 3);
    }

    #[test]
    fn test_unset_flags_do_not_override() {
        let overrides = ScopeArgs::default().overrides();
        assert_eq!(overrides.organization, None);
        assert_eq!(overrides.regions, None);
        assert_eq!(overrides.output, None);
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["kosty", "list", "-vv", "--no-color", "--profile", "prod"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_color);
        assert_eq!(cli.profile, "prod");
        assert!(matches!(cli.command, Commands::List));
    }
}
