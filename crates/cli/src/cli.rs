use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand, ValueEnum};
use monorel_release::Lifecycle;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "monorel")]
#[command(about = "Plan and apply versioned releases of the packages in a monorepo")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(long, global = true, help = "Print machine-readable JSON output")]
    pub json: bool,

    #[arg(
        long,
        short = 'C',
        global = true,
        help = "Repository root",
        default_value = ".",
        env = "MONOREL_ROOT"
    )]
    pub root: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Compute the release plan and write it to the plan file")]
    Plan(PlanArgs),
    #[command(about = "Execute the saved plan, resuming any earlier run")]
    Apply(ApplyArgs),
    #[command(about = "Check existing tags for versions that go backwards in history")]
    Audit(AuditArgs),
    #[command(about = "Show the recorded state of the saved plan's workflow")]
    Status,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    #[arg(long, value_enum, default_value = "stable", help = "Release lifecycle")]
    pub lifecycle: LifecycleArg,

    #[arg(
        long = "package",
        short = 'p',
        help = "Restrict the plan to these packages (repeatable)"
    )]
    pub packages: Vec<String>,

    #[arg(
        long,
        help = "Pull request number for the pr lifecycle (detected from CI variables if omitted)"
    )]
    pub pr: Option<u64>,

    #[arg(long, help = "Write the plan even if it breaks version monotonicity")]
    pub allow_violations: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ApplyArgs {
    #[arg(long, help = "Log every step without publishing, tagging or pushing")]
    pub dry_run: bool,

    #[arg(long, help = "Maximum concurrent steps (overrides workflow.max_parallel)")]
    pub max_parallel: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AuditArgs {
    #[arg(
        long = "package",
        short = 'p',
        help = "Audit only these packages (repeatable)"
    )]
    pub packages: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleArg {
    #[default]
    Stable,
    Preview,
    Pr,
}

impl From<LifecycleArg> for Lifecycle {
    fn from(arg: LifecycleArg) -> Self {
        match arg {
            LifecycleArg::Stable => Self::Stable,
            LifecycleArg::Preview => Self::Preview,
            LifecycleArg::Pr => Self::Pr,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["monorel", "status"]).unwrap();

        assert_eq!(cli.level, LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Compact);
        assert!(!cli.json);
        assert_eq!(cli.root, PathBuf::from("."));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_plan_arguments() {
        let cli = Cli::try_parse_from([
            "monorel",
            "plan",
            "--lifecycle",
            "pr",
            "--package",
            "core",
            "-p",
            "cli",
            "--pr",
            "42",
        ])
        .unwrap();

        let Commands::Plan(args) = cli.command else {
            panic!("Expected plan command");
        };
        assert_eq!(Lifecycle::from(args.lifecycle), Lifecycle::Pr);
        assert_eq!(args.packages, vec!["core".to_string(), "cli".to_string()]);
        assert_eq!(args.pr, Some(42));
        assert!(!args.allow_violations);
    }

    #[test]
    fn test_plan_defaults_to_stable() {
        let cli = Cli::try_parse_from(["monorel", "plan"]).unwrap();
        let Commands::Plan(args) = cli.command else {
            panic!("Expected plan command");
        };
        assert_eq!(args.lifecycle, LifecycleArg::Stable);
        assert!(args.packages.is_empty());
    }

    #[test]
    fn test_apply_arguments() {
        let cli =
            Cli::try_parse_from(["monorel", "apply", "--dry-run", "--max-parallel", "2"]).unwrap();
        let Commands::Apply(args) = cli.command else {
            panic!("Expected apply command");
        };
        assert!(args.dry_run);
        assert_eq!(args.max_parallel, Some(2));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "monorel",
            "audit",
            "--level",
            "debug",
            "--log-format",
            "json",
            "--json",
            "-C",
            "/tmp/repo",
        ])
        .unwrap();
        assert_eq!(cli.level, LogLevel::Debug);
        assert_eq!(cli.log_format, TracingFormat::Json);
        assert!(cli.json);
        assert_eq!(cli.root, PathBuf::from("/tmp/repo"));
    }

    #[test]
    fn test_invalid_lifecycle() {
        let result = Cli::try_parse_from(["monorel", "plan", "--lifecycle", "beta"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_subcommand() {
        let result = Cli::try_parse_from(["monorel"]);
        assert!(result.is_err());
    }
}
