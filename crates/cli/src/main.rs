//! monorel command line.
//!
//! `monorel plan` computes which packages release at which versions and saves
//! the plan; `monorel apply` publishes, tags, pushes and records those
//! releases, resuming an interrupted run of the same plan.

// CLI binary needs to output to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod backends;
mod cli;
mod commands;
mod errors;
mod tracing;

use crate::cli::{Cli, Commands};
use crate::errors::{CliError, EXIT_CLI, EXIT_OK, exit_code_for};
use crate::tracing::TracingConfig;

fn main() {
    // NOTE: tracing may be unusable during a panic, so print directly.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
    };
    if let Err(e) = crate::tracing::init_tracing(&tracing_config) {
        eprintln!("{e:?}");
        std::process::exit(EXIT_CLI);
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            std::process::exit(EXIT_CLI);
        }
    };

    let code = match rt.block_on(run(cli)) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            let code = exit_code_for(&err);
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> errors::Result<()> {
    let root = cli.root.as_path();
    match cli.command {
        Commands::Plan(args) => {
            print!("{}", commands::plan::execute(root, &args, cli.json).await?);
        }
        Commands::Apply(args) => {
            let report = commands::apply::execute(root, &args).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", commands::apply::render_report(&report));
            }
            let unfinished = commands::apply::unfinished(&report);
            if unfinished > 0 {
                return Err(CliError::incomplete(report.workflow_id, unfinished));
            }
        }
        Commands::Audit(args) => {
            let violations = commands::audit::execute(root, &args).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&violations)?);
            } else {
                print!("{}", commands::audit::render_violations(&violations));
            }
            if !violations.is_empty() {
                return Err(CliError::violations(violations.len(), None));
            }
        }
        Commands::Status => {
            print!("{}", commands::status::execute(root, cli.json)?);
        }
    }
    Ok(())
}
