//! apm command-line entry point

use anyhow::Context;
use clap::Parser;
use std::process;

use apm::cli::{Cli, CliContext, CommandDriver};
use apm::logging::register_console_tracer;
use apm::package::{Config, PackageManager, Project};

fn main() {
    let cli = Cli::parse();
    let context = CliContext::new(cli.verbose, cli.quiet);

    if let Err(e) = register_console_tracer(cli.verbose) {
        context.warn(&format!("{:#}", e));
    }

    if let Err(e) = run(&cli, &context) {
        context.error(&format!("{:#}", e));
        process::exit(1);
    }
}

fn run(cli: &Cli, context: &CliContext) -> anyhow::Result<()> {
    let cwd = match &cli.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to read the current directory")?,
    };

    let project_root = Project::find_project_root(&cwd);
    let mut config = Config::load(project_root.as_deref())?;
    if let Some(registry) = &cli.registry {
        config.registry = registry.clone();
    }

    let driver = CommandDriver::new(context.clone(), PackageManager::new(&cwd, config));
    driver.execute(&cli.command)?;
    Ok(())
}
