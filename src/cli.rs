//! Command-line interface for apm
//!
//! This module provides the CLI commands and argument parsing, plus the
//! [`CommandDriver`] that runs each command against a [`PackageManager`].

use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

use crate::error::ApmResult;
use crate::package::{Bundle, InstallOutcome, PackageId, PackageManager, Resolution};
use crate::tools::CommandChecker;

/// Content-addressed package manager
#[derive(Parser)]
#[command(name = "apm")]
#[command(about = "A content-addressed package manager for source packages")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Set the working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Registry directory (overrides configuration)
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a new project in the working directory
    Init {
        /// Project name
        name: String,
    },

    /// Resolve and install the project's dependencies
    Install {
        /// Use the recursive queue installer
        #[arg(long)]
        legacy: bool,
    },

    /// Remove installed dependencies
    Clean,

    /// Type check the project's root source
    Check,

    /// Pack the project's root source into a package file
    Pack {
        /// Output file or directory
        #[arg(default_value = ".")]
        destination: PathBuf,
    },

    /// Unpack a package file into a draft directory
    Unpack {
        /// Package file
        source: PathBuf,
    },

    /// Add a draft directory or package file to the registry
    Register {
        /// Draft directory or package file
        source: PathBuf,

        /// Expected package id
        id: Option<String>,
    },

    /// Show the name, id and dependencies of a draft or package
    Info {
        /// Draft directory or package file
        source: PathBuf,
    },

    /// Print the resolved dependency tree
    Tree,
}

/// CLI execution context
#[derive(Clone)]
pub struct CliContext {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Instant,
}

impl CliContext {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            start_time: Instant::now(),
        }
    }

    /// Print info message if not quiet
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    /// Print verbose message if verbose mode enabled
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{} {}", "verbose:".dimmed(), message.dimmed());
        }
    }

    /// Print warning message
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", "success:".green().bold(), message);
        }
    }

    /// Create a progress bar
    pub fn progress_bar(&self, len: u64, message: &str) -> Option<ProgressBar> {
        if self.quiet || len == 0 {
            return None;
        }

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .ok()?
            .progress_chars("#>-");
        let pb = ProgressBar::new(len);
        pb.set_style(style);
        pb.set_message(message.to_string());
        Some(pb)
    }

    /// Get elapsed time since CLI started
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

/// Runs CLI commands against a package manager
pub struct CommandDriver {
    context: CliContext,
    manager: PackageManager,
}

impl CommandDriver {
    pub fn new(context: CliContext, manager: PackageManager) -> Self {
        Self { context, manager }
    }

    pub fn manager(&self) -> &PackageManager {
        &self.manager
    }

    /// Dispatch a parsed command
    pub fn execute(&self, command: &Commands) -> ApmResult<()> {
        match command {
            Commands::Init { name } => self.init(name),
            Commands::Install { legacy } => self.install(*legacy),
            Commands::Clean => self.clean(),
            Commands::Check => self.check(),
            Commands::Pack { destination } => self.pack(destination),
            Commands::Unpack { source } => self.unpack(source),
            Commands::Register { source, id } => self.register(source, id.as_deref()),
            Commands::Info { source } => self.info(source),
            Commands::Tree => self.tree(),
        }
    }

    /// Execute init command
    pub fn init(&self, name: &str) -> ApmResult<()> {
        let project = self.manager.init_project(name)?;
        self.context.success(&format!(
            "Created project '{}' at {}",
            project.name(),
            project.cwd().display()
        ));
        Ok(())
    }

    /// Execute install command
    pub fn install(&self, legacy: bool) -> ApmResult<()> {
        let mut project = self.manager.project()?;
        let registry = self.manager.registry()?;
        self.context.verbose(&format!("Using registry {}", registry.root().display()));

        if legacy {
            let installed = project.install_legacy(&registry)?;
            for (name, id) in &installed {
                self.context.verbose(&format!("{} {}", name, id.short()));
            }
            self.context.success(&format!(
                "Installed {} packages in {:.2}s",
                installed.len(),
                self.context.elapsed().as_secs_f64()
            ));
            return Ok(());
        }

        let resolution = project.tree(&registry)?;
        let progress_bar = self
            .context
            .progress_bar(resolution.install_order().len() as u64, "Installing");

        let mut fresh = 0;
        project.install_resolution(&resolution, |event| {
            if let Some(pb) = &progress_bar {
                pb.set_message(event.name.clone());
                pb.inc(1);
            }
            match event.outcome {
                InstallOutcome::Installed => {
                    fresh += 1;
                    self.context.verbose(&format!("Installed {} {}", event.name, event.id.short()));
                }
                InstallOutcome::AlreadyPresent => {
                    self.context.verbose(&format!("Skipped {} (already present)", event.name));
                }
                InstallOutcome::Stale => {
                    self.context.warn(&format!(
                        "{} is installed but differs from {}; run `apm clean` to replace it",
                        event.name,
                        event.id.short()
                    ));
                }
            }
        })?;

        if let Some(pb) = &progress_bar {
            pb.finish_and_clear();
        }
        self.context.success(&format!(
            "Installed {} packages ({} pinned) in {:.2}s",
            fresh,
            resolution.pinned.len(),
            self.context.elapsed().as_secs_f64()
        ));
        Ok(())
    }

    /// Execute clean command
    pub fn clean(&self) -> ApmResult<()> {
        let mut project = self.manager.project()?;
        let removed = project.clean()?;
        for path in &removed {
            self.context.verbose(&format!("Removed {}", path.display()));
        }
        self.context.success(&format!("Removed {} entries", removed.len()));
        Ok(())
    }

    /// Execute check command
    pub fn check(&self) -> ApmResult<()> {
        let project = self.manager.project()?;
        let checker = CommandChecker::from_config(&self.manager.config().checker);
        let report = project.check(&checker)?;
        self.context.success(&format!("Checked {} files", report.checked()));
        Ok(())
    }

    /// Execute pack command
    pub fn pack(&self, destination: &std::path::Path) -> ApmResult<()> {
        let (package, path) = self.manager.pack_project(destination)?;
        self.context.success(&format!(
            "Packed {} {} into {}",
            package.name(),
            package.id(),
            path.display()
        ));
        Ok(())
    }

    /// Execute unpack command
    pub fn unpack(&self, source: &std::path::Path) -> ApmResult<()> {
        let draft = self.manager.unpack_file(source)?;
        self.context.success(&format!("Unpacked {} into {}", draft.name(), draft.dir().display()));
        Ok(())
    }

    /// Execute register command
    pub fn register(&self, source: &std::path::Path, id: Option<&str>) -> ApmResult<()> {
        let expected = id.map(PackageId::parse).transpose()?;
        let (package, path) = self.manager.register(source, expected.as_ref())?;
        self.context.verbose(&format!("Stored at {}", path.display()));
        self.context.success(&format!("Registered {} {}", package.name(), package.id()));
        Ok(())
    }

    /// Execute info command
    pub fn info(&self, source: &std::path::Path) -> ApmResult<()> {
        let bundle = self.manager.inspect(source)?;
        let manifest = bundle.manifest();

        match &bundle {
            Bundle::Draft(draft) => {
                self.context.info(&format!("{} {}", "draft:".bold(), manifest.name));
                self.context.info(&format!(
                    "files: {} primary, {} docs, {} other",
                    draft.source().primary_files().len(),
                    draft.source().doc_files().len(),
                    draft.source().misc_files().len()
                ));
            }
            Bundle::Package(package) => {
                self.context.info(&format!("{} {}", "package:".bold(), manifest.name));
                self.context.info(&format!("id: {}", package.id()));
                self.context.info(&format!("payload: {} bytes", package.payload().len()));
            }
        }

        if manifest.deps.is_empty() {
            self.context.info("dependencies: none");
        } else {
            self.context.info("dependencies:");
            for (name, id) in manifest.deps.iter() {
                self.context.info(&format!("  {} {}", name, id));
            }
        }
        Ok(())
    }

    /// Execute tree command
    pub fn tree(&self) -> ApmResult<()> {
        let project = self.manager.project()?;
        let registry = self.manager.registry()?;
        let resolution = project.tree(&registry)?;
        self.print_resolution(project.name(), &resolution);
        Ok(())
    }

    fn print_resolution(&self, name: &str, resolution: &Resolution) {
        if resolution.trees.is_empty() {
            self.context.info(&format!("{} has no dependencies", name));
            return;
        }
        for tree in &resolution.trees {
            self.context.info(tree.to_string().trim_end());
        }
        self.context.verbose(&format!("{} packages pinned", resolution.pinned.len()));
    }
}
