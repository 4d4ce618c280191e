use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vibeguard::cancel::CancelScope;
use vibeguard::config::{self, error::ConfigError};
use vibeguard::orchestrator::{self, Orchestrator, RunError};
use vibeguard::reporter;

#[derive(Parser)]
#[command(
    name = "vibeguard",
    about = "Declarative policy-enforcement runner: config-driven checks, dependency ordering, and violation reporting"
)]
#[allow(clippy::struct_excessive_bools)] // CLI flags are naturally booleans
struct Cli {
    /// Path to the config file (default: discover vibeguard.yaml/.yml/.vibeguard.yaml/.yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Abort the run on the first error-severity failure
    #[arg(long, global = true)]
    fail_fast: bool,

    /// Maximum number of checks to run concurrently within a level
    #[arg(long, global = true)]
    parallel: Option<usize>,

    /// Echo each check's captured stdout/stderr as it completes
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run only this check, bypassing the dependency graph
    #[arg(long, global = true)]
    check: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks (or the one named by --check). This is the default.
    Check,
    /// Emit a starter config. The project-inspector bootstrap this delegates
    /// to in a full release is out of scope here, so this prints a fixed
    /// two-check template rather than scanning the project.
    Init,
}

const DEFAULT_PARALLEL: usize = 4;
const DEFAULT_ERROR_EXIT_CODE: i32 = 1;

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_new("debug")
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))
    };
    if let Ok(filter) = filter {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let exit_code = match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => cmd_check(
            cli.config.as_deref(),
            cli.fail_fast,
            cli.parallel,
            cli.verbose,
            cli.check.as_deref(),
        ),
        Commands::Init => cmd_init(cli.config.as_deref()),
    };
    std::process::exit(exit_code);
}

fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow::anyhow!("failed to start async runtime: {e}"))
}

/// Resolve the config path: the explicit `--config` flag, or the first of
/// `config::SEARCH_NAMES` found in the current directory — spec.md §4.1/§6.
fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    config::discover(&cwd).ok_or_else(|| ConfigError::NotFound {
        file: cwd.join(config::SEARCH_NAMES[0]),
    })
}

fn cmd_check(
    config_path: Option<&Path>,
    fail_fast: bool,
    parallel: Option<usize>,
    verbose: bool,
    single_check: Option<&str>,
) -> i32 {
    let path = match resolve_config_path(config_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("vibeguard: {e}");
            return ConfigError::exit_code();
        }
    };

    let cfg = match config::load(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("vibeguard: {e}");
            return ConfigError::exit_code();
        }
    };

    let orchestrator = Orchestrator::new(
        cfg,
        parallel.unwrap_or(DEFAULT_PARALLEL),
        fail_fast,
        DEFAULT_ERROR_EXIT_CODE,
    )
    .with_log_dir(PathBuf::from(orchestrator::DEFAULT_LOG_DIR));

    // Building the runtime isn't part of the typed ConfigError/ExecutionError
    // taxonomy — it's the kind of truly unexpected I/O failure `anyhow`
    // is for at this boundary (see DESIGN.md).
    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("vibeguard: {e:#}");
            return ConfigError::exit_code();
        }
    };

    let result = runtime.block_on(async {
        let root = CancelScope::root();
        let ctrl_c_scope = root.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c_scope.cancel();
            }
        });

        match single_check {
            Some(id) => orchestrator.run_check(id).await,
            None => orchestrator.run_with_scope(root).await,
        }
    });

    match result {
        Ok(run) => {
            reporter::render(&run, verbose);
            run.exit_code
        }
        Err(RunError::Config(e)) => {
            eprintln!("vibeguard: {e}");
            ConfigError::exit_code()
        }
        Err(e @ RunError::Spawn(..)) => {
            eprintln!("vibeguard: {e}");
            DEFAULT_ERROR_EXIT_CODE
        }
    }
}

const STARTER_CONFIG: &str = r#"version: "1"

vars:
  coverage_threshold: "80"

checks:
  - id: readme_exists
    run: test -f README.md
    severity: error
    suggestion: "Add a README.md describing the project."

  - id: tests_pass
    run: echo "replace with your test command"
    requires: [readme_exists]
    severity: error
    suggestion: "Make the test suite pass before merging."
"#;

/// The inspector subsystem (language detection, tool scanning) that would
/// normally generate this file from the project's actual layout is out of
/// scope for the core engine — this prints a fixed two-check starter instead.
fn cmd_init(config_path: Option<&Path>) -> i32 {
    let path = config_path.map_or_else(|| PathBuf::from(config::SEARCH_NAMES[0]), Path::to_path_buf);
    if path.exists() {
        eprintln!("vibeguard: {} already exists, not overwriting", path.display());
        return DEFAULT_ERROR_EXIT_CODE;
    }
    match std::fs::write(&path, STARTER_CONFIG) {
        Ok(()) => {
            eprintln!("vibeguard: wrote starter config to {}", path.display());
            eprintln!(
                "vibeguard: this is a fixed template, not a project scan — edit it to describe your project's checks"
            );
            0
        }
        Err(e) => {
            eprintln!("vibeguard: failed to write {}: {e}", path.display());
            ConfigError::exit_code()
        }
    }
}
