use clap::{Parser, Subcommand};
use favicon_stage::config::{self, StageConfig};
use favicon_stage::output;
use favicon_stage::pipeline::{self, Interrupt, PipelineError, PipelineSettings};
use favicon_stage::tools::CommandTool;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Exit status of a run stopped by Ctrl-C (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "favicon-stage")]
#[command(about = "Inject favicon markup into a generated static site")]
#[command(long_about = "\
Inject favicon markup into a generated static site

Run after the site generator. favicon-stage generates the favicon bundle once,
then rewrites every page of the site to reference it. Pages are copied to a
scratch workspace, injected there, and only pages that actually changed are
merged back into the site.

Project layout (defaults):

  project/
  ├── favicon.toml                 # Optional config (see gen-config)
  ├── favicon.png                  # Master picture
  ├── favicon-settings.json        # Generator settings
  └── public/                      # Generated site
      ├── favicon/                 # Bundle output (assets + favicon-data.json)
      ├── index.html
      └── blog/
          └── index.html

Logging goes to stderr; set RUST_LOG=debug for staging and merge decisions.

Run 'favicon-stage gen-config' to generate a documented favicon.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project directory (holds favicon.toml and the site root)
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Config file to use instead of <project>/favicon.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Generate the bundle and inject every page (default)
    Build,
    /// List the directories a build would inject and skip, without running tools
    Check,
    /// Print a stock favicon.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            match e.downcast_ref::<PipelineError>() {
                Some(PipelineError::Interrupted { .. }) => ExitCode::from(EXIT_INTERRUPTED),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command.unwrap_or(Command::Build) {
        Command::Build => {
            let config = load_config(cli)?;
            build(&config, &cli.project)
        }
        Command::Check => {
            let config = load_config(cli)?;
            let settings = PipelineSettings::from_config(&config, &cli.project);
            println!("==> Checking {}", settings.site_root.display());
            let scan = pipeline::check(&settings)?;
            output::print_check_output(&scan, &display_root(&settings.site_root));
            Ok(())
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<StageConfig, config::ConfigError> {
    match &cli.config {
        Some(path) => config::load_config_file(path),
        None => config::load_config(&cli.project),
    }
}

fn build(config: &StageConfig, project: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let settings = PipelineSettings::from_config(config, project);
    let generator = CommandTool::from_config(&config.generator, project);
    let injector = CommandTool::from_config(&config.injector, project);

    let interrupt = Interrupt::new();
    let handler_flag = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.trigger()) {
        warn!(error = %e, "failed to install signal handler");
    }

    println!("==> Injecting favicon into {}", settings.site_root.display());
    let site_root = display_root(&settings.site_root);
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_event(&event, &site_root) {
                println!("{}", line);
            }
        }
    });

    let result = pipeline::run(&settings, &generator, &injector, &interrupt, Some(tx));
    let _ = printer.join();

    let summary = result?;
    output::print_summary(&summary);
    Ok(())
}

/// Site root as the pipeline will report it (canonical when it exists).
fn display_root(site_root: &Path) -> PathBuf {
    site_root
        .canonicalize()
        .unwrap_or_else(|_| site_root.to_path_buf())
}
