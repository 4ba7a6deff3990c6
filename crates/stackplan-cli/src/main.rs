mod commands;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use commands::{exit_code_for, manifest_dir};
use stackplan_core::{Engine, EngineConfig, ExposureMode};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "stackplan",
    version,
    about = "Validate a service manifest and generate compose and proxy configuration"
)]
struct Cli {
    /// Path to the service manifest (.json or .toml).
    #[arg(short, long, default_value = "services.json", global = true)]
    manifest: PathBuf,

    /// Engine config file (default: stackplan.toml next to the manifest).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Treat dependencies outside the plan as errors.
    #[arg(long, default_value_t = false, global = true)]
    strict_deps: bool,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Args)]
struct Target {
    /// Deployment profile to resolve ("all" selects every enabled service).
    #[arg(short, long, default_value = "cpu")]
    profile: String,
    /// Network exposure mode: private or public.
    #[arg(short, long, default_value = "private")]
    exposure: ExposureMode,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a starter manifest from a built-in template.
    Init {
        /// Template name.
        #[arg(long, default_value = "local-ai")]
        template: String,
        /// Overwrite an existing manifest.
        #[arg(long, default_value_t = false)]
        force: bool,
        /// List available templates and exit.
        #[arg(long, default_value_t = false)]
        list: bool,
    },
    /// Check the manifest and report diagnostics.
    Validate {
        /// Validate a single profile instead of every defined one.
        #[arg(short, long)]
        profile: Option<String>,
    },
    /// Show the services active for a profile.
    Resolve {
        /// Deployment profile to resolve.
        #[arg(short, long, default_value = "cpu")]
        profile: String,
    },
    /// Show the host bindings published for a profile and exposure mode.
    Plan {
        #[command(flatten)]
        target: Target,
    },
    /// Run the full pipeline and print the artifacts without writing them.
    DryRun {
        #[command(flatten)]
        target: Target,
        /// Print only diagnostics and the fingerprint.
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// Run the full pipeline and write the artifacts.
    Generate {
        #[command(flatten)]
        target: Target,
        /// Output directory (default: the manifest's directory).
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// List services grouped by category.
    List,
    /// List profiles and the services they resolve to.
    Profiles,
    /// Summarize a plan: services by category and access URLs.
    Summary {
        #[command(flatten)]
        target: Target,
    },
    /// Enable services.
    Enable {
        #[arg(required = true)]
        services: Vec<String>,
    },
    /// Disable services.
    Disable {
        #[arg(required = true)]
        services: Vec<String>,
    },
    /// Flip the enabled flag of services.
    Toggle {
        #[arg(required = true)]
        services: Vec<String>,
    },
    /// Change the host address or port of a service binding.
    SetPort {
        /// Service name.
        service: String,
        /// Binding number as listed by `list` (starting at 1).
        #[arg(long, default_value_t = 1)]
        index: usize,
        /// New host port.
        #[arg(long)]
        host_port: Option<u16>,
        /// New host address, or ${default_host_ip} to inherit the global default.
        #[arg(long)]
        host_ip: Option<String>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<EngineConfig, String> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::load_or_default(&manifest_dir(&cli.manifest)),
    }
    .map_err(|e| e.to_string())?;
    Ok(if cli.strict_deps {
        config.with_strict_dependencies()
    } else {
        config
    })
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("STACKPLAN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(&cli).and_then(|config| run(&cli, &Engine::new(config)));

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn run(cli: &Cli, engine: &Engine) -> Result<u8, String> {
    let manifest = cli.manifest.as_path();
    let json = cli.json;
    match &cli.command {
        Commands::Init {
            template,
            force,
            list,
        } => commands::init::run(manifest, template, *force, *list, json),
        Commands::Validate { profile } => {
            commands::validate::run(engine, manifest, profile.as_deref(), json)
        }
        Commands::Resolve { profile } => commands::resolve::run(engine, manifest, profile, json),
        Commands::Plan { target } => {
            commands::plan::run(engine, manifest, &target.profile, target.exposure, json)
        }
        Commands::DryRun { target, quiet } => commands::dry_run::run(
            engine,
            manifest,
            &target.profile,
            target.exposure,
            *quiet,
            json,
        ),
        Commands::Generate { target, out_dir } => {
            let dir = out_dir.clone().unwrap_or_else(|| manifest_dir(manifest));
            commands::generate::run(engine, manifest, &target.profile, target.exposure, &dir, json)
        }
        Commands::List => commands::list::run(engine, manifest, json),
        Commands::Profiles => commands::profiles::run(engine, manifest, json),
        Commands::Summary { target } => {
            commands::summary::run(engine, manifest, &target.profile, target.exposure, json)
        }
        Commands::Enable { services } => {
            commands::edit::set_enabled(engine, manifest, services, Some(true), json)
        }
        Commands::Disable { services } => {
            commands::edit::set_enabled(engine, manifest, services, Some(false), json)
        }
        Commands::Toggle { services } => {
            commands::edit::set_enabled(engine, manifest, services, None, json)
        }
        Commands::SetPort {
            service,
            index,
            host_port,
            host_ip,
        } => commands::edit::set_port(
            engine,
            manifest,
            service,
            *index,
            host_ip.as_deref(),
            *host_port,
            json,
        ),
        Commands::Completions { shell } => commands::completions::run::<Cli>(*shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(dir),
    }
}
