use anyhow::Context;
use clap::{Parser, Subcommand};
use component_accumulator::{ConfigFlags, base_job, job, materialize};
use std::path::{Path, PathBuf};

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "ca-tool")]
#[command(about = "Build and inspect component accumulator job configurations", long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the base job from a flags file and write it as JSON.
    Bootstrap {
        /// JSON flags file; nested objects become dotted flag names.
        #[arg(long)]
        flags: PathBuf,

        /// Flag override, `Name=value`. May be repeated.
        #[arg(long = "set")]
        set: Vec<String>,

        #[arg(short = 'o', long)]
        out: PathBuf,
    },
    /// Print a serialized job in readable form.
    Show {
        #[arg(long)]
        job: PathBuf,
    },
    /// Validate a serialized job.
    Check {
        #[arg(long)]
        job: PathBuf,
    },
    /// Dump every property as `component property value`.
    Props {
        #[arg(long)]
        job: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.cmd {
        Commands::Bootstrap { flags, set, out } => {
            // 1) Flags: file defaults, then command-line overrides, then freeze.
            let text = std::fs::read_to_string(&flags)
                .with_context(|| format!("reading flags file {}", flags.display()))?;
            let mut config_flags = ConfigFlags::from_json_str(&text)
                .with_context(|| format!("parsing flags file {}", flags.display()))?;
            for assignment in &set {
                config_flags
                    .fill_from_str(assignment)
                    .with_context(|| format!("applying --set {}", assignment))?;
            }
            config_flags.lock();

            // 2) Assemble and materialize.
            let mut acc = base_job(&config_flags).context("configuring base job")?;
            let job = materialize(&mut acc).context("materializing job")?;

            // 3) Write.
            job::write_to(&job, &out).with_context(|| format!("writing {}", out.display()))?;
            println!("Wrote {}", out.display());
        }
        Commands::Show { job } => {
            let config = load(&job)?;
            print!("{}", config);
        }
        Commands::Check { job } => {
            let config = load(&job)?;
            println!(
                "{}: ok ({} components, {} application properties)",
                job.display(),
                config.component_count(),
                config.app_properties.len()
            );
        }
        Commands::Props { job } => {
            let config = load(&job)?;
            for (component, property, value) in config.flatten_properties() {
                println!("{:40} {:30} {}", component, property, value);
            }
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<component_accumulator::JobConfiguration> {
    job::read_from(path).with_context(|| format!("loading job {}", path.display()))
}
