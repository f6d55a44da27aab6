/// Version injected at compile time via RESBIND_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("RESBIND_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resbind::config::{Config, OutputFormat};
use resbind::program::Program;
use resbind::{Namespace, NamedResourceDescriptor, SchemaRegistry};
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;

/// Validate and bind declarative cloud resources
#[derive(Parser, Debug)]
#[command(name = "resbind", version = VERSION, about, long_about = None)]
struct Args {
    /// Extra provider definition file (repeatable)
    #[arg(short, long = "schema", global = true)]
    schemas: Vec<PathBuf>,

    /// Log level for debugging (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "off", global = true)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List known resource types
    Types,
    /// Show the schema of one resource type
    Schema {
        /// Resource type id, e.g. azure:search:Service
        type_id: String,
    },
    /// Report every problem in a program
    Check {
        /// Program file (YAML, or JSON with a .json extension)
        file: PathBuf,
    },
    /// Bind a program and print the resulting descriptors
    Bind {
        /// Program file (YAML, or JSON with a .json extension)
        file: PathBuf,
        /// Output format (defaults to the configured one)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Inspect or change the persistent configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Load a provider definition file on every run
    AddSchema { path: PathBuf },
}

/// Log to a file under the config dir; nothing is installed when `level` is off
fn setup_logging(level: LevelFilter) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    if level == LevelFilter::OFF {
        return Ok(None);
    }

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("resbind")
        .join("resbind.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("resbind {} logging at {} to {:?}", VERSION, level, log_path);

    Ok(Some(guard))
}

/// Built-in schemas, then configured files, then `--schema` files
fn build_registry(config: &Config, extra: &[PathBuf]) -> Result<SchemaRegistry> {
    let mut registry = SchemaRegistry::empty();
    registry.extend(SchemaRegistry::builtin());

    for path in config.schema_paths.iter().chain(extra) {
        registry
            .load_file(path)
            .with_context(|| format!("Failed to load provider definition {:?}", path))?;
    }

    Ok(registry)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let mut config = Config::load();

    match args.command {
        Command::Types => {
            let registry = build_registry(&config, &args.schemas)?;
            for type_id in registry.type_ids() {
                println!("{}", type_id);
            }
        }
        Command::Schema { type_id } => {
            let registry = build_registry(&config, &args.schemas)?;
            let schema = registry
                .get(&type_id)
                .ok_or_else(|| anyhow::anyhow!("Unknown resource type: {}", type_id))?;
            println!("{}", serde_json::to_string_pretty(schema)?);
        }
        Command::Check { file } => {
            let registry = build_registry(&config, &args.schemas)?;
            run_check(&registry, &file)?;
        }
        Command::Bind { file, format } => {
            let registry = build_registry(&config, &args.schemas)?;
            let format = config.effective_output_format(format);
            run_bind(&registry, &file, format)?;
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::AddSchema { path } => {
                // Fail early rather than persisting a broken definition
                SchemaRegistry::empty()
                    .load_file(&path)
                    .with_context(|| format!("Failed to load provider definition {:?}", path))?;
                let path = std::fs::canonicalize(&path).unwrap_or(path);
                if config.add_schema_path(path.clone()) {
                    config.save()?;
                    println!("Added {}", path.display());
                } else {
                    println!("Already configured: {}", path.display());
                }
            }
        },
    }

    Ok(())
}

fn run_check(registry: &SchemaRegistry, file: &Path) -> Result<()> {
    let program = Program::load(file)?;
    let diagnostics = program.check(registry);

    for diagnostic in &diagnostics {
        eprintln!("{}", diagnostic);
    }

    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    if errors > 0 {
        return Err(anyhow::anyhow!("{} error(s) in {}", errors, file.display()));
    }

    println!("{}: {} resources OK", file.display(), program.resources.len());
    Ok(())
}

fn run_bind(registry: &SchemaRegistry, file: &Path, format: OutputFormat) -> Result<()> {
    let program = Program::load(file)?;
    let mut namespace = Namespace::new();
    program.bind(registry, &mut namespace)?;

    let descriptors: Vec<NamedResourceDescriptor> = namespace.into_descriptors();
    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&descriptors)?,
        OutputFormat::Yaml => serde_yaml::to_string(&descriptors)?,
    };
    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_defaults_off() {
        let args = Args::try_parse_from(["resbind", "types"]).unwrap();
        assert_eq!(args.log_level, LevelFilter::OFF);
    }

    #[test]
    fn test_log_level_parsed_after_subcommand() {
        let args = Args::try_parse_from(["resbind", "check", "infra.yaml", "--log-level", "debug"])
            .unwrap();
        assert_eq!(args.log_level, LevelFilter::DEBUG);
        assert!(matches!(args.command, Command::Check { .. }));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        assert!(Args::try_parse_from(["resbind", "--log-level", "loud", "types"]).is_err());
    }
}
