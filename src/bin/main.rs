//! sp - compile a semantic layer to LookML
//!
//! Usage:
//!   sp compile <inputs...> [--out <dir>] [--config <file>] [--dialect <dialect>]
//!              [--pop-strategy <strategy>] [--lenient] [--json]
//!   sp validate <inputs...> [--config <file>] [--lenient]
//!
//! Examples:
//!   sp compile semantic/ --out lookml/generated
//!   sp compile models.yml metrics.yml --dialect snowflake --pop-strategy dynamic
//!   sp validate semantic/

use clap::{Parser, Subcommand, ValueEnum};
use semantic_patterns::config::Settings;
use semantic_patterns::emitter::PopStrategy;
use semantic_patterns::generate::{compile, CompileError, CompileOutput, GeneratorOptions};
use semantic_patterns::loader::{self, Declaration};
use semantic_patterns::lowering;
use semantic_patterns::sql::Dialect;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sp")]
#[command(about = "semantic-patterns - compile a semantic layer into LookML views and explores")]
#[command(version)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile declarations to LookML files
    Compile {
        /// YAML/JSON files or directories (defaults to `[input] paths` of the config)
        inputs: Vec<PathBuf>,

        /// Output directory (defaults to `[output] dir` of the config, then `lookml`)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Settings file (defaults to $SP_CONFIG, ./sp.toml, then the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Target SQL dialect
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Period-over-period strategy
        #[arg(long)]
        pop_strategy: Option<StrategyArg>,

        /// Skip failing declarations instead of failing the run
        #[arg(long)]
        lenient: bool,

        /// Print the generated files as a JSON object instead of writing them
        #[arg(long)]
        json: bool,
    },

    /// Check declarations without generating anything
    Validate {
        /// YAML/JSON files or directories
        inputs: Vec<PathBuf>,

        /// Settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report dropped declarations as warnings
        #[arg(long)]
        lenient: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Postgres,
    Mysql,
    Tsql,
    Duckdb,
    Bigquery,
    Snowflake,
    Databricks,
    Redshift,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Tsql => Dialect::TSql,
            DialectArg::Duckdb => Dialect::DuckDb,
            DialectArg::Bigquery => Dialect::BigQuery,
            DialectArg::Snowflake => Dialect::Snowflake,
            DialectArg::Databricks => Dialect::Databricks,
            DialectArg::Redshift => Dialect::Redshift,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum StrategyArg {
    /// One period_over_period field per comparison
    Static,
    /// Prior/change fields driven by the explore calendar
    Dynamic,
}

impl From<StrategyArg> for PopStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Static => PopStrategy::Static,
            StrategyArg::Dynamic => PopStrategy::Dynamic,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compile {
            inputs,
            out,
            config,
            dialect,
            pop_strategy,
            lenient,
            json,
        } => {
            let Some(settings) = load_settings(config.as_deref()) else {
                return ExitCode::FAILURE;
            };
            let mut options = settings.generator.clone();
            if let Some(dialect) = dialect {
                options.dialect = dialect.into();
            }
            if let Some(strategy) = pop_strategy {
                options.pop_strategy = strategy.into();
            }
            options.lenient |= lenient;
            let out = out
                .or_else(|| settings.output.dir.as_ref().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("lookml"));
            let inputs = resolve_inputs(inputs, &settings);
            cmd_compile(&inputs, &out, &options, json)
        }
        Commands::Validate {
            inputs,
            config,
            lenient,
        } => {
            let Some(settings) = load_settings(config.as_deref()) else {
                return ExitCode::FAILURE;
            };
            let mut options = settings.generator.clone();
            options.lenient |= lenient;
            let inputs = resolve_inputs(inputs, &settings);
            cmd_validate(&inputs, &options)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&Path>) -> Option<Settings> {
    let result = match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    match result {
        Ok(settings) => Some(settings),
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            None
        }
    }
}

fn resolve_inputs(inputs: Vec<PathBuf>, settings: &Settings) -> Vec<PathBuf> {
    if inputs.is_empty() {
        settings.input.paths.iter().map(PathBuf::from).collect()
    } else {
        inputs
    }
}

fn load_declarations(inputs: &[PathBuf]) -> Option<Vec<Declaration>> {
    if inputs.is_empty() {
        eprintln!("Error: no input files (pass paths or set [input] paths in sp.toml)");
        return None;
    }
    match loader::load_many(inputs) {
        Ok(declarations) => Some(declarations),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn report_errors(error: &CompileError) {
    eprintln!("Error: {}", error);
    for message in error.messages() {
        eprintln!("  - {}", message);
    }
}

fn report_warnings(output: &CompileOutput) {
    for warning in &output.warnings {
        eprintln!("Warning: skipped: {}", warning);
    }
}

fn cmd_compile(inputs: &[PathBuf], out: &Path, options: &GeneratorOptions, json: bool) -> ExitCode {
    let Some(declarations) = load_declarations(inputs) else {
        return ExitCode::FAILURE;
    };

    let output = match compile(&declarations, options) {
        Ok(output) => output,
        Err(e) => {
            report_errors(&e);
            return ExitCode::FAILURE;
        }
    };
    report_warnings(&output);

    if json {
        return match serde_json::to_string_pretty(&output.files) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    for (path, content) in output.files.iter() {
        let target = out.join(path);
        let written = target
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&target, content));
        if let Err(e) = written {
            eprintln!("Error writing '{}': {}", target.display(), e);
            return ExitCode::FAILURE;
        }
    }

    println!(
        "Wrote {} files to {} (fingerprint {})",
        output.files.len(),
        out.display(),
        &output.files.fingerprint()[..12]
    );
    ExitCode::SUCCESS
}

fn cmd_validate(inputs: &[PathBuf], options: &GeneratorOptions) -> ExitCode {
    let Some(declarations) = load_declarations(inputs) else {
        return ExitCode::FAILURE;
    };

    let build_options = options.build_options();
    if options.lenient {
        let result = lowering::lower_lenient(&declarations, &build_options);
        for error in &result.errors {
            eprintln!("Warning: skipped: {}", error);
        }
        println!(
            "Valid: {} semantic models, {} explores ({} skipped)",
            result.output.models.len(),
            result.output.explores.len(),
            result.errors.len()
        );
        return ExitCode::SUCCESS;
    }

    match lowering::lower(&declarations, &build_options) {
        Ok(output) => {
            println!(
                "Valid: {} semantic models, {} metrics, {} explores",
                output.models.len(),
                output.models.metrics().count(),
                output.explores.len()
            );
            ExitCode::SUCCESS
        }
        Err(errors) => {
            report_errors(&CompileError::Build(errors));
            ExitCode::FAILURE
        }
    }
}
