use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use quill_compiler::sample::sample_sources;
use quill_compiler::{ConsoleLogger, Pipeline, PipelineConfig, PipelineReport, RunStatus};
use quill_types::{Diagnostic, Severity, SourceMap};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(about = "Compile Quill programs to WebAssembly in memory and run them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile and run source files
    Run {
        /// Source files, compiled in the given order
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        options: Options,
    },

    /// Print the generated WAT artifacts without compiling further
    Emit {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        options: Options,
    },

    /// Run the built-in sample program
    Sample {
        #[command(flatten)]
        options: Options,
    },
}

#[derive(Args, Debug, Default)]
struct Options {
    /// TOML configuration file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Compile as a library: entry points are ignored, nothing is invoked
    #[arg(long)]
    library: bool,
    /// Name of the binary module
    #[arg(long, value_name = "NAME")]
    name: Option<String>,
    /// Front-end reference (repeatable)
    #[arg(long = "ref", value_name = "REFERENCE")]
    references: Vec<String>,
    /// Additional back-end reference (repeatable)
    #[arg(long = "backend-ref", value_name = "REFERENCE")]
    backend_references: Vec<String>,
    /// Least severe diagnostic to print
    #[arg(long, value_enum)]
    verbosity: Option<Verbosity>,
    /// Suppress a diagnostic code, e.g. 4005 (repeatable; never hides errors)
    #[arg(long = "no-warn", value_name = "CODE")]
    no_warn: Vec<u16>,
    /// Fuel available to the entry point
    #[arg(long, value_name = "N")]
    fuel: Option<u64>,
    /// Seed of the RandomInt generator
    #[arg(long, value_name = "N")]
    seed: Option<u64>,
    /// Invoke the `_start` command driver instead of the entry shim
    #[arg(long)]
    command: bool,
    /// Write the binary module to this path
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Print the pipeline report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Verbosity {
    Error,
    Warning,
    Info,
    Hint,
}

impl From<Verbosity> for Severity {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Error => Severity::Error,
            Verbosity::Warning => Severity::Warning,
            Verbosity::Info => Severity::Info,
            Verbosity::Hint => Severity::Hint,
        }
    }
}

impl Options {
    /// The configuration file (or defaults) with the flags applied on top.
    fn pipeline_config(&self) -> Result<PipelineConfig, String> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path).map_err(|e| e.to_string())?,
            None => PipelineConfig::default(),
        };
        if self.library {
            config.is_executable = false;
        }
        if let Some(name) = &self.name {
            config.assembly_name = name.clone();
        }
        if !self.references.is_empty() {
            config.references = self.references.clone();
        }
        config
            .backend_references
            .extend(self.backend_references.iter().cloned());
        if let Some(verbosity) = self.verbosity {
            config.verbosity = verbosity.into();
        }
        config.no_warn.extend(self.no_warn.iter().copied());
        if self.fuel.is_some() {
            config.host.fuel = self.fuel;
        }
        if let Some(seed) = self.seed {
            config.host.seed = seed;
        }
        config.invoke_command |= self.command;
        // JSON carries the program output; otherwise print it as it happens.
        config.host.echo = !self.json;
        Ok(config)
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { files, options } => read_sources(&files).and_then(|sources| run(&sources, &options)),
        Command::Emit { files, options } => read_sources(&files).and_then(|sources| emit(&sources, &options)),
        Command::Sample { options } => run(&sample_sources(), &options),
    };
    match result {
        Ok(code) => ExitCode::from(code),
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::from(2)
        }
    }
}

/// Installs a subscriber only when `RUST_LOG` is set.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn read_sources(files: &[PathBuf]) -> Result<SourceMap, String> {
    let mut sources = SourceMap::new();
    for file in files {
        let text = std::fs::read_to_string(file)
            .map_err(|e| format!("failed to read {}: {e}", file.display()))?;
        sources.insert(file.display().to_string(), text);
    }
    Ok(sources)
}

fn logger(config: &PipelineConfig) -> ConsoleLogger {
    ConsoleLogger::new()
        .with_verbosity(config.verbosity)
        .with_no_warn(config.no_warn.iter().copied())
        .with_line_offset(config.line_offset)
}

fn run(sources: &SourceMap, options: &Options) -> Result<u8, String> {
    let config = options.pipeline_config()?;
    debug!(?config, "pipeline configured");
    let pipeline = Pipeline::new(config);
    let outcome = if options.json {
        // Diagnostics are part of the report.
        let mut discard: Vec<Diagnostic> = Vec::new();
        pipeline.run(sources, &mut discard)
    } else {
        let mut logger = logger(pipeline.config());
        pipeline.run(sources, &mut logger)
    };
    let report = outcome.map_err(|defect| format!("internal compiler defect: {defect}"))?;

    if let (Some(path), Some(module)) = (&options.output, &report.module) {
        std::fs::write(path, &module.bytes)
            .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
    }

    if options.json {
        print_json(&report)?;
    } else {
        print_status(&report);
    }
    Ok(report.status.exit_code())
}

fn emit(sources: &SourceMap, options: &Options) -> Result<u8, String> {
    let config = options.pipeline_config()?;
    let pipeline = Pipeline::new(config);
    let mut logger = logger(pipeline.config());
    let (artifacts, outcome) = pipeline
        .generate(sources, &mut logger)
        .map_err(|defect| format!("internal compiler defect: {defect}"))?;

    if options.json {
        let json = serde_json::to_string_pretty(&artifacts).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        for (name, text) in artifacts.iter() {
            println!(";; ── {name} ──");
            println!("{text}");
        }
    }
    Ok(if outcome.has_errors() { 1 } else { 0 })
}

fn print_json(report: &PipelineReport) -> Result<(), String> {
    let json = serde_json::to_string_pretty(report).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

fn print_status(report: &PipelineReport) {
    match &report.status {
        RunStatus::Completed { exit_code } => debug!(exit_code, "entry point returned"),
        RunStatus::Library => {
            if let Some(module) = &report.module {
                println!("compiled library `{}` ({} bytes, sha256 {})", module.name, module.size, module.digest);
            }
        }
        RunStatus::EntryNotFound => eprintln!("error: could not find the entry point"),
        RunStatus::LoadFailed { message } | RunStatus::InvocationFailed { message } => {
            eprintln!("error: {message}");
        }
        RunStatus::FrontendFailed | RunStatus::BackendFailed => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(args: &[&str]) -> Options {
        let mut argv = vec!["quill", "sample"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).expect("arguments parse").command {
            Command::Sample { options } => options,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn run_requires_files() {
        assert!(Cli::try_parse_from(["quill", "run"]).is_err());
        assert!(Cli::try_parse_from(["quill", "run", "a.ql", "b.ql"]).is_ok());
    }

    #[test]
    fn defaults_come_from_pipeline_config() {
        let config = options(&[]).pipeline_config().unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(config.assembly_name, defaults.assembly_name);
        assert_eq!(config.references, defaults.references);
        assert!(config.is_executable);
        assert!(config.host.echo);
    }

    #[test]
    fn flags_override_configuration() {
        let config = options(&[
            "--library",
            "--name",
            "lib",
            "--ref",
            "Other.qlib",
            "--verbosity",
            "warning",
            "--no-warn",
            "4005",
            "--fuel",
            "100",
            "--seed",
            "9",
            "--json",
        ])
        .pipeline_config()
        .unwrap();
        assert!(!config.is_executable);
        assert_eq!(config.assembly_name, "lib");
        assert_eq!(config.references, ["Other.qlib"]);
        assert_eq!(config.verbosity, Severity::Warning);
        assert_eq!(config.no_warn, [4005]);
        assert_eq!(config.host.fuel, Some(100));
        assert_eq!(config.host.seed, 9);
        assert!(!config.host.echo);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let error = options(&["--config", "/nonexistent/quill.toml"])
            .pipeline_config()
            .unwrap_err();
        assert!(error.contains("/nonexistent/quill.toml"));
    }
}
