use crate::analyzer::Analyzer;
use crate::config::{AnalyzerConfig, ContextType};
use crate::model::ServiceModel;
use crate::serializer::{load_model, serialize_json, serialize_yaml, write_to_file};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

/// routewalk - Recover routes, parameters and responses from the handlers of a Rust web service
#[derive(Parser, Debug)]
#[command(name = "routewalk")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the analyzed crate (the directory holding its Cargo.toml)
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Request context type handlers receive, e.g. `my_framework::Context`
    #[arg(long = "context", value_name = "PATH")]
    pub context: Option<String>,

    /// Skip routes whose path starts with PREFIX (repeatable)
    #[arg(long = "deny", value_name = "PREFIX")]
    pub deny: Vec<String>,

    /// Record named types without expanding them; finish later with --resume
    #[arg(long = "defer")]
    pub defer: bool,

    /// Continue from a model written by an earlier (deferred) run
    #[arg(long = "resume", value_name = "MODEL", conflicts_with = "defer")]
    pub resume: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if args.resume.is_none() {
        if !args.project_path.exists() {
            anyhow::bail!("Project path does not exist: {}", args.project_path.display());
        }
        if !args.project_path.is_dir() {
            anyhow::bail!("Project path is not a directory: {}", args.project_path.display());
        }
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }

    Ok(args)
}

/// Builds the analysis configuration: the crate's manifest first, then the flags
pub fn build_config(args: &CliArgs) -> Result<AnalyzerConfig> {
    let mut config = AnalyzerConfig::from_project_dir(&args.project_path)
        .with_context(|| format!("Failed to read project at {}", args.project_path.display()))?;

    if let Some(context) = &args.context {
        config = config.with_context(ContextType::parse(context)?);
    }
    for prefix in &args.deny {
        config = config.with_deny_prefix(prefix.clone());
    }
    Ok(config.deferred(args.defer))
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    let model = match &args.resume {
        Some(path) => {
            info!("Resuming from {}", path.display());
            let model = load_model(path)?;
            let mut analyzer = Analyzer::resume(model).context("Failed to resume analysis")?;
            analyzer.resolve_pending().context("Failed to expand pending types")?;
            analyzer.into_model()
        }
        None => {
            let config = build_config(&args)?;
            info!("Analyzing crate {}...", config.crate_name);
            Analyzer::run(config).context("Analysis failed")?
        }
    };

    if model.routes.is_empty() {
        warn!("No routes found in the project");
    }

    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&model)?,
        OutputFormat::Json => serialize_json(&model)?,
    };

    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
    } else {
        println!("{}", content);
    }

    summarize(&model);
    Ok(())
}

fn summarize(model: &ServiceModel) {
    info!("Summary:");
    info!("  - Routes found: {}", model.routes.len());
    info!("  - Components: {}", model.components.len());
    if !model.is_complete() {
        info!("  - Pending types: {} (finish with --resume)", model.pending.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"demo-svc\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        dir
    }

    #[test]
    fn test_flags_override_the_manifest() {
        let dir = project();
        let args = CliArgs::parse_from([
            "routewalk",
            dir.path().to_str().unwrap(),
            "--context",
            "framework::http::Request",
            "--deny",
            "/internal",
            "--deny",
            "/debug",
            "--defer",
        ]);

        let config = build_config(&args).unwrap();
        assert_eq!(config.crate_name, "demo_svc");
        assert_eq!(config.context.to_string(), "framework::http::Request");
        assert_eq!(config.deny_prefixes, vec!["/internal", "/debug"]);
        assert!(config.deferred);
    }

    #[test]
    fn test_missing_project_is_rejected() {
        let args = CliArgs::parse_from(["routewalk", "/definitely/not/here"]);
        assert!(parse_args_from_parsed(args).is_err());
    }

    #[test]
    fn test_resume_conflicts_with_defer() {
        let result = CliArgs::try_parse_from(["routewalk", ".", "--defer", "--resume", "model.yaml"]);
        assert!(result.is_err());
    }
}
