use crate::error::{AnalysisError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default cap on helper recursion during a route walk
pub const DEFAULT_MAX_WALK_DEPTH: usize = 16;

/// The request-context type handlers receive (`web::Context` unless configured otherwise).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextType {
    /// Module path of the declaring crate module (`web`, `my_framework::http`)
    pub package: String,
    pub name: String,
}

impl ContextType {
    /// Parses `path::to::Type`
    pub fn parse(path: &str) -> Result<Self> {
        match path.rsplit_once("::") {
            Some((package, name)) if !package.is_empty() && !name.is_empty() => Ok(Self {
                package: package.to_string(),
                name: name.to_string(),
            }),
            _ => Err(AnalysisError::Config(format!(
                "context type must be a path like web::Context, got {:?}",
                path
            ))),
        }
    }
}

impl Default for ContextType {
    fn default() -> Self {
        Self {
            package: "web".to_string(),
            name: "Context".to_string(),
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.package, self.name)
    }
}

/// Settings of one analysis run; persisted alongside the service model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Directory holding the analyzed crate's `Cargo.toml`
    pub project_root: PathBuf,
    /// Crate name as written in paths (`my_service`), rewritten to `crate`
    pub crate_name: String,
    /// Root module file (`src/lib.rs` or `src/main.rs`)
    pub root_file: PathBuf,
    #[serde(default)]
    pub context: ContextType,
    /// Route path prefixes that are never analyzed
    #[serde(default)]
    pub deny_prefixes: Vec<String>,
    /// Discover routes and record named types without expanding them
    #[serde(default)]
    pub deferred: bool,
    #[serde(default = "default_max_walk_depth")]
    pub max_walk_depth: usize,
}

fn default_max_walk_depth() -> usize {
    DEFAULT_MAX_WALK_DEPTH
}

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<ManifestPackage>,
    lib: Option<ManifestTarget>,
    #[serde(default)]
    bin: Vec<ManifestTarget>,
}

#[derive(Debug, Deserialize)]
struct ManifestPackage {
    name: String,
    metadata: Option<ManifestMetadata>,
}

#[derive(Debug, Deserialize)]
struct ManifestMetadata {
    routewalk: Option<RoutewalkMetadata>,
}

/// `[package.metadata.routewalk]`
#[derive(Debug, Default, Deserialize)]
struct RoutewalkMetadata {
    context: Option<String>,
    #[serde(default)]
    deny: Vec<String>,
    max_depth: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ManifestTarget {
    path: Option<PathBuf>,
}

impl AnalyzerConfig {
    pub fn new(project_root: PathBuf, crate_name: impl Into<String>, root_file: PathBuf) -> Self {
        Self {
            project_root,
            crate_name: crate_name.into(),
            root_file,
            context: ContextType::default(),
            deny_prefixes: Vec::new(),
            deferred: false,
            max_walk_depth: DEFAULT_MAX_WALK_DEPTH,
        }
    }

    /// Builds the configuration of the crate in `dir` from its `Cargo.toml`.
    ///
    /// The root file is the `[lib] path`, else `src/lib.rs`, else the first `[[bin]] path`,
    /// else `src/main.rs`. Analysis settings are read from `[package.metadata.routewalk]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or parsed, has no `[package]`, or no
    /// root file exists.
    pub fn from_project_dir(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join("Cargo.toml");
        debug!("Reading manifest {}", manifest_path.display());

        let content = fs::read_to_string(&manifest_path).map_err(|source| AnalysisError::Io {
            path: manifest_path.clone(),
            source,
        })?;
        let manifest: Manifest = toml::from_str(&content).map_err(|e| {
            AnalysisError::Config(format!("{}: {}", manifest_path.display(), e))
        })?;

        let package = manifest.package.ok_or_else(|| {
            AnalysisError::Config(format!(
                "{} has no [package] section (workspace manifests are not analyzed)",
                manifest_path.display()
            ))
        })?;

        let root_file = Self::root_file(dir, manifest.lib.as_ref(), &manifest.bin)?;
        let mut config = Self::new(dir.to_path_buf(), package.name.replace('-', "_"), root_file);

        let metadata = package
            .metadata
            .and_then(|m| m.routewalk)
            .unwrap_or_default();
        if let Some(context) = metadata.context {
            config.context = ContextType::parse(&context)?;
        }
        config.deny_prefixes = metadata.deny;
        if let Some(depth) = metadata.max_depth {
            config.max_walk_depth = depth;
        }

        info!(
            "Analyzing crate {} from {} (context {})",
            config.crate_name,
            config.root_file.display(),
            config.context
        );
        Ok(config)
    }

    fn root_file(dir: &Path, lib: Option<&ManifestTarget>, bins: &[ManifestTarget]) -> Result<PathBuf> {
        if let Some(path) = lib.and_then(|l| l.path.as_ref()) {
            return Ok(dir.join(path));
        }
        let lib_rs = dir.join("src/lib.rs");
        if lib_rs.exists() {
            return Ok(lib_rs);
        }
        if let Some(path) = bins.first().and_then(|b| b.path.as_ref()) {
            return Ok(dir.join(path));
        }
        let main_rs = dir.join("src/main.rs");
        if main_rs.exists() {
            return Ok(main_rs);
        }
        Err(AnalysisError::Config(format!(
            "no src/lib.rs or src/main.rs under {}",
            dir.display()
        )))
    }

    pub fn with_context(mut self, context: ContextType) -> Self {
        self.context = context;
        self
    }

    pub fn with_deny_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.deny_prefixes.push(prefix.into());
        self
    }

    pub fn deferred(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(manifest: &str, files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), manifest).unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        dir
    }

    #[test]
    fn test_context_type_parse() {
        let context = ContextType::parse("my_framework::http::Ctx").unwrap();
        assert_eq!(context.package, "my_framework::http");
        assert_eq!(context.name, "Ctx");
        assert_eq!(context.to_string(), "my_framework::http::Ctx");

        assert!(matches!(ContextType::parse("Ctx"), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn test_from_project_dir_defaults() {
        let dir = project(
            "[package]\nname = \"user-service\"\nversion = \"0.1.0\"\n",
            &["src/main.rs"],
        );
        let config = AnalyzerConfig::from_project_dir(dir.path()).unwrap();

        assert_eq!(config.crate_name, "user_service");
        assert_eq!(config.root_file, dir.path().join("src/main.rs"));
        assert_eq!(config.context, ContextType::default());
        assert_eq!(config.max_walk_depth, DEFAULT_MAX_WALK_DEPTH);
        assert!(!config.deferred);
    }

    #[test]
    fn test_from_project_dir_reads_metadata_and_lib_path() {
        let dir = project(
            r#"
[package]
name = "api"
version = "0.1.0"

[package.metadata.routewalk]
context = "http_kit::Request"
deny = ["/internal"]
max_depth = 4

[lib]
path = "source/root.rs"
"#,
            &["source/root.rs", "src/lib.rs"],
        );
        let config = AnalyzerConfig::from_project_dir(dir.path()).unwrap();

        assert_eq!(config.root_file, dir.path().join("source/root.rs"));
        assert_eq!(config.context.to_string(), "http_kit::Request");
        assert_eq!(config.deny_prefixes, vec!["/internal".to_string()]);
        assert_eq!(config.max_walk_depth, 4);
    }

    #[test]
    fn test_workspace_manifest_is_rejected() {
        let dir = project("[workspace]\nmembers = [\"a\"]\n", &["src/lib.rs"]);
        let err = AnalyzerConfig::from_project_dir(dir.path()).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let err = AnalyzerConfig::from_project_dir(dir.path()).unwrap_err();
        assert!(matches!(err, AnalysisError::Io { .. }));
    }
}
