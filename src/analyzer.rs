//! Analysis orchestration: discovery, handler walks and the whole-program worklist pass.

use crate::config::AnalyzerConfig;
use crate::discovery::{discover_routes, path_parameters};
use crate::error::Result;
use crate::materializer::{Materializer, Mode};
use crate::model::{ComponentList, Field, HandlerLocation, Param, Route, ServiceModel};
use crate::packages::{PackageGraph, CRATE_ROOT};
use crate::resolver::{PrimitiveType, Resolver};
use crate::walker::{Recognizer, RouteWalker};
use log::{debug, info};

/// A predicate over route paths; matching routes are never analyzed
pub type DenyPredicate = Box<dyn Fn(&str) -> bool>;

/// Runs one analysis of a crate and owns everything the run caches.
///
/// ```no_run
/// use routewalk::analyzer::Analyzer;
/// use routewalk::config::AnalyzerConfig;
/// use std::path::Path;
///
/// let config = AnalyzerConfig::from_project_dir(Path::new("./my-service")).unwrap();
/// let mut analyzer = Analyzer::new(config).unwrap();
/// analyzer.discover().unwrap();
/// analyzer.resolve_pending().unwrap();
/// let model = analyzer.into_model();
/// println!("{} routes", model.routes.len());
/// ```
pub struct Analyzer {
    config: AnalyzerConfig,
    resolver: Resolver,
    materializer: Materializer,
    recognizers: Vec<Box<dyn Recognizer>>,
    deny: Vec<DenyPredicate>,
    routes: Vec<Route>,
}

impl Analyzer {
    /// Prepares an analysis of the crate `config` describes. Nothing is parsed yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured root file does not exist.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        if !config.root_file.is_file() {
            return Err(crate::error::AnalysisError::Config(format!(
                "root file {} does not exist",
                config.root_file.display()
            )));
        }

        let mut graph = PackageGraph::new(config.root_file.clone());
        graph.add_rewrite(crate_name_rewrite(config.crate_name.clone()));

        let mode = if config.deferred { Mode::Defer } else { Mode::Discover };
        let deny = config
            .deny_prefixes
            .iter()
            .map(|prefix| {
                let prefix = prefix.clone();
                Box::new(move |path: &str| path.starts_with(&prefix)) as DenyPredicate
            })
            .collect();

        Ok(Self {
            config,
            resolver: Resolver::new(graph),
            materializer: Materializer::new(mode),
            recognizers: Vec::new(),
            deny,
            routes: Vec::new(),
        })
    }

    /// Continues a run from a persisted model: its routes and components are kept and its
    /// pending named types go back on the worklist.
    ///
    /// # Errors
    ///
    /// Same as [`Analyzer::new`].
    pub fn resume(model: ServiceModel) -> Result<Self> {
        let mut analyzer = Self::new(model.config)?;
        let mode = analyzer.materializer.mode();
        analyzer.materializer = Materializer::from_parts(mode, model.components, model.pending);
        analyzer.routes = model.routes;
        info!(
            "Resumed with {} routes and {} pending types",
            analyzer.routes.len(),
            analyzer.materializer.worklist().len()
        );
        Ok(analyzer)
    }

    /// Adds a recognizer; recognizers are consulted in registration order.
    pub fn register_recognizer(&mut self, recognizer: impl Recognizer + 'static) -> &mut Self {
        self.recognizers.push(Box::new(recognizer));
        self
    }

    /// Adds a deny predicate on top of the configured prefixes.
    pub fn deny_path(&mut self, predicate: impl Fn(&str) -> bool + 'static) -> &mut Self {
        self.deny.push(Box::new(predicate));
        self
    }

    /// Finds every route of the crate and walks its handler.
    ///
    /// Returns the number of routes added by this call.
    ///
    /// # Errors
    ///
    /// The first error met aborts the run; no route of a failed run is kept.
    pub fn discover(&mut self) -> Result<usize> {
        let deny = &self.deny;
        let is_denied = |path: &str| deny.iter().any(|predicate| predicate(path));
        let stubs = discover_routes(&mut self.resolver, &is_denied)?;

        let mut routes = Vec::with_capacity(stubs.len());
        for stub in stubs {
            let handler = HandlerLocation {
                file: stub
                    .handler
                    .file
                    .path
                    .strip_prefix(&self.config.project_root)
                    .unwrap_or(&stub.handler.file.path)
                    .to_path_buf(),
                package: stub.handler.package().to_string(),
                function: stub.handler.name.clone(),
            };

            let mut route = Route::new(stub.method, &stub.path, handler);
            for name in path_parameters(&stub.path) {
                route.add_path_param(Param::new(name, Field::primitive(PrimitiveType::String), true));
            }

            debug!("Walking {} -> {}", route.label(), stub.handler.name);
            let mut walker = RouteWalker::new(
                &mut self.resolver,
                &mut self.materializer,
                &self.recognizers,
                &self.config.context,
                self.config.max_walk_depth,
            );
            routes.push(walker.walk(&stub.handler, route, 0)?);
        }

        let added = routes.len();
        self.routes.extend(routes);
        info!(
            "Analyzed {} routes, {} components, {} types pending",
            added,
            self.materializer.components().len(),
            self.materializer.worklist().len()
        );
        Ok(added)
    }

    /// Expands every queued named type until nothing new turns up.
    ///
    /// Returns the number of types expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if a queued type cannot be found or expanded, or if the worklist does
    /// not settle.
    pub fn resolve_pending(&mut self) -> Result<usize> {
        let expanded = self.materializer.process_worklist(&mut self.resolver)?;
        info!(
            "Expanded {} pending types, {} components total",
            expanded,
            self.materializer.components().len()
        );
        Ok(expanded)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn components(&self) -> &ComponentList {
        self.materializer.components()
    }

    /// Finishes the run; types still queued end up in [`ServiceModel::pending`].
    pub fn into_model(self) -> ServiceModel {
        let (components, pending) = self.materializer.into_parts();
        ServiceModel {
            config: self.config,
            routes: self.routes,
            components,
            pending,
        }
    }

    /// Analyzes a crate in one go; in deferred mode the worklist is left for a later
    /// [`Analyzer::resume`].
    ///
    /// # Errors
    ///
    /// Returns the first error of any phase.
    pub fn run(config: AnalyzerConfig) -> Result<ServiceModel> {
        let deferred = config.deferred;
        let mut analyzer = Self::new(config)?;
        analyzer.discover()?;
        if !deferred {
            analyzer.resolve_pending()?;
        }
        Ok(analyzer.into_model())
    }
}

/// Maps `my_service::api` (as written in `use my_service::api;` from a binary) to `crate::api`
fn crate_name_rewrite(crate_name: String) -> crate::packages::PathRewrite {
    Box::new(move |path: &str| {
        if path == crate_name {
            return Some(CRATE_ROOT.to_string());
        }
        path.strip_prefix(crate_name.as_str())
            .and_then(|rest| rest.strip_prefix("::"))
            .map(|rest| format!("{}::{}", CRATE_ROOT, rest))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_name_rewrite() {
        let rewrite = crate_name_rewrite("my_service".to_string());
        assert_eq!(rewrite("my_service").as_deref(), Some("crate"));
        assert_eq!(rewrite("my_service::api::users").as_deref(), Some("crate::api::users"));
        assert_eq!(rewrite("my_service_extra::api"), None);
        assert_eq!(rewrite("crate::api"), None);
    }

    #[test]
    fn test_missing_root_file_is_a_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AnalyzerConfig::new(dir.path().to_path_buf(), "svc", dir.path().join("src/lib.rs"));
        let err = Analyzer::new(config).err().unwrap();
        assert!(matches!(err, crate::error::AnalysisError::Config(_)));
    }
}
