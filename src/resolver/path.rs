use super::{Resolver, Scope};
use crate::error::{AnalysisError, Result};
use crate::packages::file::normalize_path;
use crate::packages::{Package, PackageGraph, CRATE_ROOT};
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

/// How many `pub use` hops a path may take before resolution gives up
const MAX_REEXPORT_HOPS: usize = 16;

/// What a `::` path names once imports and re-exports are followed.
#[derive(Debug, Clone)]
pub enum PathTarget {
    /// A module of the analyzed crate
    Module(Arc<Package>),
    /// An item declared in a module of the crate, with any trailing segments (variants,
    /// associated items)
    Item {
        package: Arc<Package>,
        name: String,
        rest: Vec<String>,
    },
    /// Something declared in a dependency
    External {
        package: String,
        name: String,
        rest: Vec<String>,
    },
}

impl Resolver {
    /// Resolves a path as written in `scope` to its target.
    ///
    /// Relative paths are tried, in order, against the items and submodules the current
    /// module declares, its `use` aliases and its glob imports; anything left is taken to be
    /// rooted at an external crate.
    pub fn resolve_path(&mut self, scope: &Scope, segments: &[String]) -> Result<PathTarget> {
        let first = segments
            .first()
            .ok_or_else(|| AnalysisError::structural("path", "empty path"))?;

        let absolute: Vec<String> = match first.as_str() {
            "crate" | "self" | "super" => {
                normalize_path(scope.package_path(), segments, &HashSet::new())
            }
            "Self" => match scope.self_type.as_ref().and_then(|t| t.as_named()) {
                Some(named) => {
                    let mut path: Vec<String> =
                        named.package.split("::").map(str::to_string).collect();
                    path.push(named.name.clone());
                    path.extend(segments[1..].iter().cloned());
                    path
                }
                None => return Err(AnalysisError::unresolved("Self outside of an impl block")),
            },
            _ => self.anchor_relative(scope, segments)?,
        };

        let rewritten = self.graph().rewrite(&absolute.join("::"));
        let absolute: Vec<String> = rewritten.split("::").map(str::to_string).collect();
        self.resolve_absolute(&absolute, 0)
    }

    /// Turns a path that does not start with `crate`, `self` or `super` into an absolute one
    fn anchor_relative(&mut self, scope: &Scope, segments: &[String]) -> Result<Vec<String>> {
        let first = &segments[0];
        let package = self.package(scope.package_path())?;

        if package.item(first).is_some() || package.has_submodule(first) {
            let mut path: Vec<String> = package.path.split("::").map(str::to_string).collect();
            path.extend(segments.iter().cloned());
            return Ok(path);
        }

        if let Some(target) = scope.file.imports.lookup(first) {
            let mut path: Vec<String> = target.split("::").map(str::to_string).collect();
            path.extend(segments[1..].iter().cloned());
            return Ok(path);
        }

        for glob in scope.file.imports.globs() {
            if !PackageGraph::is_local(glob) {
                continue;
            }
            let module = self.package(glob)?;
            if module.item(first).is_some() || module.has_submodule(first) {
                let mut path: Vec<String> = glob.split("::").map(str::to_string).collect();
                path.extend(segments.iter().cloned());
                return Ok(path);
            }
        }

        Ok(segments.to_vec())
    }

    fn resolve_absolute(&mut self, segments: &[String], hops: usize) -> Result<PathTarget> {
        if hops > MAX_REEXPORT_HOPS {
            return Err(AnalysisError::unresolved(format!(
                "{} (re-export chain too long)",
                segments.join("::")
            )));
        }

        if segments.first().map(String::as_str) != Some(CRATE_ROOT) {
            return Ok(split_external(segments));
        }

        let mut package = self.package(CRATE_ROOT)?;
        let mut position = 1;
        while position < segments.len() && package.has_submodule(&segments[position]) {
            let child = format!("{}::{}", package.path, segments[position]);
            package = self.package(&child)?;
            position += 1;
        }

        if position == segments.len() {
            return Ok(PathTarget::Module(package));
        }

        let name = &segments[position];
        let rest = segments[position + 1..].to_vec();

        if package.item(name).is_some() {
            return Ok(PathTarget::Item {
                package,
                name: name.clone(),
                rest,
            });
        }

        // `pub use` re-exports
        let file = Arc::clone(package.file());
        if let Some(target) = file.imports.lookup(name) {
            debug!("Following re-export {}::{} -> {}", package.path, name, target);
            let mut path: Vec<String> = target.split("::").map(str::to_string).collect();
            path.extend(rest);
            return self.resolve_absolute(&path, hops + 1);
        }
        for glob in file.imports.globs() {
            if !PackageGraph::is_local(glob) {
                continue;
            }
            let module = self.package(glob)?;
            if module.item(name).is_some() || module.has_submodule(name) {
                let mut path: Vec<String> = glob.split("::").map(str::to_string).collect();
                path.push(name.clone());
                path.extend(rest);
                return self.resolve_absolute(&path, hops + 1);
            }
        }

        Err(AnalysisError::unresolved(segments.join("::")))
    }
}

/// Splits a dependency path into module, item and trailing segments.
///
/// The first segment after the crate name that starts with an uppercase letter is taken as the
/// item (`http::StatusCode::OK`); without one, the last segment is the item (`serde_json::json`).
fn split_external(segments: &[String]) -> PathTarget {
    let type_position = segments
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, s)| s.chars().next().map(char::is_uppercase).unwrap_or(false))
        .map(|(i, _)| i)
        .unwrap_or(segments.len().saturating_sub(1));

    let package = if type_position == 0 {
        segments[0].clone()
    } else {
        segments[..type_position].join("::")
    };

    PathTarget::External {
        package,
        name: segments[type_position].clone(),
        rest: segments[type_position + 1..].to_vec(),
    }
}
