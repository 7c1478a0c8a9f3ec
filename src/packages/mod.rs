//! Package graph: the module tree of the analyzed crate.
//!
//! Every module path (`crate::api::users`) gets exactly one [`PackageNode`] in a prefix tree.
//! Nodes are cheap to create; the module's file is only parsed when [`PackageGraph::get`] is
//! first called for it, and the parsed [`Package`] is memoized on the node.
//!
//! External crates (`web`, `serde_json`) also get nodes so paths into them can be represented,
//! but they cannot be loaded.

pub mod file;

use crate::error::{AnalysisError, Result};
use crate::parser::{doc_comment, AstParser};
use file::{item_name, FileNode, ImportTable};
use indexmap::IndexMap;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syn::Item;

/// Path of the analyzed crate's root module
pub const CRATE_ROOT: &str = "crate";

/// Index of a node in the [`PackageGraph`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(usize);

/// A function that may redirect a logical path before it is added, found or loaded
pub type PathRewrite = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// One node of the module prefix tree.
pub struct PackageNode {
    /// Last path segment (`users` for `crate::api::users`)
    pub name: String,
    /// Full module path
    pub path: String,
    /// Enclosing module; `None` only for the virtual root above every crate
    pub parent: Option<PackageId>,
    /// Child modules by segment
    pub edges: BTreeMap<String, PackageId>,
    data: Mutex<Option<Arc<Package>>>,
}

/// Where the body of a declared submodule lives
#[derive(Debug, Clone)]
enum ModuleSource {
    File { path: PathBuf },
    Inline { items: Vec<Item>, host: PathBuf, dir: PathBuf, doc: Option<String> },
}

/// Position of an item inside a [`Package`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRef {
    pub file: usize,
    pub item: usize,
}

/// A loaded module: its files, docs, submodules and item index.
#[derive(Debug)]
pub struct Package {
    pub id: PackageId,
    pub path: String,
    pub files: Vec<Arc<FileNode>>,
    /// Module documentation (`//!`)
    pub doc: Option<String>,
    /// Directory holding this module's child module files
    pub dir: PathBuf,
    submodules: IndexMap<String, ModuleSource>,
    index: HashMap<String, ItemRef>,
}

impl Package {
    /// Finds a named item declared directly in this module
    pub fn item(&self, name: &str) -> Option<(&Arc<FileNode>, &Item)> {
        let item_ref = self.index.get(name)?;
        let file = &self.files[item_ref.file];
        Some((file, &file.items[item_ref.item]))
    }

    /// Whether the module declares a child module with this name
    pub fn has_submodule(&self, name: &str) -> bool {
        self.submodules.contains_key(name)
    }

    pub fn submodule_names(&self) -> impl Iterator<Item = &str> {
        self.submodules.keys().map(String::as_str)
    }

    /// The primary file of the module
    pub fn file(&self) -> &Arc<FileNode> {
        &self.files[0]
    }
}

/// Prefix tree of module paths with lazily loaded, memoized package data.
pub struct PackageGraph {
    nodes: Vec<PackageNode>,
    index: HashMap<String, PackageId>,
    root_file: PathBuf,
    rewrites: Vec<PathRewrite>,
}

impl PackageGraph {
    /// Creates a graph whose `crate` module is read from `root_file` (`src/lib.rs` or `src/main.rs`)
    pub fn new(root_file: PathBuf) -> Self {
        let root = PackageNode {
            name: String::new(),
            path: String::new(),
            parent: None,
            edges: BTreeMap::new(),
            data: Mutex::new(None),
        };

        let mut graph = Self {
            nodes: vec![root],
            index: HashMap::new(),
            root_file,
            rewrites: Vec::new(),
        };
        graph.add_package(CRATE_ROOT);
        graph
    }

    /// Appends a rewrite to the chain; rewrites run in registration order
    pub fn add_rewrite(&mut self, rewrite: PathRewrite) {
        self.rewrites.push(rewrite);
    }

    /// Applies the rewrite chain to a logical path
    pub fn rewrite(&self, path: &str) -> String {
        let mut current = path.to_string();
        for rewrite in &self.rewrites {
            if let Some(next) = rewrite(&current) {
                current = next;
            }
        }
        current
    }

    /// Inserts (or returns) the node for a `::`-separated module path.
    ///
    /// Intermediate nodes are created as needed. Calling this twice with the same path returns
    /// the same id.
    pub fn add_package(&mut self, path: &str) -> PackageId {
        let path = self.rewrite(path);
        if let Some(id) = self.index.get(&path) {
            return *id;
        }

        let mut current = PackageId(0);
        let mut full = String::new();
        for segment in path.split("::").filter(|s| !s.is_empty()) {
            if !full.is_empty() {
                full.push_str("::");
            }
            full.push_str(segment);

            current = match self.nodes[current.0].edges.get(segment) {
                Some(child) => *child,
                None => {
                    let id = PackageId(self.nodes.len());
                    self.nodes.push(PackageNode {
                        name: segment.to_string(),
                        path: full.clone(),
                        parent: Some(current),
                        edges: BTreeMap::new(),
                        data: Mutex::new(None),
                    });
                    self.nodes[current.0].edges.insert(segment.to_string(), id);
                    self.index.insert(full.clone(), id);
                    id
                }
            };
        }

        current
    }

    /// Read-only lookup of a module path
    pub fn find(&self, path: &str) -> Option<PackageId> {
        self.index.get(&self.rewrite(path)).copied()
    }

    pub fn node(&self, id: PackageId) -> &PackageNode {
        &self.nodes[id.0]
    }

    pub fn root(&self) -> PackageId {
        self.index[CRATE_ROOT]
    }

    /// Whether a path points into the analyzed crate (as opposed to a dependency)
    pub fn is_local(path: &str) -> bool {
        path == CRATE_ROOT || path.starts_with("crate::")
    }

    /// Returns the loaded package, parsing it on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if the module belongs to another crate, if its parent does not declare
    /// it, or if its file cannot be read or parsed.
    pub fn get(&self, id: PackageId) -> Result<Arc<Package>> {
        let node = &self.nodes[id.0];
        let mut slot = node.data.lock();
        if let Some(package) = slot.as_ref() {
            return Ok(Arc::clone(package));
        }

        let package = Arc::new(self.load(id)?);
        *slot = Some(Arc::clone(&package));
        Ok(package)
    }

    /// Adds the path if needed and loads it
    pub fn get_path(&mut self, path: &str) -> Result<Arc<Package>> {
        let id = self.add_package(path);
        self.get(id)
    }

    /// Every package loaded so far, in node order
    pub fn loaded(&self) -> Vec<Arc<Package>> {
        self.nodes
            .iter()
            .filter_map(|node| node.data.lock().as_ref().map(Arc::clone))
            .collect()
    }

    /// Loads the whole module tree of the crate, depth first from the root.
    ///
    /// Returns the ids in pre-order, children in declaration order.
    pub fn load_all(&mut self) -> Result<Vec<PackageId>> {
        let mut order = Vec::new();
        let mut queue = vec![self.root()];

        while let Some(id) = queue.pop() {
            let package = self.get(id)?;
            order.push(id);
            let children: Vec<String> = package
                .submodule_names()
                .map(|name| format!("{}::{}", package.path, name))
                .collect();
            for child in children.into_iter().rev() {
                queue.push(self.add_package(&child));
            }
        }

        info!("Loaded {} modules", order.len());
        Ok(order)
    }

    fn load(&self, id: PackageId) -> Result<Package> {
        let node = &self.nodes[id.0];
        debug!("Loading package {}", node.path);

        if node.path == CRATE_ROOT {
            let parsed = AstParser::parse_file(&self.root_file)?;
            let dir = self
                .root_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            return Ok(Self::build_package(
                id,
                &node.path,
                self.root_file.clone(),
                dir,
                parsed.syntax_tree.items,
                doc_comment(&parsed.syntax_tree.attrs),
            ));
        }

        let parent = match node.parent {
            Some(parent) if Self::is_local(&node.path) => parent,
            _ => {
                return Err(AnalysisError::PackageLoad {
                    path: node.path.clone(),
                    reason: "not part of the analyzed crate".to_string(),
                })
            }
        };

        let parent_package = self.get(parent)?;
        let source = parent_package
            .submodules
            .get(&node.name)
            .cloned()
            .ok_or_else(|| AnalysisError::PackageLoad {
                path: node.path.clone(),
                reason: format!("{} declares no module {}", parent_package.path, node.name),
            })?;

        match source {
            ModuleSource::File { path } => {
                let parsed = AstParser::parse_file(&path)?;
                let dir = child_dir(&path);
                Ok(Self::build_package(
                    id,
                    &node.path,
                    path,
                    dir,
                    parsed.syntax_tree.items,
                    doc_comment(&parsed.syntax_tree.attrs),
                ))
            }
            ModuleSource::Inline { items, host, dir, doc } => {
                Ok(Self::build_package(id, &node.path, host, dir, items, doc))
            }
        }
    }

    fn build_package(
        id: PackageId,
        path: &str,
        file_path: PathBuf,
        dir: PathBuf,
        items: Vec<Item>,
        doc: Option<String>,
    ) -> Package {
        let mut index = HashMap::new();
        let mut local_names = HashSet::new();
        let mut submodules = IndexMap::new();

        for (position, item) in items.iter().enumerate() {
            if let Some(name) = item_name(item) {
                local_names.insert(name.clone());
                index.entry(name).or_insert(ItemRef {
                    file: 0,
                    item: position,
                });
            }

            if let Item::Mod(module) = item {
                if is_cfg_test(&module.attrs) {
                    continue;
                }
                let name = module.ident.to_string();
                let source = match &module.content {
                    Some((_, inner)) => ModuleSource::Inline {
                        items: inner.clone(),
                        host: file_path.clone(),
                        dir: dir.join(&name),
                        doc: doc_comment(&module.attrs),
                    },
                    None => ModuleSource::File {
                        path: module_file(&file_path, &dir, &name, &module.attrs),
                    },
                };
                submodules.insert(name, source);
            }
        }

        let imports = ImportTable::from_items(&items, path, &local_names);
        let file = FileNode {
            path: file_path,
            package: id,
            package_path: path.to_string(),
            items,
            imports,
        };

        debug!(
            "Package {} has {} items and {} submodules",
            path,
            index.len(),
            submodules.len()
        );

        Package {
            id,
            path: path.to_string(),
            files: vec![Arc::new(file)],
            doc,
            dir,
            submodules,
            index,
        }
    }
}

/// Locates the file of an out-of-line `mod name;` declaration
fn module_file(host: &Path, dir: &Path, name: &str, attrs: &[syn::Attribute]) -> PathBuf {
    for attr in attrs {
        if !attr.path().is_ident("path") {
            continue;
        }
        if let syn::Meta::NameValue(nv) = &attr.meta {
            if let syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(s),
                ..
            }) = &nv.value
            {
                let base = host.parent().unwrap_or(dir);
                return base.join(s.value());
            }
        }
    }

    let flat = dir.join(format!("{}.rs", name));
    if flat.exists() {
        return flat;
    }
    let nested = dir.join(name).join("mod.rs");
    if nested.exists() {
        return nested;
    }
    flat
}

/// Directory holding the children of the module stored in `file`
fn child_dir(file: &Path) -> PathBuf {
    match file.file_name().and_then(|n| n.to_str()) {
        Some("mod.rs") | Some("lib.rs") | Some("main.rs") => {
            file.parent().map(Path::to_path_buf).unwrap_or_default()
        }
        _ => file.with_extension(""),
    }
}

fn is_cfg_test(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("cfg")
            && attr
                .parse_args::<syn::Ident>()
                .map(|ident| ident == "test")
                .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn test_add_package_is_idempotent() {
        let mut graph = PackageGraph::new(PathBuf::from("src/lib.rs"));
        let first = graph.add_package("crate::api::users");
        let second = graph.add_package("crate::api::users");

        assert_eq!(first, second);
        let api = graph.find("crate::api").unwrap();
        assert_eq!(graph.node(first).parent, Some(api));
        assert_eq!(graph.node(api).edges.len(), 1);
        assert_eq!(graph.node(first).name, "users");
    }

    #[test]
    fn test_find_does_not_insert() {
        let graph = PackageGraph::new(PathBuf::from("src/lib.rs"));
        assert!(graph.find("crate::missing").is_none());
        assert!(graph.find("crate").is_some());
    }

    #[test]
    fn test_rewrite_chain() {
        let mut graph = PackageGraph::new(PathBuf::from("src/lib.rs"));
        graph.add_rewrite(Box::new(|path| {
            path.strip_prefix("my_app")
                .map(|rest| format!("crate{}", rest))
        }));

        let id = graph.add_package("my_app::models");
        assert_eq!(graph.node(id).path, "crate::models");
        assert_eq!(graph.find("my_app::models"), Some(id));
    }

    #[test]
    fn test_load_file_and_inline_modules() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "src/lib.rs",
            r#"
            //! Service crate.
            pub mod models;
            pub mod api {
                pub mod users;
                pub const PREFIX: &str = "/api";
            }
            #[cfg(test)]
            mod tests;
            "#,
        );
        write(&dir, "src/models/mod.rs", "pub struct User { pub id: u64 }");
        write(&dir, "src/api/users.rs", "pub fn list() {}");

        let mut graph = PackageGraph::new(root);
        let crate_pkg = graph.get(graph.root()).unwrap();
        assert_eq!(crate_pkg.doc.as_deref(), Some("Service crate."));
        assert!(crate_pkg.has_submodule("models"));
        assert!(!crate_pkg.has_submodule("tests"));

        let models = graph.get_path("crate::models").unwrap();
        assert!(models.item("User").is_some());

        let api = graph.get_path("crate::api").unwrap();
        assert!(api.item("PREFIX").is_some());

        let users = graph.get_path("crate::api::users").unwrap();
        assert!(users.item("list").is_some());
        assert!(users.file().path.ends_with("src/api/users.rs"));
    }

    #[test]
    fn test_get_is_memoized() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "src/main.rs", "fn main() {}");

        let graph = PackageGraph::new(root);
        let first = graph.get(graph.root()).unwrap();
        let second = graph.get(graph.root()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_load_all_walks_module_tree() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "src/main.rs", "mod a; mod b { mod c {} }");
        write(&dir, "src/a.rs", "mod d;");
        write(&dir, "src/a/d.rs", "");

        let mut graph = PackageGraph::new(root);
        let loaded = graph.load_all().unwrap();
        let paths: Vec<_> = loaded.iter().map(|id| graph.node(*id).path.clone()).collect();

        assert_eq!(paths, vec!["crate", "crate::a", "crate::a::d", "crate::b", "crate::b::c"]);
        assert_eq!(graph.loaded().len(), 5);
    }

    #[test]
    fn test_external_package_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "src/main.rs", "");
        let mut graph = PackageGraph::new(root);

        let err = graph.get_path("web").unwrap_err();
        assert!(matches!(err, AnalysisError::PackageLoad { .. }));
    }

    #[test]
    fn test_missing_module_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "src/main.rs", "mod gone;");
        let mut graph = PackageGraph::new(root);

        let err = graph.get_path("crate::gone").unwrap_err();
        assert!(matches!(err, AnalysisError::Io { .. }));
    }

    #[test]
    fn test_undeclared_module_is_an_error() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "src/main.rs", "");
        let mut graph = PackageGraph::new(root);

        let err = graph.get_path("crate::nowhere").unwrap_err();
        assert!(matches!(err, AnalysisError::PackageLoad { .. }));
    }
}
