use super::PackageId;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::PathBuf;
use syn::{Item, UseTree};

/// One source file of a package: its items and its resolved import table.
///
/// Inline `mod name { .. }` bodies get their own `FileNode` whose `path` is the file hosting
/// the inline module.
#[derive(Debug)]
pub struct FileNode {
    /// Path of the file on disk
    pub path: PathBuf,
    /// Owning package
    pub package: PackageId,
    /// Module path of the owning package (`crate::api::users`)
    pub package_path: String,
    /// Top-level items of the file (or of the inline module body)
    pub items: Vec<Item>,
    /// `use` declarations, normalized to absolute paths
    pub imports: ImportTable,
}

/// Alias → absolute target path, built from a file's `use` declarations.
#[derive(Debug, Default, Clone)]
pub struct ImportTable {
    aliases: IndexMap<String, String>,
    globs: Vec<String>,
}

impl ImportTable {
    /// Builds the table for the `use` items of a module.
    ///
    /// # Arguments
    ///
    /// * `items` - Items of the module
    /// * `module_path` - Absolute path of the module the items live in
    /// * `local_names` - Names declared by the module itself, used to anchor
    ///   uniform paths (`use models::User` where `models` is a child module)
    pub fn from_items(items: &[Item], module_path: &str, local_names: &HashSet<String>) -> Self {
        let mut table = ImportTable::default();

        for item in items {
            if let Item::Use(use_item) = item {
                let anchored = use_item.leading_colon.is_some();
                table.collect(&use_item.tree, Vec::new(), anchored, module_path, local_names);
            }
        }

        table
    }

    /// Recursively walks a use tree, recording aliases and globs
    fn collect(
        &mut self,
        tree: &UseTree,
        mut prefix: Vec<String>,
        anchored: bool,
        module_path: &str,
        local_names: &HashSet<String>,
    ) {
        match tree {
            UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.collect(&path.tree, prefix, anchored, module_path, local_names);
            }
            UseTree::Group(group) => {
                for item in &group.items {
                    self.collect(item, prefix.clone(), anchored, module_path, local_names);
                }
            }
            UseTree::Name(name) => {
                let ident = name.ident.to_string();
                // `use foo::{self}` imports `foo` itself
                let (alias, segments) = if ident == "self" {
                    match prefix.last() {
                        Some(last) => (last.clone(), prefix),
                        None => return,
                    }
                } else {
                    prefix.push(ident.clone());
                    (ident, prefix)
                };
                let target = Self::anchor(&segments, anchored, module_path, local_names);
                self.aliases.insert(alias, target);
            }
            UseTree::Rename(rename) => {
                let ident = rename.ident.to_string();
                if ident != "self" {
                    prefix.push(ident);
                }
                if rename.rename == "_" || prefix.is_empty() {
                    return;
                }
                let target = Self::anchor(&prefix, anchored, module_path, local_names);
                self.aliases.insert(rename.rename.to_string(), target);
            }
            UseTree::Glob(_) => {
                if !prefix.is_empty() {
                    let target = Self::anchor(&prefix, anchored, module_path, local_names);
                    self.globs.push(target);
                }
            }
        }
    }

    fn anchor(
        segments: &[String],
        anchored: bool,
        module_path: &str,
        local_names: &HashSet<String>,
    ) -> String {
        if anchored {
            return segments.join("::");
        }
        normalize_path(module_path, segments, local_names).join("::")
    }

    /// Looks up the absolute path an alias stands for
    pub fn lookup(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Absolute paths of modules imported with `*`
    pub fn globs(&self) -> &[String] {
        &self.globs
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Turns a relative path into an absolute one.
///
/// `crate` paths are kept, `self` and `super` are expanded against `module_path`, and a first
/// segment naming something the module declares is anchored at the module. Anything else is
/// taken to start with an external crate name.
pub fn normalize_path(
    module_path: &str,
    segments: &[String],
    local_names: &HashSet<String>,
) -> Vec<String> {
    let mut base: Vec<String> = module_path.split("::").map(str::to_string).collect();
    let mut rest = segments;

    match segments.first().map(String::as_str) {
        Some("crate") => return segments.to_vec(),
        Some("self") => rest = &segments[1..],
        Some("super") => {
            while let Some("super") = rest.first().map(String::as_str) {
                if base.len() > 1 {
                    base.pop();
                }
                rest = &rest[1..];
            }
        }
        Some(first) if local_names.contains(first) => {}
        _ => return segments.to_vec(),
    }

    base.extend(rest.iter().cloned());
    base
}

/// Name an item introduces into its module, if any
pub fn item_name(item: &Item) -> Option<String> {
    let ident = match item {
        Item::Const(i) => &i.ident,
        Item::Enum(i) => &i.ident,
        Item::Fn(i) => &i.sig.ident,
        Item::Mod(i) => &i.ident,
        Item::Static(i) => &i.ident,
        Item::Struct(i) => &i.ident,
        Item::Trait(i) => &i.ident,
        Item::Type(i) => &i.ident,
        Item::Union(i) => &i.ident,
        _ => return None,
    };
    Some(ident.to_string())
}
