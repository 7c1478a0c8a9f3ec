//! Symbol, expression and call resolution over the package graph.
//!
//! All queries are answered relative to a [`Scope`]: the file whose imports apply, the function
//! whose locals are visible, and the `Self` type and generic parameters in effect. A scope is an
//! immutable value; answering a question about another module builds a new scope for that
//! module and leaves the caller's untouched, so there is no "current file" to restore.

pub mod call;
pub mod declaration;
pub mod expression;
pub mod path;
pub mod types;

use crate::error::{AnalysisError, Result};
use crate::packages::file::FileNode;
use crate::packages::{Package, PackageGraph};
use call::FunctionDecl;
use std::sync::Arc;
use types::StaticType;

pub use call::{CallSite, Callee, Signature};
pub use declaration::{Declaration, DeclarationKind};
pub use expression::{ConstValue, VarName};
pub use path::PathTarget;
pub use types::{NamedType, PrimitiveType};

/// How deep resolution may recurse through declarations before giving up
const MAX_RESOLUTION_DEPTH: usize = 64;

/// The context a syntax node is resolved against.
#[derive(Debug, Clone)]
pub struct Scope {
    /// File whose import table applies
    pub file: Arc<FileNode>,
    /// Enclosing function, whose parameters and `let` bindings are visible
    pub function: Option<Arc<FunctionDecl>>,
    /// Type `Self` stands for
    pub self_type: Option<StaticType>,
    /// Generic type parameters in effect
    pub generics: Vec<String>,
}

impl Scope {
    /// Module-level scope of a file
    pub fn for_file(file: Arc<FileNode>) -> Self {
        Self {
            file,
            function: None,
            self_type: None,
            generics: Vec::new(),
        }
    }

    /// Module path of the file's package
    pub fn package_path(&self) -> &str {
        &self.file.package_path
    }

    pub fn with_generics(mut self, generics: Vec<String>) -> Self {
        self.generics.extend(generics);
        self
    }

    pub fn with_self_type(mut self, self_type: StaticType) -> Self {
        self.self_type = Some(self_type);
        self
    }
}

/// Resolves names, expressions and calls, loading modules on demand.
pub struct Resolver {
    graph: PackageGraph,
    depth: usize,
}

impl Resolver {
    pub fn new(graph: PackageGraph) -> Self {
        Self { graph, depth: 0 }
    }

    pub fn graph(&self) -> &PackageGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut PackageGraph {
        &mut self.graph
    }

    /// Loads a module of the analyzed crate by path
    pub fn package(&mut self, path: &str) -> Result<Arc<Package>> {
        self.graph.get_path(path)
    }

    /// Module-level scope of a package's primary file
    pub fn package_scope(&mut self, path: &str) -> Result<Scope> {
        let package = self.package(path)?;
        Ok(Scope::for_file(Arc::clone(package.file())))
    }

    /// Runs `f` one level deeper, failing once declarations chain past the depth limit.
    ///
    /// Self-referential bindings (`let id = id.trim();`) would otherwise recurse forever.
    fn guarded<T>(&mut self, what: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_RESOLUTION_DEPTH {
            return Err(AnalysisError::unresolved(format!(
                "{} (resolution nested deeper than {})",
                what, MAX_RESOLUTION_DEPTH
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

/// Short name of an expression's syntax kind, for error messages
pub(crate) fn expr_kind(expr: &syn::Expr) -> &'static str {
    match expr {
        syn::Expr::Array(_) => "array",
        syn::Expr::Assign(_) => "assignment",
        syn::Expr::Async(_) => "async block",
        syn::Expr::Await(_) => "await",
        syn::Expr::Binary(_) => "binary expression",
        syn::Expr::Block(_) => "block",
        syn::Expr::Call(_) => "call",
        syn::Expr::Cast(_) => "cast",
        syn::Expr::Closure(_) => "closure",
        syn::Expr::Field(_) => "field access",
        syn::Expr::ForLoop(_) => "for loop",
        syn::Expr::If(_) => "if expression",
        syn::Expr::Index(_) => "index expression",
        syn::Expr::Lit(_) => "literal",
        syn::Expr::Macro(_) => "macro invocation",
        syn::Expr::Match(_) => "match expression",
        syn::Expr::MethodCall(_) => "method call",
        syn::Expr::Paren(_) => "parenthesized expression",
        syn::Expr::Path(_) => "path",
        syn::Expr::Range(_) => "range",
        syn::Expr::Reference(_) => "reference",
        syn::Expr::Struct(_) => "struct literal",
        syn::Expr::Try(_) => "try expression",
        syn::Expr::Tuple(_) => "tuple",
        syn::Expr::Unary(_) => "unary expression",
        _ => "expression",
    }
}
