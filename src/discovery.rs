//! Route registration discovery.
//!
//! Scans every function of the crate for router calls: `.get("/p", h)` and the other method
//! shorthands, `.route("/p", get(h).post(h2))`, `.nest("/p", sub_router())` and
//! `let api = router.group("/api")`. Functions only reachable through `.nest` are scanned with
//! the nest prefix instead of on their own.
//!
//! Only calls on a router count: a chain starting at `Router::new()` or at a crate function
//! returning `Router`, a parameter or local of type `Router`, or a `.group(..)` local.

use crate::error::{AnalysisError, Result};
use crate::model::HttpMethod;
use crate::packages::PackageGraph;
use crate::resolver::call::FunctionDecl;
use crate::resolver::types::generic_names;
use crate::resolver::{Callee, Resolver, Scope};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use syn::visit::{self, Visit};
use syn::{Expr, ExprMethodCall, Lit};

/// How many `.nest` levels are followed into other functions
const MAX_NEST_DEPTH: usize = 16;

const ROUTER_TYPE: &str = "Router";

/// A discovered route registration, before its handler is walked.
#[derive(Debug, Clone)]
pub struct RouteStub {
    pub method: HttpMethod,
    pub path: String,
    pub handler: Arc<FunctionDecl>,
}

/// Finds every route registered anywhere in the crate, skipping paths `is_denied` rejects.
///
/// # Errors
///
/// Returns an error when a module cannot be loaded or the handler of a (non-denied) route
/// cannot be resolved to a function of the crate.
pub fn discover_routes(resolver: &mut Resolver, is_denied: &dyn Fn(&str) -> bool) -> Result<Vec<RouteStub>> {
    let functions = crate_functions(resolver)?;
    debug!("Scanning {} functions for route registrations", functions.len());

    let nested = nest_targets(resolver, &functions);
    let mut stubs = Vec::new();

    for function in &functions {
        if nested.contains(&function_key(function)) {
            debug!("{} is a nested router, scanned through its parent", function.name);
            continue;
        }
        scan_function(resolver, function, String::new(), 0, is_denied, &mut stubs)?;
    }

    info!("Discovered {} routes", stubs.len());
    Ok(stubs)
}

/// Template parameters of a route path: `:id`, `{id}`, `*rest`, `{*rest}`
pub fn path_parameters(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|segment| {
            let name = if let Some(name) = segment.strip_prefix(':') {
                name
            } else if let Some(name) = segment.strip_prefix('*') {
                name
            } else if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                inner.trim_start_matches('*')
            } else {
                return None;
            };
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

/// Joins a prefix and a path with exactly one slash between them
fn combine_paths(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }

    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}

/// Every free function and impl method of the crate, modules in pre-order
fn crate_functions(resolver: &mut Resolver) -> Result<Vec<Arc<FunctionDecl>>> {
    let ids = resolver.graph_mut().load_all()?;
    let mut functions = Vec::new();

    for id in ids {
        let package = resolver.graph().get(id)?;
        if !PackageGraph::is_local(&package.path) {
            continue;
        }
        for file in &package.files {
            for item in &file.items {
                match item {
                    syn::Item::Fn(item) => functions.push(FunctionDecl::from_item_fn(Arc::clone(file), item)),
                    syn::Item::Impl(imp) => {
                        let file_scope = Scope::for_file(Arc::clone(file)).with_generics(generic_names(&imp.generics));
                        let self_type = match resolver.lower_type(&file_scope, &imp.self_ty) {
                            Ok(ty) => ty,
                            Err(err) => {
                                debug!("Skipping impl block in {}: {}", package.path, err);
                                continue;
                            }
                        };
                        let impl_scope = file_scope.with_self_type(self_type);
                        for member in &imp.items {
                            if let syn::ImplItem::Fn(method) = member {
                                functions.push(FunctionDecl::from_impl_fn(&impl_scope, method));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(functions)
}

fn function_key(function: &FunctionDecl) -> String {
    match &function.self_type {
        Some(self_type) => format!("{}::{}::{}", function.package(), self_type, function.name),
        None => format!("{}::{}", function.package(), function.name),
    }
}

/// Functions handed to `.nest(path, f())` anywhere in the crate
fn nest_targets(resolver: &mut Resolver, functions: &[Arc<FunctionDecl>]) -> HashSet<String> {
    let mut targets = HashSet::new();

    for function in functions {
        let mut collector = NestCollector::default();
        function.body.visit(&mut collector);

        let scope = function.scope();
        for callee in collector.callees {
            match resolver.callee_of(&scope, callee) {
                Ok(Callee::Function(target)) => {
                    targets.insert(function_key(&target));
                }
                Ok(Callee::External(_)) => {}
                Err(err) => debug!("Nested router in {} not resolved yet: {}", function.name, err),
            }
        }
    }

    targets
}

#[derive(Default)]
struct NestCollector<'a> {
    callees: Vec<&'a Expr>,
}

impl<'a> Visit<'a> for NestCollector<'a> {
    fn visit_expr_method_call(&mut self, node: &'a ExprMethodCall) {
        if node.method == "nest" && node.args.len() == 2 {
            if let Expr::Call(call) = &node.args[1] {
                self.callees.push(&call.func);
            }
        }
        visit::visit_expr_method_call(self, node);
    }

    fn visit_item(&mut self, _item: &'a syn::Item) {}
}

fn scan_function(
    resolver: &mut Resolver,
    function: &Arc<FunctionDecl>,
    prefix: String,
    depth: usize,
    is_denied: &dyn Fn(&str) -> bool,
    stubs: &mut Vec<RouteStub>,
) -> Result<()> {
    let routers = function
        .inputs
        .iter()
        .filter(|input| input.ty.as_ref().is_some_and(is_router_type))
        .filter_map(|input| input.name.clone())
        .collect();

    let mut visitor = RouterVisitor {
        resolver,
        scope: function.scope(),
        prefix,
        groups: HashMap::new(),
        routers,
        is_denied,
        stubs,
        depth,
        error: None,
    };
    function.body.visit(&mut visitor);
    match visitor.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Visitor recording route registrations of one function body
struct RouterVisitor<'r> {
    resolver: &'r mut Resolver,
    scope: Scope,
    /// Prefix of the router this function builds (set by an enclosing `.nest`)
    prefix: String,
    /// Locals bound to `.group(..)` results → their full prefix
    groups: HashMap<String, String>,
    /// Parameters and locals holding a router
    routers: HashSet<String>,
    is_denied: &'r dyn Fn(&str) -> bool,
    stubs: &'r mut Vec<RouteStub>,
    depth: usize,
    error: Option<AnalysisError>,
}

impl RouterVisitor<'_> {
    /// Full prefix a router expression registers under
    fn prefix_of(&self, expr: &Expr) -> String {
        match expr {
            Expr::MethodCall(call) if call.method == "group" => {
                let base = self.prefix_of(&call.receiver);
                match call.args.first().and_then(string_literal) {
                    Some(path) => combine_paths(&base, &path),
                    None => base,
                }
            }
            Expr::MethodCall(call) => self.prefix_of(&call.receiver),
            Expr::Reference(reference) => self.prefix_of(&reference.expr),
            Expr::Paren(paren) => self.prefix_of(&paren.expr),
            Expr::Path(path) => path
                .path
                .get_ident()
                .and_then(|ident| self.groups.get(&ident.to_string()))
                .cloned()
                .unwrap_or_else(|| self.prefix.clone()),
            _ => self.prefix.clone(),
        }
    }

    /// Whether `expr` evaluates to a router
    fn is_router_expr(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::MethodCall(call) => self.is_router_expr(&call.receiver),
            Expr::Reference(reference) => self.is_router_expr(&reference.expr),
            Expr::Paren(paren) => self.is_router_expr(&paren.expr),
            Expr::Path(path) => path.path.get_ident().is_some_and(|ident| {
                let name = ident.to_string();
                self.routers.contains(&name) || self.groups.contains_key(&name)
            }),
            Expr::Call(call) => {
                let Expr::Path(func) = call.func.as_ref() else {
                    return false;
                };
                if func.path.segments.iter().any(|s| s.ident == ROUTER_TYPE) {
                    return true;
                }
                match self.resolver.callee_of(&self.scope, &call.func) {
                    Ok(Callee::Function(function)) => function.output.as_ref().is_some_and(is_router_type),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn register(&mut self, method: HttpMethod, path: String, handler: &Expr) {
        if (self.is_denied)(&path) {
            info!("Skipping denied route {} {}", method, path);
            return;
        }
        if self.stubs.iter().any(|s| s.method == method && s.path == path) {
            warn!("Route {} {} registered twice, keeping the first", method, path);
            return;
        }

        match self.resolver.callee_of(&self.scope, handler) {
            Ok(Callee::Function(handler)) => {
                debug!("Found route {} {} -> {}", method, path, handler.name);
                self.stubs.push(RouteStub { method, path, handler });
            }
            Ok(Callee::External(name)) => {
                self.fail(AnalysisError::unsupported(format!(
                    "handler {} of {} {} declared outside the crate",
                    name, method, path
                )));
            }
            Err(err) => self.fail(err),
        }
    }

    fn nest(&mut self, prefix: String, router: &Expr) {
        if let Expr::Call(call) = router {
            if self.depth >= MAX_NEST_DEPTH {
                warn!("Not following nested router under {}: too deep", prefix);
                return;
            }
            match self.resolver.callee_of(&self.scope, &call.func) {
                Ok(Callee::Function(function)) => {
                    let result = scan_function(
                        self.resolver,
                        &function,
                        prefix,
                        self.depth + 1,
                        self.is_denied,
                        self.stubs,
                    );
                    if let Err(err) = result {
                        self.fail(err);
                    }
                }
                Ok(Callee::External(name)) => debug!("Nested router {} is external", name),
                Err(err) => self.fail(err),
            }
            return;
        }

        // an inline router expression
        let outer = std::mem::replace(&mut self.prefix, prefix);
        self.visit_expr(router);
        self.prefix = outer;
    }

    fn fail(&mut self, err: AnalysisError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

impl<'ast> Visit<'ast> for RouterVisitor<'_> {
    fn visit_local(&mut self, local: &'ast syn::Local) {
        if let Some(init) = &local.init {
            let binding = match &local.pat {
                syn::Pat::Ident(ident) => Some(ident.ident.to_string()),
                syn::Pat::Type(typed) => match typed.pat.as_ref() {
                    syn::Pat::Ident(ident) => Some(ident.ident.to_string()),
                    _ => None,
                },
                _ => None,
            };
            let annotated = match &local.pat {
                syn::Pat::Type(typed) => is_router_type(&typed.ty),
                _ => false,
            };
            if let Some(name) = binding {
                match init.expr.as_ref() {
                    Expr::MethodCall(call) if call.method == "group" => {
                        let prefix = self.prefix_of(&init.expr);
                        debug!("Router group {} at {}", name, prefix);
                        self.groups.insert(name, prefix);
                    }
                    expr => {
                        if annotated || self.is_router_expr(expr) {
                            self.routers.insert(name);
                        }
                    }
                }
            }
        }
        visit::visit_local(self, local);
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        if self.error.is_some() {
            return;
        }

        let name = node.method.to_string();
        let registers = name == "route" || name == "nest" || HttpMethod::from_name(&name).is_some();
        let path = node
            .args
            .first()
            .and_then(string_literal)
            .filter(|_| registers && node.args.len() == 2);

        let Some(path) = path else {
            visit::visit_expr_method_call(self, node);
            return;
        };
        if !self.is_router_expr(&node.receiver) {
            debug!("Ignoring .{}(\"{}\", ..) on something other than a router", name, path);
            visit::visit_expr_method_call(self, node);
            return;
        }

        self.visit_expr(&node.receiver);
        let full = combine_paths(&self.prefix_of(&node.receiver), &path);
        match name.as_str() {
            "route" => {
                for (method, handler) in method_router(&node.args[1]) {
                    self.register(method, full.clone(), handler);
                }
            }
            "nest" => self.nest(full, &node.args[1]),
            _ => {
                if let Some(method) = HttpMethod::from_name(&name) {
                    self.register(method, full, &node.args[1]);
                }
            }
        }
    }

    fn visit_item(&mut self, _item: &'ast syn::Item) {}
}

/// `(method, handler)` pairs of a method router: `get(h)`, `get(h).post(h2)`, `routing::put(h)`
fn method_router(expr: &Expr) -> Vec<(HttpMethod, &Expr)> {
    match expr {
        Expr::Call(call) if call.args.len() == 1 => {
            let method = match call.func.as_ref() {
                Expr::Path(path) => path
                    .path
                    .segments
                    .last()
                    .and_then(|s| HttpMethod::from_name(&s.ident.to_string())),
                _ => None,
            };
            method.map(|m| vec![(m, &call.args[0])]).unwrap_or_default()
        }
        Expr::MethodCall(call) => {
            let mut pairs = method_router(&call.receiver);
            if call.args.len() == 1 {
                if let Some(method) = HttpMethod::from_name(&call.method.to_string()) {
                    pairs.push((method, &call.args[0]));
                }
            }
            pairs
        }
        Expr::Paren(paren) => method_router(&paren.expr),
        _ => Vec::new(),
    }
}

/// `Router`, `&mut Router`, `web::Router<State>`
fn is_router_type(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Reference(reference) => is_router_type(&reference.elem),
        syn::Type::Paren(paren) => is_router_type(&paren.elem),
        syn::Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == ROUTER_TYPE),
        _ => false,
    }
}

fn string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Str(s) => Some(s.value()),
            _ => None,
        },
        _ => None,
    }
}
