use super::declaration::{DeclarationKind, Lookup};
use super::types::{generic_names, StaticType};
use super::{expr_kind, Resolver, Scope};
use crate::error::{AnalysisError, Result};
use crate::packages::file::FileNode;
use crate::parser::doc_comment;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use syn::visit::Visit;

/// A call expression, either `f(args)` or `receiver.method(args)`.
#[derive(Debug, Clone, Copy)]
pub enum CallSite<'a> {
    Function(&'a syn::ExprCall),
    Method(&'a syn::ExprMethodCall),
}

impl<'a> CallSite<'a> {
    /// Positional arguments, not counting the receiver
    pub fn args(&self) -> Vec<&'a syn::Expr> {
        match self {
            CallSite::Function(call) => call.args.iter().collect(),
            CallSite::Method(call) => call.args.iter().collect(),
        }
    }

    /// Callee name as written: the method name, or the last path segment
    pub fn name(&self) -> String {
        match self {
            CallSite::Function(call) => match call.func.as_ref() {
                syn::Expr::Path(path) => path
                    .path
                    .segments
                    .last()
                    .map(|s| s.ident.to_string())
                    .unwrap_or_default(),
                other => expr_kind(other).to_string(),
            },
            CallSite::Method(call) => call.method.to_string(),
        }
    }

    pub fn receiver(&self) -> Option<&'a syn::Expr> {
        match self {
            CallSite::Function(_) => None,
            CallSite::Method(call) => Some(&call.receiver),
        }
    }

    /// Explicit type arguments (`parse::<u64>()`, `Vec::<User>::new()`)
    pub fn turbofish(&self) -> Vec<&'a syn::Type> {
        let args = match self {
            CallSite::Method(call) => call.turbofish.as_ref().map(|t| &t.args),
            CallSite::Function(call) => match call.func.as_ref() {
                syn::Expr::Path(path) => path.path.segments.iter().rev().find_map(|s| match &s.arguments {
                    syn::PathArguments::AngleBracketed(args) => Some(&args.args),
                    _ => None,
                }),
                _ => None,
            },
        };
        args.map(|args| {
            args.iter()
                .filter_map(|arg| match arg {
                    syn::GenericArgument::Type(ty) => Some(ty),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
    }
}

/// A function, method or closure the analysis can walk into.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    /// File the function is written in
    pub file: Arc<FileNode>,
    pub receiver: Option<syn::Receiver>,
    pub inputs: Vec<FnInput>,
    /// Declared return type; `None` for `()` or an unannotated closure
    pub output: Option<syn::Type>,
    pub body: FnBody,
    pub doc: Option<String>,
    pub generics: Vec<String>,
    pub self_type: Option<StaticType>,
    pub is_async: bool,
    /// For closures, the function whose locals they capture
    pub enclosing: Option<Arc<FunctionDecl>>,
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct FnInput {
    /// Bound name for simple `name: Type` parameters
    pub name: Option<String>,
    pub pat: syn::Pat,
    /// Declared type; closures may leave it out
    pub ty: Option<syn::Type>,
}

#[derive(Debug, Clone)]
pub enum FnBody {
    Block(Box<syn::Block>),
    Expr(Box<syn::Expr>),
}

impl FnBody {
    pub fn visit<'ast, V: Visit<'ast>>(&'ast self, visitor: &mut V) {
        match self {
            FnBody::Block(block) => visitor.visit_block(block),
            FnBody::Expr(expr) => visitor.visit_expr(expr),
        }
    }
}

impl FunctionDecl {
    pub fn from_item_fn(file: Arc<FileNode>, item: &syn::ItemFn) -> Arc<Self> {
        Arc::new(Self {
            name: item.sig.ident.to_string(),
            file,
            receiver: None,
            inputs: signature_inputs(&item.sig),
            output: return_type(&item.sig.output),
            body: FnBody::Block(item.block.clone()),
            doc: doc_comment(&item.attrs),
            generics: generic_names(&item.sig.generics),
            self_type: None,
            is_async: item.sig.asyncness.is_some(),
            enclosing: None,
        })
    }

    /// A method or associated function; `impl_scope` carries the impl's `Self` and generics
    pub fn from_impl_fn(impl_scope: &Scope, item: &syn::ImplItemFn) -> Arc<Self> {
        let mut generics = impl_scope.generics.clone();
        generics.extend(generic_names(&item.sig.generics));

        Arc::new(Self {
            name: item.sig.ident.to_string(),
            file: Arc::clone(&impl_scope.file),
            receiver: item.sig.receiver().cloned(),
            inputs: signature_inputs(&item.sig),
            output: return_type(&item.sig.output),
            body: FnBody::Block(Box::new(item.block.clone())),
            doc: doc_comment(&item.attrs),
            generics,
            self_type: impl_scope.self_type.clone(),
            is_async: item.sig.asyncness.is_some(),
            enclosing: None,
        })
    }

    /// A closure written inside `scope`; it sees the locals of the enclosing function
    pub fn from_closure(scope: &Scope, closure: &syn::ExprClosure) -> Arc<Self> {
        let inputs = closure
            .inputs
            .iter()
            .map(|pat| {
                let ty = match pat {
                    syn::Pat::Type(typed) => Some((*typed.ty).clone()),
                    _ => None,
                };
                FnInput {
                    name: pattern_name(pat),
                    pat: pat.clone(),
                    ty,
                }
            })
            .collect();

        Arc::new(Self {
            name: "<closure>".to_string(),
            file: Arc::clone(&scope.file),
            receiver: None,
            inputs,
            output: return_type(&closure.output),
            body: FnBody::Expr(closure.body.clone()),
            doc: None,
            generics: scope.generics.clone(),
            self_type: scope.self_type.clone(),
            is_async: closure.asyncness.is_some(),
            enclosing: scope.function.clone(),
        })
    }

    /// Scope of the function body
    pub fn scope(self: &Arc<Self>) -> Scope {
        Scope {
            file: Arc::clone(&self.file),
            function: Some(Arc::clone(self)),
            self_type: self.self_type.clone(),
            generics: self.generics.clone(),
        }
    }

    /// Module path the function is declared in
    pub fn package(&self) -> &str {
        &self.file.package_path
    }

    pub fn arguments(&self) -> &[FnInput] {
        &self.inputs
    }

    /// Declared result types: one per element of a tuple return, none for `()`
    pub fn results(&self) -> Vec<&syn::Type> {
        match &self.output {
            None => Vec::new(),
            Some(syn::Type::Tuple(tuple)) => tuple.elems.iter().collect(),
            Some(ty) => vec![ty],
        }
    }
}

fn signature_inputs(sig: &syn::Signature) -> Vec<FnInput> {
    sig.inputs
        .iter()
        .filter_map(|arg| match arg {
            syn::FnArg::Typed(typed) => Some(FnInput {
                name: pattern_name(&typed.pat),
                pat: (*typed.pat).clone(),
                ty: Some((*typed.ty).clone()),
            }),
            syn::FnArg::Receiver(_) => None,
        })
        .collect()
}

fn return_type(output: &syn::ReturnType) -> Option<syn::Type> {
    match output {
        syn::ReturnType::Default => None,
        syn::ReturnType::Type(_, ty) => match ty.as_ref() {
            syn::Type::Tuple(tuple) if tuple.elems.is_empty() => None,
            other => Some(other.clone()),
        },
    }
}

fn pattern_name(pat: &syn::Pat) -> Option<String> {
    match pat {
        syn::Pat::Ident(ident) => Some(ident.ident.to_string()),
        syn::Pat::Type(typed) => pattern_name(&typed.pat),
        _ => None,
    }
}

/// What a call resolves to.
#[derive(Debug, Clone)]
pub enum Callee {
    /// A function, method or closure of the analyzed crate
    Function(Arc<FunctionDecl>),
    /// Something declared in a dependency, by path (`serde_json::to_string`, `String::len`)
    External(String),
}

/// A callee's lowered signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Type of `self` for methods (`&Self` → pointer)
    pub receiver: Option<StaticType>,
    pub params: Vec<StaticType>,
    pub results: Vec<StaticType>,
    pub is_async: bool,
}

impl Signature {
    pub fn is_method(&self) -> bool {
        self.receiver.is_some()
    }

    pub fn return_type(&self, index: usize) -> Result<&StaticType> {
        self.results.get(index).ok_or(AnalysisError::Index {
            what: "results".to_string(),
            index,
            len: self.results.len(),
        })
    }

    pub fn arg_type(&self, index: usize) -> Result<&StaticType> {
        self.params.get(index).ok_or(AnalysisError::Index {
            what: "arguments".to_string(),
            index,
            len: self.params.len(),
        })
    }

    /// The value a call produces: unit, the single result, or a tuple of results
    pub fn output(&self) -> StaticType {
        match self.results.as_slice() {
            [] => StaticType::Unit,
            [single] => single.clone(),
            many => StaticType::Tuple(many.to_vec()),
        }
    }
}

impl Resolver {
    /// Looks up a free function declared directly in a module
    pub fn function_named(&mut self, package: &str, name: &str) -> Result<Arc<FunctionDecl>> {
        let package = self.package(package)?;
        match package.item(name) {
            Some((file, syn::Item::Fn(item))) => Ok(FunctionDecl::from_item_fn(Arc::clone(file), item)),
            Some(_) => Err(AnalysisError::structural(
                format!("function {}", name),
                "another kind of item",
            )),
            None => Err(AnalysisError::unresolved(format!("{}::{}", package.path, name))),
        }
    }

    /// Resolves the function a call invokes.
    ///
    /// # Errors
    ///
    /// Returns a structural error when the callee is not something callable (a struct
    /// constructor, a number), and a resolution error when a crate path or method cannot be
    /// found.
    pub fn call_function(&mut self, scope: &Scope, call: CallSite<'_>) -> Result<Callee> {
        match call {
            CallSite::Function(call) => self.callee_of(scope, &call.func),
            CallSite::Method(call) => {
                let receiver = self.expression_type(scope, &call.receiver)?;
                self.method_of(&receiver, &call.method.to_string())
            }
        }
    }

    /// The function a callee expression (path, closure, closure-bound local) denotes
    pub(crate) fn callee_of(&mut self, scope: &Scope, func: &syn::Expr) -> Result<Callee> {
        match func {
            syn::Expr::Paren(paren) => self.callee_of(scope, &paren.expr),
            syn::Expr::Closure(closure) => Ok(Callee::Function(FunctionDecl::from_closure(scope, closure))),
            syn::Expr::Path(path) if path.qself.is_none() => {
                let declaration = match self.lookup_path(scope, &path.path)? {
                    Lookup::External(path) => return Ok(Callee::External(path)),
                    Lookup::Declared(declaration) => declaration,
                };
                match &declaration.kind {
                    DeclarationKind::Function(func) => Ok(Callee::Function(Arc::clone(func))),
                    DeclarationKind::Local { .. } => match declaration.initializer()? {
                        syn::Expr::Closure(closure) => Ok(Callee::Function(FunctionDecl::from_closure(
                            &declaration.scope,
                            closure,
                        ))),
                        other => Err(AnalysisError::structural(
                            format!("closure bound to {}", declaration.name),
                            expr_kind(other),
                        )),
                    },
                    other => Err(AnalysisError::structural(
                        "function",
                        format!("{} {}", other.describe(), declaration.name),
                    )),
                }
            }
            other => Err(AnalysisError::structural("callee", expr_kind(other))),
        }
    }

    /// Finds `method` on a receiver of type `receiver`, looking through pointers
    pub fn method_of(&mut self, receiver: &StaticType, method: &str) -> Result<Callee> {
        let Some(owner) = receiver.peel_pointers().as_named().cloned() else {
            return Ok(Callee::External(format!("{}::{}", receiver.peel_pointers(), method)));
        };

        match self.find_impl_member(&owner, method)? {
            Some((impl_scope, syn::ImplItem::Fn(item))) => {
                Ok(Callee::Function(FunctionDecl::from_impl_fn(&impl_scope, &item)))
            }
            _ if crate::packages::PackageGraph::is_local(&owner.package) => {
                // derived or blanket trait methods (`clone`, `to_string`) live outside the crate
                debug!("No method {} on {} in the crate", method, owner.name);
                Ok(Callee::External(format!("{}::{}", owner.name, method)))
            }
            _ => Ok(Callee::External(format!(
                "{}::{}::{}",
                owner.package, owner.name, method
            ))),
        }
    }

    /// Lowered signature of the function a call invokes.
    ///
    /// For methods on generic types the receiver's type arguments are substituted.
    pub fn call_signature(&mut self, scope: &Scope, call: CallSite<'_>) -> Result<Signature> {
        let callee = self.call_function(scope, call)?;
        let func = match callee {
            Callee::Function(func) => func,
            Callee::External(path) => {
                return Err(AnalysisError::unresolved(format!(
                    "signature of {} (declared outside the analyzed crate)",
                    path
                )))
            }
        };

        let signature = self.function_signature(&func)?;
        let bindings = match call {
            CallSite::Method(call) => {
                let receiver = self.expression_type(scope, &call.receiver)?;
                receiver_bindings(func.self_type.as_ref(), &receiver)
            }
            CallSite::Function(call) => match call.func.as_ref() {
                syn::Expr::Path(path) if path.path.segments.len() > 1 => {
                    self.path_owner_bindings(scope, &func, &path.path)
                }
                _ => HashMap::new(),
            },
        };

        if bindings.is_empty() {
            return Ok(signature);
        }
        Ok(Signature {
            receiver: signature.receiver.map(|t| t.substitute(&bindings)),
            params: signature.params.iter().map(|t| t.substitute(&bindings)).collect(),
            results: signature.results.iter().map(|t| t.substitute(&bindings)).collect(),
            is_async: signature.is_async,
        })
    }

    /// Generic bindings written on the type segment of `Page::<User>::new()`
    fn path_owner_bindings(
        &mut self,
        scope: &Scope,
        func: &FunctionDecl,
        path: &syn::Path,
    ) -> HashMap<String, StaticType> {
        let owner_segment = &path.segments[path.segments.len() - 2];
        if matches!(owner_segment.arguments, syn::PathArguments::None) {
            return HashMap::new();
        }
        let owner_path = syn::Path {
            leading_colon: path.leading_colon,
            segments: path.segments.iter().take(path.segments.len() - 1).cloned().collect(),
        };
        match self.lower_path(scope, &owner_path) {
            Ok(owner) => receiver_bindings(func.self_type.as_ref(), &owner),
            Err(_) => HashMap::new(),
        }
    }

    /// Lowers a function's declared parameter and result types in its own scope
    pub fn function_signature(&mut self, func: &Arc<FunctionDecl>) -> Result<Signature> {
        let scope = func.scope();

        let receiver = match &func.receiver {
            Some(receiver) => {
                let self_type = func
                    .self_type
                    .clone()
                    .ok_or_else(|| AnalysisError::unresolved("self outside of an impl block"))?;
                Some(if receiver.reference.is_some() {
                    StaticType::pointer(self_type)
                } else {
                    self_type
                })
            }
            None => None,
        };

        let mut params = Vec::with_capacity(func.inputs.len());
        for input in &func.inputs {
            params.push(match &input.ty {
                Some(ty) => self.lower_type(&scope, ty)?,
                None => StaticType::Generic("_".to_string()),
            });
        }

        let mut results = Vec::new();
        for ty in func.results() {
            results.push(self.lower_type(&scope, ty)?);
        }

        Ok(Signature {
            receiver,
            params,
            results,
            is_async: func.is_async,
        })
    }

    pub fn call_return_type(&mut self, scope: &Scope, call: CallSite<'_>, index: usize) -> Result<StaticType> {
        let signature = self.call_signature(scope, call)?;
        signature.return_type(index).cloned()
    }

    pub fn call_arg_type(&mut self, scope: &Scope, call: CallSite<'_>, index: usize) -> Result<StaticType> {
        let signature = self.call_signature(scope, call)?;
        signature.arg_type(index).cloned()
    }

    /// Name of the first parameter whose declared type is `package::type_name`.
    ///
    /// With `is_pointer` a parameter behind one level of reference or smart pointer also
    /// matches. Returns an empty string when no parameter matches; parameters whose types
    /// cannot be lowered are skipped.
    pub fn find_argument_name_by_type(
        &mut self,
        func: &Arc<FunctionDecl>,
        type_name: &str,
        package: &str,
        is_pointer: bool,
    ) -> String {
        let scope = func.scope();
        for input in &func.inputs {
            let (Some(name), Some(ty)) = (&input.name, &input.ty) else {
                continue;
            };
            let lowered = match self.lower_type(&scope, ty) {
                Ok(lowered) => lowered,
                Err(err) => {
                    debug!("Skipping parameter {} of {}: {}", name, func.name, err);
                    continue;
                }
            };
            let candidate = match (&lowered, is_pointer) {
                (StaticType::Pointer(inner), true) => inner.as_ref(),
                (other, _) => other,
            };
            if let StaticType::Named(named) = candidate {
                if named.is(package, type_name) {
                    return name.clone();
                }
            }
        }
        String::new()
    }
}

/// Binds the generic parameters of an impl's self type to a concrete receiver's arguments
fn receiver_bindings(impl_self: Option<&StaticType>, receiver: &StaticType) -> HashMap<String, StaticType> {
    let (Some(impl_self), Some(actual)) = (impl_self.and_then(|t| t.as_named()), receiver.as_named()) else {
        return HashMap::new();
    };
    impl_self
        .args
        .iter()
        .zip(actual.args.iter())
        .filter_map(|(param, arg)| match param {
            StaticType::Generic(name) => Some((name.clone(), arg.clone())),
            _ => None,
        })
        .collect()
}
