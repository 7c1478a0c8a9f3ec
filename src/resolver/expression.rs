use super::call::{CallSite, Callee};
use super::declaration::{DeclarationKind, Lookup};
use super::path::PathTarget;
use super::types::{NamedType, PrimitiveType, StaticType};
use super::{expr_kind, Resolver, Scope};
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use syn::punctuated::Punctuated;

/// A compile-time value an expression evaluates to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Int(n) => write!(f, "{}", n),
            ConstValue::Float(x) => write!(f, "{}", x),
            ConstValue::Str(s) => write!(f, "{}", s),
            ConstValue::Char(c) => write!(f, "{}", c),
        }
    }
}

/// A name split into its owning module, leaf, and the names leading to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarName {
    pub package: String,
    pub name: String,
    /// Intermediate names, outermost first (`["config", "server"]` for `config.server.port`)
    pub path: Vec<String>,
}

/// Numeric value of an `http::StatusCode` associated constant
pub fn http_status_code(name: &str) -> Option<u16> {
    let code = match name {
        "CONTINUE" => 100,
        "SWITCHING_PROTOCOLS" => 101,
        "OK" => 200,
        "CREATED" => 201,
        "ACCEPTED" => 202,
        "NON_AUTHORITATIVE_INFORMATION" => 203,
        "NO_CONTENT" => 204,
        "RESET_CONTENT" => 205,
        "PARTIAL_CONTENT" => 206,
        "MULTIPLE_CHOICES" => 300,
        "MOVED_PERMANENTLY" => 301,
        "FOUND" => 302,
        "SEE_OTHER" => 303,
        "NOT_MODIFIED" => 304,
        "TEMPORARY_REDIRECT" => 307,
        "PERMANENT_REDIRECT" => 308,
        "BAD_REQUEST" => 400,
        "UNAUTHORIZED" => 401,
        "PAYMENT_REQUIRED" => 402,
        "FORBIDDEN" => 403,
        "NOT_FOUND" => 404,
        "METHOD_NOT_ALLOWED" => 405,
        "NOT_ACCEPTABLE" => 406,
        "REQUEST_TIMEOUT" => 408,
        "CONFLICT" => 409,
        "GONE" => 410,
        "LENGTH_REQUIRED" => 411,
        "PRECONDITION_FAILED" => 412,
        "PAYLOAD_TOO_LARGE" => 413,
        "URI_TOO_LONG" => 414,
        "UNSUPPORTED_MEDIA_TYPE" => 415,
        "UNPROCESSABLE_ENTITY" => 422,
        "LOCKED" => 423,
        "TOO_MANY_REQUESTS" => 429,
        "INTERNAL_SERVER_ERROR" => 500,
        "NOT_IMPLEMENTED" => 501,
        "BAD_GATEWAY" => 502,
        "SERVICE_UNAVAILABLE" => 503,
        "GATEWAY_TIMEOUT" => 504,
        _ => return None,
    };
    Some(code)
}

/// Methods whose result has the same type as the receiver (minus one reference for the
/// owning conversions)
const SAME_TYPE_METHODS: &[&str] = &["clone", "to_owned", "cloned", "copied", "as_ref", "borrow", "as_mut"];

const BOOL_METHODS: &[&str] = &[
    "is_empty",
    "contains",
    "contains_key",
    "starts_with",
    "ends_with",
    "is_some",
    "is_none",
    "is_ok",
    "is_err",
    "eq",
    "ne",
    "any",
    "all",
];

const STRING_METHODS: &[&str] = &["to_string", "to_uppercase", "to_lowercase", "repeat", "replace"];

impl Resolver {
    /// Splits a path or field-access chain into (package, leaf, intermediates).
    ///
    /// A leading module prefix (`limits::MAX_PAGE`, or an imported const) decides the package;
    /// a local chain (`settings.server.port`) stays in the scope's package.
    pub fn extract_var_name(&mut self, scope: &Scope, expr: &syn::Expr) -> Result<VarName> {
        match expr {
            syn::Expr::Paren(inner) => self.extract_var_name(scope, &inner.expr),
            syn::Expr::Reference(inner) => self.extract_var_name(scope, &inner.expr),
            syn::Expr::Group(inner) => self.extract_var_name(scope, &inner.expr),
            syn::Expr::Field(field) => {
                let mut base = self.extract_var_name(scope, &field.base)?;
                base.path.push(base.name);
                base.name = match &field.member {
                    syn::Member::Named(ident) => ident.to_string(),
                    syn::Member::Unnamed(index) => index.index.to_string(),
                };
                Ok(base)
            }
            syn::Expr::Path(path) if path.qself.is_none() => {
                let segments: Vec<String> =
                    path.path.segments.iter().map(|s| s.ident.to_string()).collect();

                if segments.len() == 1 {
                    if let Some(function) = &scope.function {
                        if function.local_binding(&segments[0]).is_some() {
                            return Ok(VarName {
                                package: scope.package_path().to_string(),
                                name: segments[0].clone(),
                                path: Vec::new(),
                            });
                        }
                    }
                }

                let (package, name, rest) = match self.resolve_path(scope, &segments)? {
                    PathTarget::Item { package, name, rest } => (package.path.clone(), name, rest),
                    PathTarget::External { package, name, rest } => (package, name, rest),
                    PathTarget::Module(package) => {
                        return Err(AnalysisError::structural(
                            "variable or constant",
                            format!("module {}", package.path),
                        ))
                    }
                };
                let mut chain = vec![name];
                chain.extend(rest);
                let name = chain.pop().unwrap_or_default();
                Ok(VarName {
                    package,
                    name,
                    path: chain,
                })
            }
            other => Err(AnalysisError::structural(
                "identifier or field access",
                expr_kind(other),
            )),
        }
    }

    /// Evaluates an expression to a constant.
    ///
    /// Literals, unary and binary arithmetic, casts and paths to consts, statics, associated
    /// consts and `let` bindings are followed across modules; `StatusCode::NAME` evaluates to
    /// its numeric code.
    pub fn expression_value(&mut self, scope: &Scope, expr: &syn::Expr) -> Result<ConstValue> {
        match expr {
            syn::Expr::Lit(lit) => lit_value(&lit.lit),
            syn::Expr::Paren(inner) => self.expression_value(scope, &inner.expr),
            syn::Expr::Group(inner) => self.expression_value(scope, &inner.expr),
            syn::Expr::Reference(inner) => self.expression_value(scope, &inner.expr),
            syn::Expr::Unary(unary) => {
                let value = self.expression_value(scope, &unary.expr)?;
                match (&unary.op, value) {
                    (syn::UnOp::Neg(_), ConstValue::Int(n)) => Ok(ConstValue::Int(-n)),
                    (syn::UnOp::Neg(_), ConstValue::Float(x)) => Ok(ConstValue::Float(-x)),
                    (syn::UnOp::Not(_), ConstValue::Bool(b)) => Ok(ConstValue::Bool(!b)),
                    (syn::UnOp::Not(_), ConstValue::Int(n)) => Ok(ConstValue::Int(!n)),
                    (syn::UnOp::Deref(_), value) => Ok(value),
                    (_, value) => Err(AnalysisError::unsupported(format!(
                        "unary operation on constant {}",
                        value
                    ))),
                }
            }
            syn::Expr::Binary(binary) => {
                let left = self.expression_value(scope, &binary.left)?;
                let right = self.expression_value(scope, &binary.right)?;
                binary_value(&binary.op, left, right)
            }
            syn::Expr::Cast(cast) => {
                let value = self.expression_value(scope, &cast.expr)?;
                let target = match cast.ty.as_ref() {
                    syn::Type::Path(path) => path
                        .path
                        .get_ident()
                        .and_then(|ident| PrimitiveType::from_name(&ident.to_string())),
                    _ => None,
                };
                Ok(match (target, value) {
                    (Some(PrimitiveType::F32 | PrimitiveType::F64), ConstValue::Int(n)) => {
                        ConstValue::Float(n as f64)
                    }
                    (Some(p), ConstValue::Float(x)) if p.is_integer() => ConstValue::Int(x as i64),
                    (Some(p), ConstValue::Char(c)) if p.is_integer() => ConstValue::Int(c as i64),
                    (_, value) => value,
                })
            }
            syn::Expr::Block(block) if block.block.stmts.len() == 1 => match &block.block.stmts[0] {
                syn::Stmt::Expr(inner, None) => self.expression_value(scope, inner),
                _ => Err(AnalysisError::unsupported("constant evaluation of a block")),
            },
            syn::Expr::MethodCall(call)
                if matches!(
                    call.method.to_string().as_str(),
                    "to_string" | "to_owned" | "into" | "clone" | "as_str" | "as_u16"
                ) && call.args.is_empty() =>
            {
                self.expression_value(scope, &call.receiver)
            }
            syn::Expr::Path(path) if path.qself.is_none() => {
                self.guarded("constant value", |resolver| resolver.path_value(scope, &path.path))
            }
            syn::Expr::Field(_) => {
                let declaration = self.find_declaration(scope, expr)?;
                Err(AnalysisError::unsupported(format!(
                    "constant evaluation of {} {}",
                    declaration.kind.describe(),
                    declaration.name
                )))
            }
            other => Err(AnalysisError::unsupported(format!(
                "constant evaluation of {}",
                expr_kind(other)
            ))),
        }
    }

    fn path_value(&mut self, scope: &Scope, path: &syn::Path) -> Result<ConstValue> {
        let declaration = match self.lookup_path(scope, path)? {
            Lookup::Declared(declaration) => declaration,
            Lookup::External(full) => {
                let mut segments = full.rsplit("::");
                let constant = segments.next().unwrap_or_default();
                if segments.next() == Some("StatusCode") {
                    if let Some(code) = http_status_code(constant) {
                        return Ok(ConstValue::Int(code as i64));
                    }
                }
                return Err(AnalysisError::unresolved(format!(
                    "value of {} (declared outside the analyzed crate)",
                    full
                )));
            }
        };

        match &declaration.kind {
            DeclarationKind::Variant { variant, .. } => match &variant.discriminant {
                Some((_, discriminant)) => self.expression_value(&declaration.scope, discriminant),
                None => Ok(ConstValue::Str(variant.ident.to_string())),
            },
            _ => {
                let init = declaration.initializer()?;
                self.expression_value(&declaration.scope, init)
            }
        }
    }

    /// Static type of an expression.
    ///
    /// # Errors
    ///
    /// Returns an unsupported-shape error for expressions whose type cannot be known without
    /// inference (`.into()`, `Default::default()`, ranges), and propagates resolution errors.
    pub fn expression_type(&mut self, scope: &Scope, expr: &syn::Expr) -> Result<StaticType> {
        self.guarded("expression type", |resolver| resolver.type_of(scope, expr))
    }

    fn type_of(&mut self, scope: &Scope, expr: &syn::Expr) -> Result<StaticType> {
        match expr {
            syn::Expr::Lit(lit) => Ok(lit_type(&lit.lit)),
            syn::Expr::Paren(inner) => self.expression_type(scope, &inner.expr),
            syn::Expr::Group(inner) => self.expression_type(scope, &inner.expr),
            syn::Expr::Reference(inner) => {
                Ok(StaticType::pointer(self.expression_type(scope, &inner.expr)?))
            }
            syn::Expr::Unary(unary) => {
                let inner = self.expression_type(scope, &unary.expr)?;
                match (&unary.op, inner) {
                    (syn::UnOp::Deref(_), StaticType::Pointer(target)) => Ok(*target),
                    (_, inner) => Ok(inner),
                }
            }
            syn::Expr::Binary(binary) => match binary.op {
                syn::BinOp::Eq(_)
                | syn::BinOp::Ne(_)
                | syn::BinOp::Lt(_)
                | syn::BinOp::Le(_)
                | syn::BinOp::Gt(_)
                | syn::BinOp::Ge(_)
                | syn::BinOp::And(_)
                | syn::BinOp::Or(_) => Ok(StaticType::Primitive(PrimitiveType::Bool)),
                _ => self.expression_type(scope, &binary.left),
            },
            syn::Expr::Cast(cast) => self.lower_type(scope, &cast.ty),
            syn::Expr::Struct(literal) if literal.qself.is_none() => {
                self.struct_literal_type(scope, &literal.path)
            }
            syn::Expr::Tuple(tuple) if tuple.elems.is_empty() => Ok(StaticType::Unit),
            syn::Expr::Tuple(tuple) => {
                let items = tuple
                    .elems
                    .iter()
                    .map(|elem| self.expression_type(scope, elem))
                    .collect::<Result<Vec<_>>>()?;
                Ok(StaticType::Tuple(items))
            }
            syn::Expr::Array(array) => {
                let elem = match array.elems.first() {
                    Some(first) => self.expression_type(scope, first)?,
                    None => StaticType::Generic("_".to_string()),
                };
                Ok(StaticType::Array(Box::new(elem), array.elems.len()))
            }
            syn::Expr::Repeat(repeat) => {
                let elem = self.expression_type(scope, &repeat.expr)?;
                let len = self
                    .expression_value(scope, &repeat.len)?
                    .as_int()
                    .ok_or_else(|| AnalysisError::structural("array length", "non-integer constant"))?;
                Ok(StaticType::Array(Box::new(elem), len.max(0) as usize))
            }
            syn::Expr::Call(call) => self.call_type(scope, call),
            syn::Expr::MethodCall(call) => self.method_call_type(scope, call),
            syn::Expr::Field(field) => {
                let base = self.expression_type(scope, &field.base)?;
                if let (StaticType::Tuple(items), syn::Member::Unnamed(index)) =
                    (base.peel_pointers(), &field.member)
                {
                    let position = index.index as usize;
                    return items.get(position).cloned().ok_or(AnalysisError::Index {
                        what: "tuple fields".to_string(),
                        index: position,
                        len: items.len(),
                    });
                }
                let declaration = self.field_declaration(&base, &field.member)?;
                self.declaration_type(&declaration)
            }
            syn::Expr::Index(index) => {
                let base = self.expression_type(scope, &index.expr)?;
                match base.peel_pointers() {
                    StaticType::Slice(elem) | StaticType::Array(elem, _) => Ok((**elem).clone()),
                    StaticType::Map(_, value) => Ok((**value).clone()),
                    other => Err(AnalysisError::structural(
                        "indexable value",
                        format!("value of type {}", other),
                    )),
                }
            }
            syn::Expr::Try(try_expr) => {
                let inner = self.expression_type(scope, &try_expr.expr)?;
                match inner {
                    StaticType::Fallible(ok, _) | StaticType::Optional(ok) => Ok(*ok),
                    other => Err(AnalysisError::structural(
                        "Result or Option before `?`",
                        format!("value of type {}", other),
                    )),
                }
            }
            syn::Expr::Await(await_expr) => self.expression_type(scope, &await_expr.base),
            syn::Expr::Macro(mac) => self.macro_type(scope, &mac.mac),
            syn::Expr::Block(block) => self.block_type(scope, &block.block),
            syn::Expr::Unsafe(block) => self.block_type(scope, &block.block),
            syn::Expr::If(if_expr) => self.block_type(scope, &if_expr.then_branch),
            syn::Expr::Closure(_) => Ok(StaticType::Interface("Fn".to_string())),
            syn::Expr::Path(path) if path.qself.is_none() => self.path_type(scope, &path.path),
            other => Err(AnalysisError::unsupported(format!(
                "type of {}",
                expr_kind(other)
            ))),
        }
    }

    fn block_type(&mut self, scope: &Scope, block: &syn::Block) -> Result<StaticType> {
        match block.stmts.last() {
            Some(syn::Stmt::Expr(tail, None)) => self.expression_type(scope, tail),
            _ => Ok(StaticType::Unit),
        }
    }

    fn path_type(&mut self, scope: &Scope, path: &syn::Path) -> Result<StaticType> {
        match self.lookup_path(scope, path)? {
            Lookup::Declared(declaration) => self.declaration_type(&declaration),
            Lookup::External(full) => {
                // `StatusCode::OK`, `Duration::ZERO`: associated constants of their own type
                let segments: Vec<String> = full.split("::").map(str::to_string).collect();
                match self.resolve_path(scope, &segments)? {
                    PathTarget::External { package, name, rest } if !rest.is_empty() => {
                        Ok(StaticType::Named(NamedType::new(package, name)))
                    }
                    _ => Err(AnalysisError::unsupported(format!(
                        "type of {} (declared outside the analyzed crate)",
                        full
                    ))),
                }
            }
        }
    }

    fn struct_literal_type(&mut self, scope: &Scope, path: &syn::Path) -> Result<StaticType> {
        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        if segments.len() == 1 && segments[0] == "Self" {
            return scope
                .self_type
                .clone()
                .ok_or_else(|| AnalysisError::unresolved("Self outside of an impl block"));
        }
        match self.resolve_path(scope, &segments)? {
            PathTarget::Item { package, name, .. } => {
                Ok(StaticType::Named(NamedType::new(package.path.clone(), name)))
            }
            PathTarget::External { package, name, .. } => {
                Ok(StaticType::Named(NamedType::new(package, name)))
            }
            PathTarget::Module(package) => {
                Err(AnalysisError::structural("struct", format!("module {}", package.path)))
            }
        }
    }

    fn call_type(&mut self, scope: &Scope, call: &syn::ExprCall) -> Result<StaticType> {
        let site = CallSite::Function(call);
        let first_arg = |resolver: &mut Self| -> Result<StaticType> {
            let arg = call
                .args
                .first()
                .ok_or_else(|| AnalysisError::structural("constructor argument", "none"))?;
            resolver.expression_type(scope, arg)
        };

        if let syn::Expr::Path(path) = call.func.as_ref() {
            let segments: Vec<String> = path.path.segments.iter().map(|s| s.ident.to_string()).collect();
            let names: Vec<&str> = segments.iter().map(String::as_str).collect();
            let turbofish = site.turbofish();
            let explicit = |resolver: &mut Self, index: usize| -> Result<StaticType> {
                match turbofish.get(index) {
                    Some(ty) => resolver.lower_type(scope, ty),
                    None => Ok(StaticType::Generic("_".to_string())),
                }
            };

            match names.as_slice() {
                ["Some"] => return Ok(StaticType::optional(first_arg(self)?)),
                ["Ok"] => {
                    return Ok(StaticType::Fallible(
                        Box::new(first_arg(self)?),
                        Box::new(StaticType::Generic("E".to_string())),
                    ))
                }
                ["Err"] => {
                    return Ok(StaticType::Fallible(
                        Box::new(StaticType::Generic("T".to_string())),
                        Box::new(first_arg(self)?),
                    ))
                }
                [.., "Box" | "Rc" | "Arc", "new"] => return Ok(StaticType::pointer(first_arg(self)?)),
                [.., "String", "new" | "from" | "with_capacity" | "from_utf8_lossy"] => {
                    return Ok(StaticType::string())
                }
                [.., "Vec" | "VecDeque" | "HashSet" | "BTreeSet", "new" | "with_capacity"] => {
                    return Ok(StaticType::slice(explicit(self, 0)?))
                }
                [.., "HashMap" | "BTreeMap" | "IndexMap", "new" | "with_capacity"] => {
                    return Ok(StaticType::Map(
                        Box::new(explicit(self, 0)?),
                        Box::new(explicit(self, 1)?),
                    ))
                }
                [.., owner, "default"] if *owner != "Default" => {
                    let owner_path = syn::Path {
                        leading_colon: path.path.leading_colon,
                        segments: path
                            .path
                            .segments
                            .iter()
                            .take(path.path.segments.len() - 1)
                            .cloned()
                            .collect(),
                    };
                    let owner = self.lower_path(scope, &owner_path)?;
                    if let Some(named) = owner.as_named() {
                        if self.find_impl_member(named, "default")?.is_none() {
                            return Ok(owner);
                        }
                    } else {
                        return Ok(owner);
                    }
                }
                _ => {}
            }

            if let Lookup::Declared(declaration) = self.lookup_path(scope, &path.path)? {
                match &declaration.kind {
                    // tuple struct and tuple variant constructors
                    DeclarationKind::Struct(_) | DeclarationKind::Variant { .. } => {
                        return self.declaration_type(&declaration)
                    }
                    _ => {}
                }
            }
        }

        match self.call_function(scope, site)? {
            Callee::Function(_) => Ok(self.call_signature(scope, site)?.output()),
            Callee::External(path) => Err(AnalysisError::unsupported(format!(
                "type of call to {} (declared outside the analyzed crate)",
                path
            ))),
        }
    }

    fn method_call_type(&mut self, scope: &Scope, call: &syn::ExprMethodCall) -> Result<StaticType> {
        let method = call.method.to_string();
        let site = CallSite::Method(call);

        if let Some(ty) = site.turbofish().first() {
            if matches!(method.as_str(), "parse" | "collect" | "into" | "json") {
                return self.lower_type(scope, ty);
            }
        }

        match method.as_str() {
            "len" | "count" | "capacity" => return Ok(StaticType::Primitive(PrimitiveType::Usize)),
            m if BOOL_METHODS.contains(&m) => return Ok(StaticType::Primitive(PrimitiveType::Bool)),
            m if STRING_METHODS.contains(&m) => return Ok(StaticType::string()),
            "trim" | "as_str" | "trim_start" | "trim_end" => {
                return Ok(StaticType::pointer(StaticType::string()))
            }
            _ => {}
        }

        let receiver = self.expression_type(scope, &call.receiver)?;

        if let Callee::Function(_) = self.method_of(&receiver, &method)? {
            return Ok(self.call_signature(scope, site)?.output());
        }

        let value = receiver.peel_pointers().clone();
        match (method.as_str(), value) {
            (m, value) if SAME_TYPE_METHODS.contains(&m) => match (m, value) {
                ("cloned" | "copied", StaticType::Optional(inner)) => {
                    Ok(StaticType::optional(inner.peel_pointers().clone()))
                }
                (_, value) => Ok(value),
            },
            ("unwrap" | "expect" | "unwrap_or" | "unwrap_or_default" | "unwrap_or_else", StaticType::Optional(inner))
            | ("unwrap" | "expect" | "unwrap_or" | "unwrap_or_default" | "unwrap_or_else", StaticType::Fallible(inner, _)) => {
                Ok(*inner)
            }
            ("ok", StaticType::Fallible(ok, _)) => Ok(StaticType::Optional(ok)),
            ("err", StaticType::Fallible(_, err)) => Ok(StaticType::Optional(err)),
            ("first" | "last" | "get", StaticType::Slice(elem) | StaticType::Array(elem, _)) => {
                Ok(StaticType::optional(StaticType::Pointer(elem)))
            }
            ("get", StaticType::Map(_, value)) => Ok(StaticType::optional(StaticType::Pointer(value))),
            ("keys", StaticType::Map(key, _)) => Ok(StaticType::slice(*key)),
            ("values", StaticType::Map(_, value)) => Ok(StaticType::slice(*value)),
            (_, value) => Err(AnalysisError::unsupported(format!(
                "type of method {} on {}",
                method, value
            ))),
        }
    }

    fn macro_type(&mut self, scope: &Scope, mac: &syn::Macro) -> Result<StaticType> {
        let name = mac
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_default();

        match name.as_str() {
            "format" => Ok(StaticType::string()),
            "json" => Ok(StaticType::Interface("serde_json::Value".to_string())),
            "concat" | "stringify" | "include_str" | "env" => {
                Ok(StaticType::pointer(StaticType::string()))
            }
            "vec" => {
                let first = vec_macro_elements(mac)?.into_iter().next();
                let elem = match first {
                    Some(first) => self.expression_type(scope, &first)?,
                    None => StaticType::Generic("_".to_string()),
                };
                Ok(StaticType::slice(elem))
            }
            other => Err(AnalysisError::unsupported(format!("type of macro {}!", other))),
        }
    }
}

/// Elements of a `vec![..]` invocation; `vec![x; n]` yields just `x`
pub(crate) fn vec_macro_elements(mac: &syn::Macro) -> Result<Vec<syn::Expr>> {
    let parse_error = |e: syn::Error| AnalysisError::structural("vec! elements", e.to_string());

    if let Ok(value) = mac.parse_body_with(parse_repeat) {
        return Ok(vec![value]);
    }

    let elements = mac
        .parse_body_with(Punctuated::<syn::Expr, syn::Token![,]>::parse_terminated)
        .map_err(parse_error)?;
    Ok(elements.into_iter().collect())
}

fn parse_repeat(input: syn::parse::ParseStream) -> syn::Result<syn::Expr> {
    let value: syn::Expr = input.parse()?;
    input.parse::<syn::Token![;]>()?;
    let _len: syn::Expr = input.parse()?;
    Ok(value)
}

fn lit_value(lit: &syn::Lit) -> Result<ConstValue> {
    let invalid = |e: syn::Error| AnalysisError::structural("numeric literal", e.to_string());
    match lit {
        syn::Lit::Str(s) => Ok(ConstValue::Str(s.value())),
        syn::Lit::Int(i) => i.base10_parse::<i64>().map(ConstValue::Int).map_err(invalid),
        syn::Lit::Float(f) => f.base10_parse::<f64>().map(ConstValue::Float).map_err(invalid),
        syn::Lit::Bool(b) => Ok(ConstValue::Bool(b.value)),
        syn::Lit::Char(c) => Ok(ConstValue::Char(c.value())),
        syn::Lit::Byte(b) => Ok(ConstValue::Int(b.value() as i64)),
        _ => Err(AnalysisError::unsupported("constant evaluation of a byte string literal")),
    }
}

fn lit_type(lit: &syn::Lit) -> StaticType {
    match lit {
        syn::Lit::Str(_) => StaticType::pointer(StaticType::string()),
        syn::Lit::Int(i) => StaticType::Primitive(
            PrimitiveType::from_name(i.suffix()).unwrap_or(PrimitiveType::I32),
        ),
        syn::Lit::Float(f) => StaticType::Primitive(
            PrimitiveType::from_name(f.suffix()).unwrap_or(PrimitiveType::F64),
        ),
        syn::Lit::Bool(_) => StaticType::Primitive(PrimitiveType::Bool),
        syn::Lit::Char(_) => StaticType::Primitive(PrimitiveType::Char),
        syn::Lit::Byte(_) => StaticType::Primitive(PrimitiveType::U8),
        _ => StaticType::pointer(StaticType::slice(StaticType::Primitive(PrimitiveType::U8))),
    }
}

fn binary_value(op: &syn::BinOp, left: ConstValue, right: ConstValue) -> Result<ConstValue> {
    use syn::BinOp;

    let overflow = || AnalysisError::unsupported("constant arithmetic that overflows or divides by zero");

    match (left, right) {
        (ConstValue::Int(a), ConstValue::Int(b)) => {
            let value = match op {
                BinOp::Add(_) => ConstValue::Int(a.checked_add(b).ok_or_else(overflow)?),
                BinOp::Sub(_) => ConstValue::Int(a.checked_sub(b).ok_or_else(overflow)?),
                BinOp::Mul(_) => ConstValue::Int(a.checked_mul(b).ok_or_else(overflow)?),
                BinOp::Div(_) => ConstValue::Int(a.checked_div(b).ok_or_else(overflow)?),
                BinOp::Rem(_) => ConstValue::Int(a.checked_rem(b).ok_or_else(overflow)?),
                BinOp::BitAnd(_) => ConstValue::Int(a & b),
                BinOp::BitOr(_) => ConstValue::Int(a | b),
                BinOp::BitXor(_) => ConstValue::Int(a ^ b),
                BinOp::Shl(_) => ConstValue::Int(a.checked_shl(b as u32).ok_or_else(overflow)?),
                BinOp::Shr(_) => ConstValue::Int(a.checked_shr(b as u32).ok_or_else(overflow)?),
                BinOp::Eq(_) => ConstValue::Bool(a == b),
                BinOp::Ne(_) => ConstValue::Bool(a != b),
                BinOp::Lt(_) => ConstValue::Bool(a < b),
                BinOp::Le(_) => ConstValue::Bool(a <= b),
                BinOp::Gt(_) => ConstValue::Bool(a > b),
                BinOp::Ge(_) => ConstValue::Bool(a >= b),
                _ => return Err(AnalysisError::unsupported("integer operator in a constant")),
            };
            Ok(value)
        }
        (ConstValue::Float(a), ConstValue::Float(b)) => {
            let value = match op {
                BinOp::Add(_) => ConstValue::Float(a + b),
                BinOp::Sub(_) => ConstValue::Float(a - b),
                BinOp::Mul(_) => ConstValue::Float(a * b),
                BinOp::Div(_) => ConstValue::Float(a / b),
                BinOp::Lt(_) => ConstValue::Bool(a < b),
                BinOp::Gt(_) => ConstValue::Bool(a > b),
                _ => return Err(AnalysisError::unsupported("float operator in a constant")),
            };
            Ok(value)
        }
        (ConstValue::Bool(a), ConstValue::Bool(b)) => match op {
            BinOp::And(_) => Ok(ConstValue::Bool(a && b)),
            BinOp::Or(_) => Ok(ConstValue::Bool(a || b)),
            BinOp::Eq(_) => Ok(ConstValue::Bool(a == b)),
            BinOp::Ne(_) => Ok(ConstValue::Bool(a != b)),
            _ => Err(AnalysisError::unsupported("boolean operator in a constant")),
        },
        (left, right) => Err(AnalysisError::unsupported(format!(
            "constant operation on {} and {}",
            left, right
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::test_support::{expr, function_scope, resolver_for};
    use pretty_assertions::assert_eq;

    const SERVICE: &[(&str, &str)] = &[
        ("src/lib.rs", "pub mod limits; pub mod models; pub mod api;"),
        (
            "src/limits.rs",
            r#"
            pub const PAGE: i64 = 20;
            pub const MAX_PAGE: i64 = PAGE * 5;
            pub static PREFIX: &str = "/v1";
            "#,
        ),
        (
            "src/models.rs",
            r#"
            pub struct User { pub id: u64, pub name: String, pub tags: Vec<String> }
            pub struct Settings { pub server: Server }
            pub struct Server { pub port: u16 }
            pub enum Level { Low = 1, High = 10 }
            impl User {
                pub fn new(name: String) -> Self { User { id: 0, name, tags: vec![] } }
                pub fn display(&self) -> String { self.name.clone() }
            }
            pub fn lookup(id: u64) -> Result<Option<User>, String> { Ok(None) }
            "#,
        ),
        (
            "src/api.rs",
            r#"
            use crate::limits::{self, MAX_PAGE};
            use crate::models::{User, Settings, Level, lookup};
            use http::StatusCode;

            pub fn handler(settings: &Settings, raw: String) -> Result<(), String> {
                let user = User::new(raw);
                let found = lookup(user.id)?;
                let list = vec![user.clone()];
                let names: Vec<String> = Vec::new();
                let boxed = Box::new(user.display());
                let status = StatusCode::CREATED;
                let code = 404;
                Ok(())
            }
            "#,
        ),
    ];

    fn handler_scope(resolver: &mut Resolver) -> Scope {
        function_scope(resolver, "crate::api", "handler")
    }

    #[test]
    fn test_extract_var_name() {
        let (_dir, mut resolver) = resolver_for(SERVICE);
        let scope = handler_scope(&mut resolver);

        let name = resolver.extract_var_name(&scope, &expr("MAX_PAGE")).unwrap();
        assert_eq!(
            name,
            VarName {
                package: "crate::limits".into(),
                name: "MAX_PAGE".into(),
                path: vec![]
            }
        );

        let name = resolver
            .extract_var_name(&scope, &expr("settings.server.port"))
            .unwrap();
        assert_eq!(name.package, "crate::api");
        assert_eq!(name.name, "port");
        assert_eq!(name.path, vec!["settings".to_string(), "server".to_string()]);

        let name = resolver.extract_var_name(&scope, &expr("limits::PREFIX")).unwrap();
        assert_eq!((name.package.as_str(), name.name.as_str()), ("crate::limits", "PREFIX"));

        let name = resolver
            .extract_var_name(&scope, &expr("StatusCode::OK"))
            .unwrap();
        assert_eq!(name.package, "http");
        assert_eq!(name.path, vec!["StatusCode".to_string()]);
    }

    #[test]
    fn test_expression_value_follows_constants() {
        let (_dir, mut resolver) = resolver_for(SERVICE);
        let scope = handler_scope(&mut resolver);

        assert_eq!(
            resolver.expression_value(&scope, &expr("MAX_PAGE")).unwrap(),
            ConstValue::Int(100)
        );
        assert_eq!(
            resolver.expression_value(&scope, &expr("limits::PREFIX")).unwrap(),
            ConstValue::Str("/v1".into())
        );
        assert_eq!(
            resolver.expression_value(&scope, &expr("-(3 + 4) as i64")).unwrap(),
            ConstValue::Int(-7)
        );
        assert_eq!(
            resolver.expression_value(&scope, &expr("code")).unwrap(),
            ConstValue::Int(404)
        );
        assert_eq!(
            resolver.expression_value(&scope, &expr("status")).unwrap(),
            ConstValue::Int(201)
        );
        assert_eq!(
            resolver.expression_value(&scope, &expr("Level::High")).unwrap(),
            ConstValue::Int(10)
        );
    }

    #[test]
    fn test_expression_value_rejects_runtime_values() {
        let (_dir, mut resolver) = resolver_for(SERVICE);
        let scope = handler_scope(&mut resolver);

        let err = resolver.expression_value(&scope, &expr("raw.len()")).unwrap_err();
        assert!(matches!(err, AnalysisError::Unsupported(_)));
        let err = resolver.expression_value(&scope, &expr("raw")).unwrap_err();
        assert!(matches!(err, AnalysisError::Structural { .. }));
    }

    #[test]
    fn test_expression_type_of_bindings_and_builtins() {
        let (_dir, mut resolver) = resolver_for(SERVICE);
        let scope = handler_scope(&mut resolver);
        let user = StaticType::Named(NamedType::new("crate::models", "User"));

        let mut type_of = |code: &str| resolver.expression_type(&scope, &expr(code)).unwrap();

        assert_eq!(type_of("user"), user);
        assert_eq!(type_of("found"), StaticType::optional(user.clone()));
        assert_eq!(type_of("list"), StaticType::slice(user.clone()));
        assert_eq!(type_of("names"), StaticType::slice(StaticType::string()));
        assert_eq!(type_of("boxed"), StaticType::pointer(StaticType::string()));
        assert_eq!(type_of("user.tags"), StaticType::slice(StaticType::string()));
        assert_eq!(type_of("list.len()"), StaticType::Primitive(PrimitiveType::Usize));
        assert_eq!(type_of("user.id.to_string()"), StaticType::string());
        assert_eq!(type_of("&user"), StaticType::pointer(user.clone()));
        assert_eq!(type_of("format!(\"{}\", 1)"), StaticType::string());
        assert_eq!(
            type_of("serde_json::json!({})"),
            StaticType::Interface("serde_json::Value".into())
        );
        assert_eq!(type_of("settings.server.port"), StaticType::Primitive(PrimitiveType::U16));
        assert_eq!(type_of("Settings::default()").as_named().unwrap().name, "Settings");
    }

    #[test]
    fn test_vec_macro_elements() {
        let mac: syn::Macro = syn::parse_str("vec![1, 2, 3]").unwrap();
        assert_eq!(vec_macro_elements(&mac).unwrap().len(), 3);

        let mac: syn::Macro = syn::parse_str("vec![0u8; 16]").unwrap();
        assert_eq!(vec_macro_elements(&mac).unwrap(), vec![expr("0u8")]);
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(http_status_code("OK"), Some(200));
        assert_eq!(http_status_code("UNPROCESSABLE_ENTITY"), Some(422));
        assert_eq!(http_status_code("TEAPOT"), None);
    }
}
