use super::call::{FnInput, FunctionDecl};
use super::path::PathTarget;
use super::types::{generic_names, NamedType, StaticType};
use super::{expr_kind, Resolver, Scope};
use crate::error::{AnalysisError, Result};
use crate::packages::file::FileNode;
use crate::packages::{Package, PackageGraph};
use crate::parser::doc_comment;
use log::trace;
use std::collections::HashMap;
use std::sync::Arc;
use syn::visit::{self, Visit};

/// The declaration a name or field access refers to, with the scope it was declared in.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Leaf name (`MAX_PAGE`, `user`, `Admin`)
    pub name: String,
    /// Scope of the declaring module or function
    pub scope: Scope,
    pub kind: DeclarationKind,
}

#[derive(Debug, Clone)]
pub enum DeclarationKind {
    /// A `let` binding; `position` indexes into tuple patterns
    Local { local: syn::Local, position: Vec<usize> },
    /// A function or closure parameter
    Parameter { input: FnInput, position: Vec<usize> },
    /// `self` inside a method
    Receiver(syn::Receiver),
    Const(syn::ItemConst),
    Static(syn::ItemStatic),
    AssociatedConst(syn::ImplItemConst),
    Function(Arc<FunctionDecl>),
    Struct(syn::ItemStruct),
    Enum(syn::ItemEnum),
    Variant { owner: syn::ItemEnum, variant: syn::Variant },
    TypeAlias(syn::ItemType),
    /// A struct field reached through a field access, typed after generic substitution
    Field { owner: NamedType, field: syn::Field, ty: StaticType },
    Module(Arc<Package>),
}

impl DeclarationKind {
    pub fn describe(&self) -> &'static str {
        match self {
            DeclarationKind::Local { .. } => "let binding",
            DeclarationKind::Parameter { .. } => "parameter",
            DeclarationKind::Receiver(_) => "self",
            DeclarationKind::Const(_) => "const",
            DeclarationKind::Static(_) => "static",
            DeclarationKind::AssociatedConst(_) => "associated const",
            DeclarationKind::Function(_) => "function",
            DeclarationKind::Struct(_) => "struct",
            DeclarationKind::Enum(_) => "enum",
            DeclarationKind::Variant { .. } => "enum variant",
            DeclarationKind::TypeAlias(_) => "type alias",
            DeclarationKind::Field { .. } => "field",
            DeclarationKind::Module(_) => "module",
        }
    }
}

impl Declaration {
    /// Module path the declaration lives in
    pub fn package(&self) -> &str {
        self.scope.package_path()
    }

    /// The initializer expression of a const, static or `let` binding.
    ///
    /// For tuple patterns (`let (a, b) = (1, 2);`) the element at the binding's position is
    /// returned.
    pub fn initializer(&self) -> Result<&syn::Expr> {
        match &self.kind {
            DeclarationKind::Const(item) => Ok(&item.expr),
            DeclarationKind::Static(item) => Ok(&item.expr),
            DeclarationKind::AssociatedConst(item) => Ok(&item.expr),
            DeclarationKind::Local { local, position } => {
                let init = local.init.as_ref().ok_or_else(|| {
                    AnalysisError::structural(
                        format!("initialized binding {}", self.name),
                        "let without initializer",
                    )
                })?;
                select_position(&init.expr, position)
            }
            other => Err(AnalysisError::structural(
                "declaration with an initializer",
                other.describe(),
            )),
        }
    }
}

/// Outcome of looking up a name: either a declaration of the crate, or a path into a dependency
#[derive(Debug, Clone)]
pub(crate) enum Lookup {
    Declared(Declaration),
    External(String),
}

/// A struct, enum or alias item found for a [`NamedType`], ready for expansion.
#[derive(Debug, Clone)]
pub struct TypeItem {
    /// Scope of the declaring module, with the item's generics and `Self` in effect
    pub scope: Scope,
    pub kind: TypeItemKind,
    /// Generic parameter → argument of the instantiation being looked at
    pub bindings: HashMap<String, StaticType>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone)]
pub enum TypeItemKind {
    Struct(syn::ItemStruct),
    Enum(syn::ItemEnum),
    Alias(syn::ItemType),
}

impl Resolver {
    /// Finds the declaration an identifier, path or field access refers to.
    ///
    /// # Errors
    ///
    /// Returns a structural error for other expression shapes and a resolution error when the
    /// name is unknown or declared outside the analyzed crate.
    pub fn find_declaration(&mut self, scope: &Scope, expr: &syn::Expr) -> Result<Declaration> {
        match self.lookup(scope, expr)? {
            Lookup::Declared(declaration) => Ok(declaration),
            Lookup::External(path) => Err(AnalysisError::unresolved(format!(
                "{} (declared outside the analyzed crate)",
                path
            ))),
        }
    }

    pub(crate) fn lookup(&mut self, scope: &Scope, expr: &syn::Expr) -> Result<Lookup> {
        match expr {
            syn::Expr::Paren(inner) => self.lookup(scope, &inner.expr),
            syn::Expr::Group(inner) => self.lookup(scope, &inner.expr),
            syn::Expr::Reference(inner) => self.lookup(scope, &inner.expr),
            syn::Expr::Path(path) if path.qself.is_none() => self.lookup_path(scope, &path.path),
            syn::Expr::Field(field) => {
                let base = self.expression_type(scope, &field.base)?;
                self.field_declaration(&base, &field.member).map(Lookup::Declared)
            }
            other => Err(AnalysisError::structural(
                "identifier or field access",
                expr_kind(other),
            )),
        }
    }

    pub(crate) fn lookup_path(&mut self, scope: &Scope, path: &syn::Path) -> Result<Lookup> {
        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();

        if segments.len() == 1 && path.leading_colon.is_none() {
            if let Some(declaration) = find_local(scope, &segments[0]) {
                return Ok(Lookup::Declared(declaration));
            }
        }

        match self.resolve_path(scope, &segments)? {
            PathTarget::Module(package) => Ok(Lookup::Declared(Declaration {
                name: segments.last().cloned().unwrap_or_default(),
                scope: Scope::for_file(Arc::clone(package.file())),
                kind: DeclarationKind::Module(package),
            })),
            PathTarget::Item {
                package,
                name,
                rest,
            } => self
                .item_declaration(&package, &name, &rest)
                .map(Lookup::Declared),
            PathTarget::External {
                package,
                name,
                rest,
            } => {
                let mut full = vec![package, name];
                full.extend(rest);
                Ok(Lookup::External(full.join("::")))
            }
        }
    }

    fn item_declaration(
        &mut self,
        package: &Arc<Package>,
        name: &str,
        rest: &[String],
    ) -> Result<Declaration> {
        let (file, item) = package
            .item(name)
            .ok_or_else(|| AnalysisError::unresolved(format!("{}::{}", package.path, name)))?;
        let file = Arc::clone(file);
        let item = item.clone();
        let file_scope = Scope::for_file(Arc::clone(&file));

        let member = match rest {
            [] => None,
            [member] => Some(member.as_str()),
            _ => {
                return Err(AnalysisError::unsupported(format!(
                    "nested associated path {}::{}::{}",
                    package.path,
                    name,
                    rest.join("::")
                )))
            }
        };

        let Some(member) = member else {
            let kind = match item {
                syn::Item::Const(item) => DeclarationKind::Const(item),
                syn::Item::Static(item) => DeclarationKind::Static(item),
                syn::Item::Fn(item) => DeclarationKind::Function(FunctionDecl::from_item_fn(file, &item)),
                syn::Item::Struct(item) => DeclarationKind::Struct(item),
                syn::Item::Enum(item) => DeclarationKind::Enum(item),
                syn::Item::Type(item) => DeclarationKind::TypeAlias(item),
                other => {
                    return Err(AnalysisError::unsupported(format!(
                        "reference to {} {}",
                        item_kind(&other),
                        name
                    )))
                }
            };
            return Ok(Declaration {
                name: name.to_string(),
                scope: file_scope,
                kind,
            });
        };

        if let syn::Item::Enum(owner) = &item {
            if let Some(variant) = owner.variants.iter().find(|v| v.ident == member) {
                return Ok(Declaration {
                    name: member.to_string(),
                    scope: file_scope,
                    kind: DeclarationKind::Variant {
                        owner: owner.clone(),
                        variant: variant.clone(),
                    },
                });
            }
        }

        let generics = match &item {
            syn::Item::Struct(s) => generic_names(&s.generics),
            syn::Item::Enum(e) => generic_names(&e.generics),
            _ => Vec::new(),
        };
        let owner = NamedType {
            package: package.path.clone(),
            name: name.to_string(),
            args: generics.into_iter().map(StaticType::Generic).collect(),
        };

        match self.find_impl_member(&owner, member)? {
            Some((scope, syn::ImplItem::Const(item))) => Ok(Declaration {
                name: member.to_string(),
                scope,
                kind: DeclarationKind::AssociatedConst(item),
            }),
            Some((scope, syn::ImplItem::Fn(item))) => Ok(Declaration {
                name: member.to_string(),
                kind: DeclarationKind::Function(FunctionDecl::from_impl_fn(&scope, &item)),
                scope,
            }),
            _ => Err(AnalysisError::unresolved(format!(
                "{}::{}::{}",
                package.path, name, member
            ))),
        }
    }

    /// Searches `impl` blocks of `owner` for an associated const or function.
    ///
    /// The owner's own module is searched first, then every module loaded so far. Returns the
    /// scope of the matching impl block (with `Self` and the impl's generics) and the member.
    pub fn find_impl_member(
        &mut self,
        owner: &NamedType,
        member: &str,
    ) -> Result<Option<(Scope, syn::ImplItem)>> {
        if !PackageGraph::is_local(&owner.package) {
            return Ok(None);
        }

        let mut candidates = vec![self.package(&owner.package)?];
        for package in self.graph().loaded() {
            if package.path != owner.package {
                candidates.push(package);
            }
        }

        for package in candidates {
            for file in &package.files {
                for item in &file.items {
                    let syn::Item::Impl(block) = item else {
                        continue;
                    };
                    let Some(scope) = self.impl_scope(file, block, owner) else {
                        continue;
                    };
                    for impl_item in &block.items {
                        let found = match impl_item {
                            syn::ImplItem::Const(c) => c.ident == member,
                            syn::ImplItem::Fn(f) => f.sig.ident == member,
                            _ => false,
                        };
                        if found {
                            trace!("Found {}::{} in {}", owner.name, member, package.path);
                            return Ok(Some((scope, impl_item.clone())));
                        }
                    }
                }
            }
        }

        Ok(None)
    }

    /// Scope of an impl block if its self type is `owner`
    fn impl_scope(&mut self, file: &Arc<FileNode>, block: &syn::ItemImpl, owner: &NamedType) -> Option<Scope> {
        let syn::Type::Path(self_path) = block.self_ty.as_ref() else {
            return None;
        };
        if self_path.path.segments.last()?.ident != owner.name {
            return None;
        }

        let generics = generic_names(&block.generics);
        let scope = Scope::for_file(Arc::clone(file)).with_generics(generics);
        let self_type = self.lower_type(&scope, &block.self_ty).ok()?;
        match self_type.as_named() {
            Some(named) if named.package == owner.package && named.name == owner.name => {
                Some(scope.with_self_type(self_type))
            }
            _ => None,
        }
    }

    /// Looks up the struct, enum or alias item behind a named type of the crate
    pub fn find_type_item(&mut self, named: &NamedType) -> Result<TypeItem> {
        if !PackageGraph::is_local(&named.package) {
            return Err(AnalysisError::unsupported(format!(
                "type {}::{} from outside the analyzed crate",
                named.package, named.name
            )));
        }

        let package = self.package(&named.package)?;
        let (file, item) = package.item(&named.name).ok_or_else(|| {
            AnalysisError::unresolved(format!("{}::{}", named.package, named.name))
        })?;

        let (kind, generics, doc) = match item {
            syn::Item::Struct(s) => (
                TypeItemKind::Struct(s.clone()),
                generic_names(&s.generics),
                doc_comment(&s.attrs),
            ),
            syn::Item::Enum(e) => (
                TypeItemKind::Enum(e.clone()),
                generic_names(&e.generics),
                doc_comment(&e.attrs),
            ),
            syn::Item::Type(t) => (
                TypeItemKind::Alias(t.clone()),
                generic_names(&t.generics),
                doc_comment(&t.attrs),
            ),
            other => {
                return Err(AnalysisError::structural(
                    format!("type {}", named.name),
                    item_kind(other),
                ))
            }
        };

        let bindings: HashMap<String, StaticType> = generics
            .iter()
            .cloned()
            .zip(named.args.iter().cloned())
            .collect();
        let self_type = StaticType::Named(NamedType {
            package: named.package.clone(),
            name: named.name.clone(),
            args: generics.iter().cloned().map(StaticType::Generic).collect(),
        });
        let scope = Scope::for_file(Arc::clone(file))
            .with_generics(generics)
            .with_self_type(self_type);

        Ok(TypeItem {
            scope,
            kind,
            bindings,
            doc,
        })
    }

    /// Declaration of `base.member` given the type of `base`; follows pointers and aliases
    pub(crate) fn field_declaration(
        &mut self,
        base: &StaticType,
        member: &syn::Member,
    ) -> Result<Declaration> {
        let mut current = base.peel_pointers().clone();
        loop {
            let named = match &current {
                StaticType::Named(named) => named.clone(),
                other => {
                    return Err(AnalysisError::structural(
                        "struct value",
                        format!("value of type {}", other),
                    ))
                }
            };
            let item = self.find_type_item(&named)?;
            match &item.kind {
                TypeItemKind::Struct(s) => {
                    let (index, field) = s
                        .fields
                        .iter()
                        .enumerate()
                        .find(|(i, f)| match member {
                            syn::Member::Named(ident) => f.ident.as_ref() == Some(ident),
                            syn::Member::Unnamed(index) => index.index as usize == *i,
                        })
                        .ok_or_else(|| {
                            AnalysisError::unresolved(format!(
                                "field {} of {}",
                                member_name(member),
                                named.name
                            ))
                        })?;
                    let ty = self.lower_type(&item.scope, &field.ty)?.substitute(&item.bindings);
                    return Ok(Declaration {
                        name: field
                            .ident
                            .as_ref()
                            .map(|i| i.to_string())
                            .unwrap_or_else(|| index.to_string()),
                        scope: item.scope.clone(),
                        kind: DeclarationKind::Field {
                            owner: named,
                            field: field.clone(),
                            ty,
                        },
                    });
                }
                TypeItemKind::Alias(alias) => {
                    current = self
                        .lower_type(&item.scope, &alias.ty)?
                        .substitute(&item.bindings)
                        .peel_pointers()
                        .clone();
                }
                TypeItemKind::Enum(_) => {
                    return Err(AnalysisError::structural(
                        "struct value",
                        format!("enum {}", named.name),
                    ))
                }
            }
        }
    }

    /// Static type of the value a declaration binds
    pub(crate) fn declaration_type(&mut self, declaration: &Declaration) -> Result<StaticType> {
        let scope = &declaration.scope;
        match &declaration.kind {
            DeclarationKind::Local { local, position } => {
                if let syn::Pat::Type(typed) = &local.pat {
                    let ty = self.lower_type(scope, &typed.ty)?;
                    return project(ty, position);
                }
                if let Ok(init) = declaration.initializer() {
                    let init = init.clone();
                    return self.expression_type(scope, &init);
                }
                let init = local.init.as_ref().ok_or_else(|| {
                    AnalysisError::unresolved(format!("type of uninitialized {}", declaration.name))
                })?;
                let ty = self.expression_type(scope, &init.expr)?;
                project(ty, position)
            }
            DeclarationKind::Parameter { input, position } => {
                let ty = input.ty.as_ref().ok_or_else(|| {
                    AnalysisError::unresolved(format!(
                        "type of untyped closure parameter {}",
                        declaration.name
                    ))
                })?;
                let ty = self.lower_type(scope, ty)?;
                project(ty, position)
            }
            DeclarationKind::Receiver(receiver) => {
                let self_type = scope
                    .self_type
                    .clone()
                    .ok_or_else(|| AnalysisError::unresolved("self outside of an impl block"))?;
                if receiver.reference.is_some() {
                    Ok(StaticType::pointer(self_type))
                } else {
                    Ok(self_type)
                }
            }
            DeclarationKind::Const(item) => self.lower_type(scope, &item.ty),
            DeclarationKind::Static(item) => self.lower_type(scope, &item.ty),
            DeclarationKind::AssociatedConst(item) => self.lower_type(scope, &item.ty),
            DeclarationKind::Field { ty, .. } => Ok(ty.clone()),
            DeclarationKind::Function(_) => Ok(StaticType::Interface("fn".to_string())),
            DeclarationKind::Struct(item) => Ok(StaticType::Named(NamedType::new(
                declaration.package(),
                item.ident.to_string(),
            ))),
            DeclarationKind::Variant { owner, .. } => Ok(StaticType::Named(NamedType::new(
                declaration.package(),
                owner.ident.to_string(),
            ))),
            other => Err(AnalysisError::structural("value", other.describe())),
        }
    }
}

/// Finds a `let` binding or parameter named `name` in the scope's function or the functions
/// enclosing it (for closures)
fn find_local(scope: &Scope, name: &str) -> Option<Declaration> {
    let mut function = scope.function.clone();
    while let Some(current) = function {
        if let Some(kind) = current.local_binding(name) {
            return Some(Declaration {
                name: name.to_string(),
                scope: current.scope(),
                kind,
            });
        }
        function = current.enclosing.clone();
    }
    None
}

impl FunctionDecl {
    /// The binding `name` refers to inside this function's body.
    ///
    /// Without source positions the last `let` of that name wins over earlier ones and over
    /// parameters.
    pub(crate) fn local_binding(&self, name: &str) -> Option<DeclarationKind> {
        let mut collector = LetCollector { name, found: None };
        self.body.visit(&mut collector);
        if let Some((local, position)) = collector.found {
            return Some(DeclarationKind::Local { local, position });
        }

        if name == "self" {
            return self.receiver.clone().map(DeclarationKind::Receiver);
        }

        self.inputs.iter().find_map(|input| {
            binding_position(&input.pat, name).map(|position| DeclarationKind::Parameter {
                input: input.clone(),
                position,
            })
        })
    }
}

struct LetCollector<'a> {
    name: &'a str,
    found: Option<(syn::Local, Vec<usize>)>,
}

impl<'ast> Visit<'ast> for LetCollector<'_> {
    fn visit_local(&mut self, local: &'ast syn::Local) {
        if let Some(position) = binding_position(&local.pat, self.name) {
            self.found = Some((local.clone(), position));
        }
        visit::visit_local(self, local);
    }

    // Nested fn items have their own locals
    fn visit_item_fn(&mut self, _: &'ast syn::ItemFn) {}
}

/// Where `name` is bound inside a pattern: an empty position for a plain binding, element
/// indices for tuple and tuple-struct patterns
pub(crate) fn binding_position(pat: &syn::Pat, name: &str) -> Option<Vec<usize>> {
    match pat {
        syn::Pat::Ident(ident) => {
            if ident.ident == name {
                Some(Vec::new())
            } else {
                ident
                    .subpat
                    .as_ref()
                    .and_then(|(_, sub)| binding_position(sub, name))
            }
        }
        syn::Pat::Type(typed) => binding_position(&typed.pat, name),
        syn::Pat::Reference(reference) => binding_position(&reference.pat, name),
        syn::Pat::Paren(paren) => binding_position(&paren.pat, name),
        syn::Pat::Tuple(tuple) => element_position(tuple.elems.iter(), name),
        syn::Pat::TupleStruct(tuple) => element_position(tuple.elems.iter(), name),
        _ => None,
    }
}

fn element_position<'a>(elems: impl Iterator<Item = &'a syn::Pat>, name: &str) -> Option<Vec<usize>> {
    elems.enumerate().find_map(|(index, elem)| {
        binding_position(elem, name).map(|mut position| {
            position.insert(0, index);
            position
        })
    })
}

fn select_position<'a>(expr: &'a syn::Expr, position: &[usize]) -> Result<&'a syn::Expr> {
    let mut current = expr;
    for &index in position {
        while let syn::Expr::Paren(paren) = current {
            current = &paren.expr;
        }
        current = match current {
            syn::Expr::Tuple(tuple) => tuple.elems.iter().nth(index).ok_or(AnalysisError::Index {
                what: "tuple initializer".to_string(),
                index,
                len: tuple.elems.len(),
            })?,
            other => return Err(AnalysisError::structural("tuple initializer", expr_kind(other))),
        };
    }
    Ok(current)
}

/// Picks the element type at `position` out of tuples, `Option` and `Result`
fn project(ty: StaticType, position: &[usize]) -> Result<StaticType> {
    let mut current = ty;
    for &index in position {
        current = match current.peel_pointers().clone() {
            StaticType::Tuple(items) => {
                let len = items.len();
                items.into_iter().nth(index).ok_or(AnalysisError::Index {
                    what: "tuple pattern".to_string(),
                    index,
                    len,
                })?
            }
            StaticType::Optional(inner) | StaticType::Fallible(inner, _) if index == 0 => *inner,
            other => {
                return Err(AnalysisError::structural(
                    "tuple type",
                    format!("destructured value of type {}", other),
                ))
            }
        };
    }
    Ok(current)
}

fn member_name(member: &syn::Member) -> String {
    match member {
        syn::Member::Named(ident) => ident.to_string(),
        syn::Member::Unnamed(index) => index.index.to_string(),
    }
}

pub(crate) fn item_kind(item: &syn::Item) -> &'static str {
    match item {
        syn::Item::Const(_) => "const",
        syn::Item::Enum(_) => "enum",
        syn::Item::Fn(_) => "function",
        syn::Item::Mod(_) => "module",
        syn::Item::Static(_) => "static",
        syn::Item::Struct(_) => "struct",
        syn::Item::Trait(_) => "trait",
        syn::Item::Type(_) => "type alias",
        syn::Item::Union(_) => "union",
        _ => "item",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::test_support::{expr, function_scope, resolver_for};

    #[test]
    fn test_find_local_let_and_parameter() {
        let (_dir, mut resolver) = resolver_for(&[(
            "src/lib.rs",
            r#"
            pub fn handler(id: u64) {
                let (name, age) = ("ada", 36);
                let limit: u32 = 10;
            }
            "#,
        )]);
        let scope = function_scope(&mut resolver, "crate", "handler");

        let age = resolver.find_declaration(&scope, &expr("age")).unwrap();
        assert!(matches!(age.kind, DeclarationKind::Local { ref position, .. } if position == &vec![1]));
        assert_eq!(age.initializer().unwrap(), &expr("36"));

        let id = resolver.find_declaration(&scope, &expr("id")).unwrap();
        assert!(matches!(id.kind, DeclarationKind::Parameter { .. }));
        assert!(id.initializer().is_err());
    }

    #[test]
    fn test_find_declaration_across_modules() {
        let (_dir, mut resolver) = resolver_for(&[
            ("src/lib.rs", "pub mod limits; pub mod api;"),
            ("src/limits.rs", "pub const MAX_PAGE: usize = 50;"),
            ("src/api.rs", "use crate::limits::MAX_PAGE; pub fn list() {}"),
        ]);
        let scope = function_scope(&mut resolver, "crate::api", "list");

        let declaration = resolver.find_declaration(&scope, &expr("MAX_PAGE")).unwrap();
        assert_eq!(declaration.package(), "crate::limits");
        assert!(matches!(declaration.kind, DeclarationKind::Const(_)));
        assert_eq!(declaration.initializer().unwrap(), &expr("50"));

        // caller's scope is unchanged
        assert_eq!(scope.package_path(), "crate::api");
    }

    #[test]
    fn test_find_variant_and_associated_const() {
        let (_dir, mut resolver) = resolver_for(&[(
            "src/lib.rs",
            r#"
            pub enum Role { Admin, Guest }
            pub struct Limits;
            impl Limits { pub const PAGE: u32 = 20; }
            "#,
        )]);
        let scope = resolver.package_scope("crate").unwrap();

        let variant = resolver.find_declaration(&scope, &expr("Role::Guest")).unwrap();
        assert!(matches!(variant.kind, DeclarationKind::Variant { .. }));

        let page = resolver.find_declaration(&scope, &expr("Limits::PAGE")).unwrap();
        assert!(matches!(page.kind, DeclarationKind::AssociatedConst(_)));
        assert_eq!(page.initializer().unwrap(), &expr("20"));
    }

    #[test]
    fn test_find_struct_field_through_access_chain() {
        let (_dir, mut resolver) = resolver_for(&[(
            "src/lib.rs",
            r#"
            pub struct Settings { pub server: Server }
            pub struct Server { pub port: u16 }
            pub fn run(settings: &Settings) {}
            "#,
        )]);
        let scope = function_scope(&mut resolver, "crate", "run");

        let port = resolver
            .find_declaration(&scope, &expr("settings.server.port"))
            .unwrap();
        match port.kind {
            DeclarationKind::Field { owner, ty, .. } => {
                assert_eq!(owner.name, "Server");
                assert_eq!(ty.to_string(), "u16");
            }
            other => panic!("expected a field, got {:?}", other.describe()),
        }
    }

    #[test]
    fn test_external_declaration_is_unresolved() {
        let (_dir, mut resolver) = resolver_for(&[("src/lib.rs", "use std::time::Duration;")]);
        let scope = resolver.package_scope("crate").unwrap();

        let err = resolver
            .find_declaration(&scope, &expr("Duration::ZERO"))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Unresolved(_)));
    }

    #[test]
    fn test_method_call_is_not_a_declaration() {
        let (_dir, mut resolver) = resolver_for(&[("src/lib.rs", "")]);
        let scope = resolver.package_scope("crate").unwrap();

        let err = resolver
            .find_declaration(&scope, &expr("items.len()"))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Structural { .. }));
    }
}
