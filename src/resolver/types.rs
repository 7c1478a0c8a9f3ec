use super::{Resolver, Scope};
use crate::error::{AnalysisError, Result};
use crate::parser::path_to_string;
use crate::resolver::path::PathTarget;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Primitive leaf types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    Bool,
    Char,
}

impl PrimitiveType {
    /// Maps a Rust primitive name (`u64`, `str`, `String`) to its primitive type
    pub fn from_name(name: &str) -> Option<Self> {
        let primitive = match name {
            "String" | "str" => PrimitiveType::String,
            "i8" => PrimitiveType::I8,
            "i16" => PrimitiveType::I16,
            "i32" => PrimitiveType::I32,
            "i64" => PrimitiveType::I64,
            "i128" => PrimitiveType::I128,
            "isize" => PrimitiveType::Isize,
            "u8" => PrimitiveType::U8,
            "u16" => PrimitiveType::U16,
            "u32" => PrimitiveType::U32,
            "u64" => PrimitiveType::U64,
            "u128" => PrimitiveType::U128,
            "usize" => PrimitiveType::Usize,
            "f32" => PrimitiveType::F32,
            "f64" => PrimitiveType::F64,
            "bool" => PrimitiveType::Bool,
            "char" => PrimitiveType::Char,
            _ => return None,
        };
        Some(primitive)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::I8 => "i8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::I128 => "i128",
            PrimitiveType::Isize => "isize",
            PrimitiveType::U8 => "u8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::U128 => "u128",
            PrimitiveType::Usize => "usize",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Char => "char",
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            PrimitiveType::String | PrimitiveType::F32 | PrimitiveType::F64 | PrimitiveType::Bool | PrimitiveType::Char
        )
    }
}

/// A user or library type referred to by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedType {
    /// Module path of the declaring module (`crate::models`, or `web` for a dependency)
    pub package: String,
    pub name: String,
    /// Generic arguments, in declaration order
    pub args: Vec<StaticType>,
}

impl NamedType {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn is(&self, package: &str, name: &str) -> bool {
        self.package == package && self.name == name
    }
}

/// The static type of a declaration or expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StaticType {
    Primitive(PrimitiveType),
    Named(NamedType),
    /// `&T`, `&mut T`, `Box<T>`, `Rc<T>`, `Arc<T>`, `Cow<T>`
    Pointer(Box<StaticType>),
    /// `Option<T>`
    Optional(Box<StaticType>),
    /// `Vec<T>`, `[T]`, sets and deques
    Slice(Box<StaticType>),
    /// `[T; N]`
    Array(Box<StaticType>, usize),
    Map(Box<StaticType>, Box<StaticType>),
    Tuple(Vec<StaticType>),
    /// `Result<T, E>`
    Fallible(Box<StaticType>, Box<StaticType>),
    /// Trait objects, `impl Trait` and untyped JSON values
    Interface(String),
    /// An unsubstituted generic parameter
    Generic(String),
    Unit,
}

impl StaticType {
    pub fn pointer(inner: StaticType) -> Self {
        StaticType::Pointer(Box::new(inner))
    }

    pub fn optional(inner: StaticType) -> Self {
        StaticType::Optional(Box::new(inner))
    }

    pub fn slice(inner: StaticType) -> Self {
        StaticType::Slice(Box::new(inner))
    }

    pub fn string() -> Self {
        StaticType::Primitive(PrimitiveType::String)
    }

    /// Strips every level of pointer indirection
    pub fn peel_pointers(&self) -> &StaticType {
        let mut current = self;
        while let StaticType::Pointer(inner) = current {
            current = inner;
        }
        current
    }

    /// The named type behind any pointers
    pub fn as_named(&self) -> Option<&NamedType> {
        match self.peel_pointers() {
            StaticType::Named(named) => Some(named),
            _ => None,
        }
    }

    /// Replaces generic parameters using `bindings`; unbound parameters are kept
    pub fn substitute(&self, bindings: &HashMap<String, StaticType>) -> StaticType {
        if bindings.is_empty() {
            return self.clone();
        }
        let sub = |t: &StaticType| Box::new(t.substitute(bindings));
        match self {
            StaticType::Generic(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            StaticType::Named(named) => StaticType::Named(NamedType {
                package: named.package.clone(),
                name: named.name.clone(),
                args: named.args.iter().map(|a| a.substitute(bindings)).collect(),
            }),
            StaticType::Pointer(inner) => StaticType::Pointer(sub(inner)),
            StaticType::Optional(inner) => StaticType::Optional(sub(inner)),
            StaticType::Slice(inner) => StaticType::Slice(sub(inner)),
            StaticType::Array(inner, len) => StaticType::Array(sub(inner), *len),
            StaticType::Map(key, value) => StaticType::Map(sub(key), sub(value)),
            StaticType::Tuple(items) => {
                StaticType::Tuple(items.iter().map(|t| t.substitute(bindings)).collect())
            }
            StaticType::Fallible(ok, err) => StaticType::Fallible(sub(ok), sub(err)),
            StaticType::Primitive(_) | StaticType::Interface(_) | StaticType::Unit => self.clone(),
        }
    }
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticType::Primitive(p) => write!(f, "{}", p.name()),
            StaticType::Named(named) => {
                write!(f, "{}", named.name)?;
                if !named.args.is_empty() {
                    let args: Vec<String> = named.args.iter().map(|a| a.to_string()).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                Ok(())
            }
            StaticType::Pointer(inner) => write!(f, "&{}", inner),
            StaticType::Optional(inner) => write!(f, "Option<{}>", inner),
            StaticType::Slice(inner) => write!(f, "Vec<{}>", inner),
            StaticType::Array(inner, len) => write!(f, "[{}; {}]", inner, len),
            StaticType::Map(key, value) => write!(f, "Map<{}, {}>", key, value),
            StaticType::Tuple(items) => {
                let items: Vec<String> = items.iter().map(|t| t.to_string()).collect();
                write!(f, "({})", items.join(", "))
            }
            StaticType::Fallible(ok, err) => write!(f, "Result<{}, {}>", ok, err),
            StaticType::Interface(name) => write!(f, "dyn {}", name),
            StaticType::Generic(name) => write!(f, "{}", name),
            StaticType::Unit => write!(f, "()"),
        }
    }
}

/// Type arguments written inside `<..>` on a path segment, lifetimes and constants skipped
pub(crate) fn type_arguments(segment: &syn::PathSegment) -> Vec<&syn::Type> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Names of the generic type parameters of an item
pub(crate) fn generic_names(generics: &syn::Generics) -> Vec<String> {
    generics.type_params().map(|p| p.ident.to_string()).collect()
}

/// Dependency types that serialize as plain strings
const STRING_LIKE: &[(&str, &str)] = &[
    ("uuid", "Uuid"),
    ("chrono", "DateTime"),
    ("chrono", "NaiveDate"),
    ("chrono", "NaiveDateTime"),
    ("chrono", "NaiveTime"),
    ("time", "OffsetDateTime"),
    ("time", "Date"),
    ("rust_decimal", "Decimal"),
    ("url", "Url"),
];

enum Container {
    Optional,
    Sequence,
    Map,
    Pointer,
    Fallible,
}

fn container(name: &str) -> Option<Container> {
    let kind = match name {
        "Option" => Container::Optional,
        "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "IndexSet" | "BinaryHeap" => {
            Container::Sequence
        }
        "HashMap" | "BTreeMap" | "IndexMap" => Container::Map,
        "Box" | "Rc" | "Arc" | "Cow" | "RefCell" | "Cell" | "Mutex" | "RwLock" => Container::Pointer,
        "Result" => Container::Fallible,
        _ => return None,
    };
    Some(kind)
}

impl Resolver {
    /// Lowers a written type into a [`StaticType`] in the given scope.
    ///
    /// # Errors
    ///
    /// Returns an error for qualified-self paths, associated types, function pointers and other
    /// type syntax the analysis has no shape for, and when a named type cannot be resolved.
    pub fn lower_type(&mut self, scope: &Scope, ty: &syn::Type) -> Result<StaticType> {
        match ty {
            syn::Type::Path(type_path) => {
                if type_path.qself.is_some() {
                    return Err(AnalysisError::unsupported(format!(
                        "qualified type {}",
                        path_to_string(&type_path.path)
                    )));
                }
                self.lower_path(scope, &type_path.path)
            }
            syn::Type::Reference(reference) => {
                Ok(StaticType::pointer(self.lower_type(scope, &reference.elem)?))
            }
            syn::Type::Ptr(pointer) => Ok(StaticType::pointer(self.lower_type(scope, &pointer.elem)?)),
            syn::Type::Slice(slice) => Ok(StaticType::slice(self.lower_type(scope, &slice.elem)?)),
            syn::Type::Array(array) => {
                let elem = self.lower_type(scope, &array.elem)?;
                let len = self
                    .expression_value(scope, &array.len)?
                    .as_int()
                    .filter(|n| *n >= 0)
                    .ok_or_else(|| AnalysisError::structural("array length", "non-integer constant"))?;
                Ok(StaticType::Array(Box::new(elem), len as usize))
            }
            syn::Type::Tuple(tuple) if tuple.elems.is_empty() => Ok(StaticType::Unit),
            syn::Type::Tuple(tuple) => {
                let items = tuple
                    .elems
                    .iter()
                    .map(|elem| self.lower_type(scope, elem))
                    .collect::<Result<Vec<_>>>()?;
                Ok(StaticType::Tuple(items))
            }
            syn::Type::TraitObject(object) => Ok(StaticType::Interface(bound_name(&object.bounds))),
            syn::Type::ImplTrait(imp) => Ok(StaticType::Interface(bound_name(&imp.bounds))),
            syn::Type::Paren(paren) => self.lower_type(scope, &paren.elem),
            syn::Type::Group(group) => self.lower_type(scope, &group.elem),
            syn::Type::Infer(_) => Ok(StaticType::Generic("_".to_string())),
            syn::Type::Never(_) => Ok(StaticType::Unit),
            _ => Err(AnalysisError::unsupported("type syntax (function pointer or macro)")),
        }
    }

    /// Lowers a type written as a path, including container and well-known dependency types
    pub(crate) fn lower_path(&mut self, scope: &Scope, path: &syn::Path) -> Result<StaticType> {
        let last = path
            .segments
            .last()
            .ok_or_else(|| AnalysisError::structural("type path", "empty path"))?;
        let name = last.ident.to_string();
        let args = type_arguments(last);

        if path.segments.len() == 1 && path.leading_colon.is_none() {
            if scope.generics.iter().any(|g| *g == name) {
                return Ok(StaticType::Generic(name));
            }
            if name == "Self" {
                return scope
                    .self_type
                    .clone()
                    .ok_or_else(|| AnalysisError::unresolved("Self outside of an impl block"));
            }
            if let Some(primitive) = PrimitiveType::from_name(&name) {
                return Ok(StaticType::Primitive(primitive));
            }
        }

        if let Some(kind) = container(&name) {
            if !self.names_local_item(scope, path)? {
                return self.lower_container(scope, kind, &args);
            }
        }

        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        match self.resolve_path(scope, &segments)? {
            PathTarget::Item { package, name, rest } if rest.is_empty() => {
                let args = args
                    .into_iter()
                    .map(|arg| self.lower_type(scope, arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(StaticType::Named(NamedType {
                    package: package.path.clone(),
                    name,
                    args,
                }))
            }
            PathTarget::Item { name, rest, .. } => Err(AnalysisError::unsupported(format!(
                "associated type {}::{}",
                name,
                rest.join("::")
            ))),
            PathTarget::Module(package) => {
                Err(AnalysisError::structural("type", format!("module {}", package.path)))
            }
            PathTarget::External { package, name, rest } => {
                if !rest.is_empty() {
                    return Err(AnalysisError::unsupported(format!(
                        "associated type {}::{}::{}",
                        package,
                        name,
                        rest.join("::")
                    )));
                }
                let root = package.split("::").next().unwrap_or_default();
                if root == "serde_json" && name == "Value" {
                    return Ok(StaticType::Interface("serde_json::Value".to_string()));
                }
                if STRING_LIKE.iter().any(|(c, n)| *c == root && *n == name) {
                    return Ok(StaticType::string());
                }
                let args = args
                    .into_iter()
                    .map(|arg| self.lower_type(scope, arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(StaticType::Named(NamedType { package, name, args }))
            }
        }
    }

    fn lower_container(
        &mut self,
        scope: &Scope,
        kind: Container,
        args: &[&syn::Type],
    ) -> Result<StaticType> {
        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            lowered.push(self.lower_type(scope, arg)?);
        }
        let mut lowered = lowered.into_iter();
        let mut next = |what: &str| {
            lowered
                .next()
                .ok_or_else(|| AnalysisError::structural(format!("type argument of {}", what), "none"))
        };

        Ok(match kind {
            Container::Optional => StaticType::optional(next("Option")?),
            Container::Sequence => StaticType::slice(next("collection")?),
            Container::Map => StaticType::Map(Box::new(next("map")?), Box::new(next("map")?)),
            Container::Pointer => StaticType::pointer(next("pointer")?),
            Container::Fallible => {
                let ok = next("Result")?;
                let err = next("Result").unwrap_or_else(|_| StaticType::Generic("E".to_string()));
                StaticType::Fallible(Box::new(ok), Box::new(err))
            }
        })
    }

    /// Whether a single-segment path names an item declared or imported from inside the crate,
    /// which then shadows the std container of the same name
    fn names_local_item(&mut self, scope: &Scope, path: &syn::Path) -> Result<bool> {
        if path.segments.len() != 1 {
            return Ok(false);
        }
        let name = path.segments[0].ident.to_string();
        let package = self.package(scope.package_path())?;
        if package.item(&name).is_some() {
            return Ok(true);
        }
        Ok(scope
            .file
            .imports
            .lookup(&name)
            .map(|target| target.starts_with("crate::"))
            .unwrap_or(false))
    }
}

fn bound_name(bounds: &syn::punctuated::Punctuated<syn::TypeParamBound, syn::Token![+]>) -> String {
    bounds
        .iter()
        .find_map(|bound| match bound {
            syn::TypeParamBound::Trait(t) => Some(path_to_string(&t.path)),
            _ => None,
        })
        .unwrap_or_else(|| "Any".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::test_support::resolver_for;

    fn lower(resolver: &mut Resolver, module: &str, ty: &str) -> Result<StaticType> {
        let scope = resolver.package_scope(module).unwrap();
        let ty: syn::Type = syn::parse_str(ty).unwrap();
        resolver.lower_type(&scope, &ty)
    }

    #[test]
    fn test_lower_primitives_and_containers() {
        let (_dir, mut resolver) = resolver_for(&[("src/lib.rs", "")]);

        assert_eq!(
            lower(&mut resolver, "crate", "&str").unwrap(),
            StaticType::pointer(StaticType::string())
        );
        assert_eq!(
            lower(&mut resolver, "crate", "Option<Vec<u64>>").unwrap(),
            StaticType::optional(StaticType::slice(StaticType::Primitive(PrimitiveType::U64)))
        );
        assert_eq!(
            lower(&mut resolver, "crate", "std::collections::HashMap<String, bool>").unwrap(),
            StaticType::Map(
                Box::new(StaticType::string()),
                Box::new(StaticType::Primitive(PrimitiveType::Bool))
            )
        );
        assert_eq!(
            lower(&mut resolver, "crate", "[u8; 4]").unwrap(),
            StaticType::Array(Box::new(StaticType::Primitive(PrimitiveType::U8)), 4)
        );
        assert_eq!(lower(&mut resolver, "crate", "()").unwrap(), StaticType::Unit);
    }

    #[test]
    fn test_lower_named_types_through_imports() {
        let (_dir, mut resolver) = resolver_for(&[
            ("src/lib.rs", "pub mod models; pub mod api;"),
            ("src/models.rs", "pub struct User; pub struct Page<T> { pub items: Vec<T> }"),
            ("src/api.rs", "use crate::models::{User, Page};"),
        ]);

        assert_eq!(
            lower(&mut resolver, "crate::api", "Box<User>").unwrap(),
            StaticType::pointer(StaticType::Named(NamedType::new("crate::models", "User")))
        );

        let page = lower(&mut resolver, "crate::api", "Page<User>").unwrap();
        let named = page.as_named().unwrap();
        assert!(named.is("crate::models", "Page"));
        assert_eq!(named.args, vec![StaticType::Named(NamedType::new("crate::models", "User"))]);
        assert_eq!(page.to_string(), "Page<User>");
    }

    #[test]
    fn test_lower_external_types() {
        let (_dir, mut resolver) = resolver_for(&[(
            "src/lib.rs",
            "use web::Context; use serde_json::Value; use uuid::Uuid;",
        )]);

        assert_eq!(
            lower(&mut resolver, "crate", "&mut Context").unwrap(),
            StaticType::pointer(StaticType::Named(NamedType::new("web", "Context")))
        );
        assert_eq!(
            lower(&mut resolver, "crate", "Value").unwrap(),
            StaticType::Interface("serde_json::Value".to_string())
        );
        assert_eq!(lower(&mut resolver, "crate", "Uuid").unwrap(), StaticType::string());
    }

    #[test]
    fn test_local_item_shadows_container_name() {
        let (_dir, mut resolver) = resolver_for(&[("src/lib.rs", "pub struct Box { pub id: u32 }")]);
        let lowered = lower(&mut resolver, "crate", "Box").unwrap();
        assert!(lowered.as_named().unwrap().is("crate", "Box"));
    }

    #[test]
    fn test_qualified_self_is_unsupported() {
        let (_dir, mut resolver) = resolver_for(&[("src/lib.rs", "")]);
        let err = lower(&mut resolver, "crate", "<T as Iterator>::Item").unwrap_err();
        assert!(matches!(err, AnalysisError::Unsupported(_)));
    }

    #[test]
    fn test_substitute_generics() {
        let mut bindings = HashMap::new();
        bindings.insert("T".to_string(), StaticType::Primitive(PrimitiveType::U32));

        let ty = StaticType::slice(StaticType::Generic("T".to_string()));
        assert_eq!(
            ty.substitute(&bindings),
            StaticType::slice(StaticType::Primitive(PrimitiveType::U32))
        );
        assert_eq!(
            StaticType::Generic("U".to_string()).substitute(&bindings),
            StaticType::Generic("U".to_string())
        );
    }
}
