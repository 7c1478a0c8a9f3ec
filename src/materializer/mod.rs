//! Turns static types into [`ResolvedType`] descriptors and collects named types as components.

pub mod resolved;
pub mod worklist;

pub use resolved::{ResolvedType, Shape, StructField, StructShape};
pub use worklist::Worklist;

use crate::error::{AnalysisError, Result};
use crate::model::{ComponentList, Processable};
use crate::parser::doc_comment;
use crate::resolver::declaration::{TypeItem, TypeItemKind};
use crate::resolver::types::StaticType;
use crate::resolver::{ConstValue, NamedType, PrimitiveType, Resolver};
use crate::tags::{observed_formats, variant_name, ContainerAttrs, FieldTags};
use log::{debug, warn};
use std::collections::HashSet;

/// Worklist passes allowed before the whole-program pass gives up
pub const MAX_WORKLIST_PASSES: usize = 1024;

/// What happens to a named type met during materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Expand it right away and register it as a component
    Discover,
    /// Queue it on the worklist and only return a reference
    Defer,
}

/// Materializes static types, keeping the component list and the worklist.
#[derive(Debug)]
pub struct Materializer {
    components: ComponentList,
    worklist: Worklist,
    mode: Mode,
    /// Named types whose expansion is in progress
    expanding: HashSet<(String, String)>,
}

impl Materializer {
    pub fn new(mode: Mode) -> Self {
        Self {
            components: ComponentList::new(),
            worklist: Worklist::new(),
            mode,
            expanding: HashSet::new(),
        }
    }

    /// Restores a materializer from a persisted component list and pending entries
    pub fn from_parts(mode: Mode, components: ComponentList, pending: Vec<Processable>) -> Self {
        let mut materializer = Self::new(mode);
        for field in components.iter() {
            materializer
                .worklist
                .finalize(Processable::new(&field.package, &field.name));
        }
        materializer.components = components;
        for processable in pending {
            materializer.worklist.add_to_be_processed(processable);
        }
        materializer
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn components(&self) -> &ComponentList {
        &self.components
    }

    pub fn worklist(&self) -> &Worklist {
        &self.worklist
    }

    /// Queues a named type for the whole-program pass
    pub fn add_to_be_processed(&mut self, processable: Processable) -> bool {
        self.worklist.add_to_be_processed(processable)
    }

    /// Hands back the components and whatever is still queued
    pub fn into_parts(self) -> (ComponentList, Vec<Processable>) {
        let pending = self.worklist.pending();
        (self.components, pending)
    }

    /// Materializes a static type.
    ///
    /// Named types that expand to a struct or a unit-only enum come back as references; their
    /// expansion is registered as a component (or queued, in [`Mode::Defer`]). Aliases, newtypes
    /// and generic instantiations are expanded in place.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Unsupported`] for tuples, `Result`s, unbound generic parameters
    /// and named types declared outside the crate, and any resolution error met on the way.
    pub fn materialize(&mut self, resolver: &mut Resolver, ty: &StaticType) -> Result<ResolvedType> {
        match ty {
            StaticType::Primitive(primitive) => Ok(ResolvedType::primitive(*primitive)),
            StaticType::Named(named) => self.materialize_named(resolver, named),
            StaticType::Pointer(inner) | StaticType::Optional(inner) => self.materialize(resolver, inner),
            StaticType::Slice(inner) => Ok(ResolvedType::slice(self.materialize(resolver, inner)?)),
            StaticType::Array(inner, length) => {
                Ok(ResolvedType::array(self.materialize(resolver, inner)?, *length))
            }
            StaticType::Map(key, value) => {
                let key = self.materialize(resolver, key)?;
                let value = self.materialize(resolver, value)?;
                Ok(ResolvedType::map(key, value))
            }
            StaticType::Interface(_) => Ok(ResolvedType::any()),
            StaticType::Unit => Ok(ResolvedType::nil()),
            StaticType::Tuple(_) | StaticType::Fallible(..) | StaticType::Generic(_) => {
                Err(AnalysisError::unsupported(format!("type shape {}", ty)))
            }
        }
    }

    fn materialize_named(&mut self, resolver: &mut Resolver, named: &NamedType) -> Result<ResolvedType> {
        let key = (named.name.clone(), named.package.clone());
        let processable = Processable::new(&named.package, &named.name);

        if named.args.is_empty()
            && (self.components.contains(&named.name, &named.package)
                || self.expanding.contains(&key)
                || self.worklist.is_queued(&processable))
        {
            return Ok(ResolvedType::reference(&named.name, &named.package));
        }

        let item = resolver.find_type_item(named)?;
        if !is_component(&item.kind) {
            return self.expand_inline(resolver, named, &item);
        }

        if !named.args.is_empty() {
            // instantiations are expanded in place under a name carrying their arguments
            let instance = instance_name(named);
            let instance_key = (instance.clone(), named.package.clone());
            if !self.expanding.insert(instance_key.clone()) {
                warn!("{}::{} refers to itself, materialized as any", named.package, instance);
                return Ok(ResolvedType::any());
            }
            let expanded = self.expand_component(resolver, named, &item);
            self.expanding.remove(&instance_key);
            return Ok(expanded?.named(instance, &named.package));
        }

        match self.mode {
            Mode::Defer => {
                debug!("Queueing {}::{}", named.package, named.name);
                self.worklist.add_to_be_processed(processable);
            }
            Mode::Discover => {
                debug!("Expanding {}::{}", named.package, named.name);
                self.expanding.insert(key.clone());
                let expanded = self.expand_component(resolver, named, &item);
                self.expanding.remove(&key);
                self.components.add(expanded?.to_field());
                self.worklist.finalize(processable);
            }
        }

        let mut reference = ResolvedType::reference(&named.name, &named.package);
        reference.doc = item.doc;
        Ok(reference)
    }

    /// Aliases, newtypes, unit structs and data-carrying enums
    fn expand_inline(&mut self, resolver: &mut Resolver, named: &NamedType, item: &TypeItem) -> Result<ResolvedType> {
        match &item.kind {
            TypeItemKind::Alias(alias) => {
                let target = resolver.lower_type(&item.scope, &alias.ty)?.substitute(&item.bindings);
                self.materialize(resolver, &target)
            }
            TypeItemKind::Struct(s) => match &s.fields {
                syn::Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                    let inner = resolver
                        .lower_type(&item.scope, &fields.unnamed[0].ty)?
                        .substitute(&item.bindings);
                    self.materialize(resolver, &inner)
                }
                syn::Fields::Unit => Ok(ResolvedType::nil()),
                _ => Err(AnalysisError::unsupported(format!(
                    "tuple struct {}::{}",
                    named.package, named.name
                ))),
            },
            TypeItemKind::Enum(_) => {
                debug!("{}::{} carries data, materialized as any", named.package, named.name);
                Ok(ResolvedType::any())
            }
        }
    }

    /// Full expansion of a braced struct or unit-only enum
    fn expand_component(&mut self, resolver: &mut Resolver, named: &NamedType, item: &TypeItem) -> Result<ResolvedType> {
        let mut expanded = match &item.kind {
            TypeItemKind::Struct(s) => self.expand_struct(resolver, item, s)?,
            TypeItemKind::Enum(e) => expand_enum(resolver, item, e)?,
            TypeItemKind::Alias(_) => {
                return Err(AnalysisError::structural("struct or enum", "type alias"));
            }
        };
        expanded.name = named.name.clone();
        expanded.package = named.package.clone();
        expanded.doc = item.doc.clone();
        Ok(expanded)
    }

    fn expand_struct(&mut self, resolver: &mut Resolver, item: &TypeItem, s: &syn::ItemStruct) -> Result<ResolvedType> {
        let container = ContainerAttrs::parse(&s.attrs)?;
        let mut fields = Vec::new();

        for field in s.fields.iter() {
            let Some(ident) = &field.ident else { continue };
            let ident = container.field_name(&ident.to_string());
            let tags = FieldTags::parse(&field.attrs, &ident)?;

            // private fields of a type serde never sees cannot be bound
            let exported = container.serde_derived || matches!(field.vis, syn::Visibility::Public(_));
            if !exported || !tags.is_shown() {
                continue;
            }

            let ty = resolver.lower_type(&item.scope, &field.ty)?.substitute(&item.bindings);
            let optional = matches!(ty.peel_pointers(), StaticType::Optional(_));
            let resolved = self.materialize(resolver, &ty)?;

            let validated = tags.validations.values().any(|v| v.required);
            fields.push(StructField {
                name: tags.display_name().unwrap_or(&ident).to_string(),
                ty: resolved,
                embedded: tags.flatten,
                required: validated || (!optional && tags.is_required()),
                doc: doc_comment(&field.attrs),
                tags,
            });
        }

        let uniform = fields.iter().all(|f| f.tags.is_uniform());
        let formats = observed_formats(fields.iter().map(|f| &f.tags)).into_iter().collect();
        Ok(ResolvedType {
            name: String::new(),
            package: String::new(),
            shape: Shape::Struct(StructShape {
                fields,
                uniform,
                formats,
            }),
            doc: None,
            enum_values: Vec::new(),
            constant: None,
        })
    }

    /// Expands every queued named type until the worklist settles.
    ///
    /// Each pass loads the owning packages of the whole batch, then expands every entry one
    /// layer: named types met inside are queued for the next pass rather than expanded.
    /// Returns the number of entries expanded.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::NoFixpoint`] after [`MAX_WORKLIST_PASSES`] passes, or the first
    /// error met while expanding.
    pub fn process_worklist(&mut self, resolver: &mut Resolver) -> Result<usize> {
        let mode = self.mode;
        self.mode = Mode::Defer;
        let result = self.drain_worklist(resolver);
        self.mode = mode;
        result
    }

    fn drain_worklist(&mut self, resolver: &mut Resolver) -> Result<usize> {
        let mut passes = 0;
        let mut expanded = 0;

        while !self.worklist.is_empty() {
            if passes >= MAX_WORKLIST_PASSES {
                return Err(AnalysisError::NoFixpoint(passes));
            }
            passes += 1;

            let batch = self.worklist.take_batch();
            debug!("Worklist pass {}: {} named types", passes, batch.len());
            for processable in &batch {
                resolver.package(&processable.package)?;
            }

            for processable in batch {
                let named = NamedType::new(&processable.package, &processable.name);
                let item = resolver.find_type_item(&named)?;
                if is_component(&item.kind) {
                    let key = (named.name.clone(), named.package.clone());
                    self.expanding.insert(key.clone());
                    let result = self.expand_component(resolver, &named, &item);
                    self.expanding.remove(&key);
                    self.components.add(result?.to_field());
                } else {
                    warn!(
                        "{}::{} is not a struct or unit enum, nothing to register",
                        named.package, named.name
                    );
                }
                self.worklist.finalize(processable);
                expanded += 1;
            }
        }

        Ok(expanded)
    }
}

/// Whether a type item is registered as a component rather than expanded in place
fn is_component(kind: &TypeItemKind) -> bool {
    match kind {
        TypeItemKind::Struct(s) => matches!(s.fields, syn::Fields::Named(_)),
        TypeItemKind::Enum(e) => e.variants.iter().all(|v| matches!(v.fields, syn::Fields::Unit)),
        TypeItemKind::Alias(_) => false,
    }
}

/// `Page<User>` → `Page_User`
fn instance_name(named: &NamedType) -> String {
    let mut name = named.name.clone();
    for arg in &named.args {
        name.push('_');
        name.extend(arg.to_string().chars().filter(|c| c.is_alphanumeric() || *c == '_'));
    }
    name
}

/// Unit-only enum: serde-named string values, or integer discriminants when serde is not derived
fn expand_enum(resolver: &mut Resolver, item: &TypeItem, e: &syn::ItemEnum) -> Result<ResolvedType> {
    let container = ContainerAttrs::parse(&e.attrs)?;
    let numeric = !container.serde_derived
        && !e.variants.is_empty()
        && e.variants.iter().all(|v| v.discriminant.is_some());

    let mut values = Vec::new();
    for variant in &e.variants {
        let value = match &variant.discriminant {
            Some((_, expr)) if numeric => resolver.expression_value(&item.scope, expr)?,
            _ => ConstValue::Str(variant_name(variant, &container)?),
        };
        values.push(value);
    }

    let primitive = if numeric { PrimitiveType::I64 } else { PrimitiveType::String };
    let mut resolved = ResolvedType::primitive(primitive);
    resolved.enum_values = values;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldKind;
    use crate::resolver::test_support::resolver_for;
    use pretty_assertions::assert_eq;

    const MODELS: &str = r#"
        use serde::{Deserialize, Serialize};

        /// A registered user
        #[derive(Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct User {
            pub user_id: u64,
            /// Shown name
            pub display_name: Option<String>,
            #[serde(skip)]
            pub password_hash: String,
            pub status: Status,
            pub friends: Vec<User>,
            #[serde(flatten)]
            pub audit: Audit,
        }

        #[derive(Serialize, Deserialize)]
        pub struct Audit {
            pub created_at: chrono::DateTime<chrono::Utc>,
        }

        #[derive(Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Status {
            Active,
            #[serde(rename = "locked")]
            Banned,
        }

        pub enum Level {
            Low = 1,
            High = 10,
        }

        pub type UserId = u64;

        pub struct Email(pub String);

        pub struct Internal {
            pub visible: u32,
            hidden: u32,
        }

        pub struct Page<T> {
            pub items: Vec<T>,
            pub total: UserId,
        }

        #[derive(Serialize)]
        pub struct Header {
            #[header("X-Request-Id")]
            #[serde(rename = "requestId")]
            pub request_id: String,
            #[header("X-Trace")]
            #[serde(rename = "X-Trace")]
            pub trace: String,
        }

        pub enum Event {
            Created { id: u64 },
            Deleted(u64),
        }

        pub struct Pair(pub u32, pub u32);
    "#;

    fn fixture() -> (tempfile::TempDir, Resolver) {
        resolver_for(&[("src/lib.rs", "pub mod models;"), ("src/models.rs", MODELS)])
    }

    fn named(name: &str) -> StaticType {
        StaticType::Named(NamedType::new("crate::models", name))
    }

    #[test]
    fn test_struct_becomes_component_with_tag_rules() {
        let (_dir, mut resolver) = fixture();
        let mut materializer = Materializer::new(Mode::Discover);

        let user = materializer.materialize(&mut resolver, &named("User")).unwrap();
        assert!(user.is_reference());
        assert_eq!(user.doc.as_deref(), Some("A registered user"));

        let component = materializer.components().get("User", "crate::models").unwrap();
        assert_eq!(component.kind, FieldKind::Struct);
        let names: Vec<&str> = component.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["userId", "displayName", "status", "friends", "audit"]);

        let display_name = &component.properties[1];
        assert!(!display_name.required);
        assert_eq!(display_name.doc.as_deref(), Some("Shown name"));
        assert!(component.properties[0].required);

        // self reference through Vec<User> stays a reference
        let friends = &component.properties[3].field;
        assert_eq!(friends.kind, FieldKind::Slice);
        assert_eq!(friends.items.as_ref().unwrap().kind, FieldKind::Reference);

        assert!(component.properties[4].embedded);
        assert!(materializer.components().contains("Audit", "crate::models"));
        assert!(materializer.components().contains("Status", "crate::models"));
    }

    #[test]
    fn test_materializing_twice_is_deterministic() {
        let (_dir, mut resolver) = fixture();
        let mut first = Materializer::new(Mode::Discover);
        let mut second = Materializer::new(Mode::Discover);

        let a = first.materialize(&mut resolver, &named("User")).unwrap();
        let b = second.materialize(&mut resolver, &named("User")).unwrap();
        assert_eq!(a, b);
        assert_eq!(first.components(), second.components());

        // a second request on the same materializer adds nothing
        let count = first.components().len();
        let again = first.materialize(&mut resolver, &named("User")).unwrap();
        assert_eq!(again.name, "User");
        assert_eq!(first.components().len(), count);
    }

    #[test]
    fn test_unit_enum_values() {
        let (_dir, mut resolver) = fixture();
        let mut materializer = Materializer::new(Mode::Discover);

        materializer.materialize(&mut resolver, &named("Status")).unwrap();
        let status = materializer.components().get("Status", "crate::models").unwrap();
        assert_eq!(
            status.enum_values,
            vec![ConstValue::Str("active".into()), ConstValue::Str("locked".into())]
        );

        materializer.materialize(&mut resolver, &named("Level")).unwrap();
        let level = materializer.components().get("Level", "crate::models").unwrap();
        assert_eq!(level.enum_values, vec![ConstValue::Int(1), ConstValue::Int(10)]);
        assert_eq!(level.primitive, Some(PrimitiveType::I64));
    }

    #[test]
    fn test_transparent_types() {
        let (_dir, mut resolver) = fixture();
        let mut materializer = Materializer::new(Mode::Discover);

        let id = materializer.materialize(&mut resolver, &named("UserId")).unwrap();
        assert_eq!(id.shape, Shape::Primitive(PrimitiveType::U64));

        let email = materializer.materialize(&mut resolver, &named("Email")).unwrap();
        assert_eq!(email.shape, Shape::Primitive(PrimitiveType::String));

        let event = materializer.materialize(&mut resolver, &named("Event")).unwrap();
        assert_eq!(event.shape, Shape::Any);

        assert!(materializer.components().is_empty());
    }

    #[test]
    fn test_private_fields_are_hidden_without_serde() {
        let (_dir, mut resolver) = fixture();
        let mut materializer = Materializer::new(Mode::Discover);

        materializer.materialize(&mut resolver, &named("Internal")).unwrap();
        let internal = materializer.components().get("Internal", "crate::models").unwrap();
        assert_eq!(internal.properties.len(), 1);
        assert_eq!(internal.properties[0].name, "visible");
    }

    #[test]
    fn test_generic_instantiation_is_expanded_in_place() {
        let (_dir, mut resolver) = fixture();
        let mut materializer = Materializer::new(Mode::Discover);

        let mut page = NamedType::new("crate::models", "Page");
        page.args = vec![named("User")];
        let resolved = materializer.materialize(&mut resolver, &StaticType::Named(page)).unwrap();

        assert_eq!(resolved.name, "Page_User");
        let shape = resolved.as_struct().unwrap();
        match &shape.fields[0].ty.shape {
            Shape::Slice(items) => assert_eq!(items.name, "User"),
            other => panic!("expected a slice, got {:?}", other),
        }
        assert_eq!(shape.fields[1].ty.shape, Shape::Primitive(PrimitiveType::U64));
        assert!(!materializer.components().contains("Page", "crate::models"));
    }

    #[test]
    fn test_uniformity() {
        let (_dir, mut resolver) = fixture();
        let mut materializer = Materializer::new(Mode::Discover);

        materializer.materialize(&mut resolver, &named("Header")).unwrap();
        let header = materializer.components().get("Header", "crate::models").unwrap();
        assert!(!header.uniform);

        materializer.materialize(&mut resolver, &named("Audit")).unwrap();
        let audit = materializer.components().get("Audit", "crate::models").unwrap();
        assert!(audit.uniform);
    }

    #[test]
    fn test_unsupported_shapes() {
        let (_dir, mut resolver) = fixture();
        let mut materializer = Materializer::new(Mode::Discover);

        let tuple = StaticType::Tuple(vec![StaticType::Unit]);
        let err = materializer.materialize(&mut resolver, &tuple).unwrap_err();
        assert!(matches!(err, AnalysisError::Unsupported(_)));

        let err = materializer.materialize(&mut resolver, &named("Pair")).unwrap_err();
        assert!(matches!(err, AnalysisError::Unsupported(_)));

        let external = StaticType::Named(NamedType::new("reqwest", "Client"));
        assert!(materializer.materialize(&mut resolver, &external).is_err());
    }

    #[test]
    fn test_deferred_types_are_expanded_by_the_worklist() {
        let (_dir, mut resolver) = fixture();
        let mut materializer = Materializer::new(Mode::Defer);

        let user = materializer.materialize(&mut resolver, &named("User")).unwrap();
        assert!(user.is_reference());
        assert!(materializer.components().is_empty());
        assert_eq!(materializer.worklist().len(), 1);

        // queued once, however often it is met
        materializer.materialize(&mut resolver, &named("User")).unwrap();
        assert_eq!(materializer.worklist().len(), 1);

        let expanded = materializer.process_worklist(&mut resolver).unwrap();
        assert_eq!(expanded, 3);
        assert!(materializer.worklist().is_empty());
        assert_eq!(materializer.mode(), Mode::Defer);

        let names: Vec<&str> = materializer.components().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Status", "Audit"]);
    }

    #[test]
    fn test_resume_does_not_reexpand_components() {
        let (_dir, mut resolver) = fixture();
        let mut first = Materializer::new(Mode::Discover);
        first.materialize(&mut resolver, &named("Status")).unwrap();
        let (components, pending) = first.into_parts();
        assert!(pending.is_empty());

        let mut resumed = Materializer::from_parts(
            Mode::Defer,
            components,
            vec![Processable::new("crate::models", "Audit")],
        );
        assert!(!resumed.add_to_be_processed(Processable::new("crate::models", "Status")));
        assert_eq!(resumed.process_worklist(&mut resolver).unwrap(), 1);
        assert_eq!(resumed.components().len(), 2);
    }
}
