use crate::resolver::{ConstValue, PrimitiveType};
use crate::tags::{BindingFormat, FormatTag, ValidationTag, Validator};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Shape of a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Primitive,
    Struct,
    Slice,
    Array,
    Map,
    /// A named type registered as a component
    Reference,
    Any,
    Nil,
}

/// Serializable description of a materialized type.
///
/// Which of the optional members are set depends on `kind`: `primitive` for primitives,
/// `items` for slices and arrays (plus `length` for arrays), `key` and `value` for maps,
/// `properties` for structs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Type name (`User`, `Page_User`); the primitive name for primitives
    pub name: String,
    /// Module path of the declaring module; empty for built-in shapes
    #[serde(default)]
    pub package: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primitive: Option<PrimitiveType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Box<Field>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
    /// For structs: every property uses the same name in every format
    #[serde(default)]
    pub uniform: bool,
    /// For structs: formats tagged on any property
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<BindingFormat>,
    /// Values of a unit-only enum
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<ConstValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Constant value, when the field was produced from a constant expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<ConstValue>,
}

/// One shown field of a struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Display name
    pub name: String,
    pub field: Field,
    /// Flattened into the enclosing struct
    #[serde(default)]
    pub embedded: bool,
    pub required: bool,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub formats: IndexMap<BindingFormat, FormatTag>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub validations: IndexMap<Validator, ValidationTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl Field {
    fn shape(name: impl Into<String>, package: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            kind,
            primitive: None,
            items: None,
            length: None,
            key: None,
            value: None,
            properties: Vec::new(),
            uniform: false,
            formats: Vec::new(),
            enum_values: Vec::new(),
            doc: None,
            constant: None,
        }
    }

    pub fn primitive(primitive: PrimitiveType) -> Self {
        let mut field = Self::shape(primitive.name(), "", FieldKind::Primitive);
        field.primitive = Some(primitive);
        field
    }

    pub fn reference(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self::shape(name, package, FieldKind::Reference)
    }

    pub fn structure(name: impl Into<String>, package: impl Into<String>, properties: Vec<Property>) -> Self {
        let mut field = Self::shape(name, package, FieldKind::Struct);
        field.properties = properties;
        field
    }

    pub fn slice(items: Field) -> Self {
        let mut field = Self::shape("", "", FieldKind::Slice);
        field.items = Some(Box::new(items));
        field
    }

    pub fn array(items: Field, length: usize) -> Self {
        let mut field = Self::shape("", "", FieldKind::Array);
        field.items = Some(Box::new(items));
        field.length = Some(length);
        field
    }

    pub fn map(key: Field, value: Field) -> Self {
        let mut field = Self::shape("", "", FieldKind::Map);
        field.key = Some(Box::new(key));
        field.value = Some(Box::new(value));
        field
    }

    pub fn any() -> Self {
        Self::shape("", "", FieldKind::Any)
    }

    pub fn nil() -> Self {
        Self::shape("", "", FieldKind::Nil)
    }

    pub fn is_nil(&self) -> bool {
        self.kind == FieldKind::Nil
    }

    /// Whether two fields describe the same type (ignoring docs, constants and tags)
    pub fn same_type(&self, other: &Field) -> bool {
        if self.kind != other.kind {
            return false;
        }
        let same_box = |a: &Option<Box<Field>>, b: &Option<Box<Field>>| match (a, b) {
            (Some(a), Some(b)) => a.same_type(b),
            (None, None) => true,
            _ => false,
        };
        match self.kind {
            FieldKind::Primitive => self.primitive == other.primitive,
            FieldKind::Struct | FieldKind::Reference => {
                self.name == other.name && self.package == other.package
            }
            FieldKind::Slice => same_box(&self.items, &other.items),
            FieldKind::Array => self.length == other.length && same_box(&self.items, &other.items),
            FieldKind::Map => same_box(&self.key, &other.key) && same_box(&self.value, &other.value),
            FieldKind::Any | FieldKind::Nil => true,
        }
    }

    /// Name shown in logs: `User`, `Vec<User>`, `Map<string, u32>`
    pub fn type_name(&self) -> String {
        let inner = |f: &Option<Box<Field>>| f.as_ref().map(|f| f.type_name()).unwrap_or_default();
        match self.kind {
            FieldKind::Primitive | FieldKind::Struct | FieldKind::Reference => self.name.clone(),
            FieldKind::Slice => format!("Vec<{}>", inner(&self.items)),
            FieldKind::Array => format!("[{}; {}]", inner(&self.items), self.length.unwrap_or(0)),
            FieldKind::Map => format!("Map<{}, {}>", inner(&self.key), inner(&self.value)),
            FieldKind::Any => "any".to_string(),
            FieldKind::Nil => "nil".to_string(),
        }
    }
}
