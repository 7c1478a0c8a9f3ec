use crate::model::{Field, Property};
use crate::resolver::{ConstValue, PrimitiveType};
use crate::tags::{BindingFormat, FieldTags};

/// In-memory description of a materialized type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedType {
    pub name: String,
    pub package: String,
    pub shape: Shape,
    pub doc: Option<String>,
    /// Values of a unit-only enum
    pub enum_values: Vec<ConstValue>,
    pub constant: Option<ConstValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Primitive(PrimitiveType),
    Struct(StructShape),
    Slice(Box<ResolvedType>),
    Array(Box<ResolvedType>, usize),
    Map(Box<ResolvedType>, Box<ResolvedType>),
    /// Named type expanded (or queued for expansion) as a component
    Reference,
    Any,
    Nil,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructShape {
    pub fields: Vec<StructField>,
    /// Every field is named the same in every format
    pub uniform: bool,
    pub formats: Vec<BindingFormat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    /// Display name
    pub name: String,
    pub ty: ResolvedType,
    pub embedded: bool,
    pub required: bool,
    pub tags: FieldTags,
    pub doc: Option<String>,
}

impl ResolvedType {
    fn with_shape(shape: Shape) -> Self {
        Self {
            name: String::new(),
            package: String::new(),
            shape,
            doc: None,
            enum_values: Vec::new(),
            constant: None,
        }
    }

    pub fn primitive(primitive: PrimitiveType) -> Self {
        let mut resolved = Self::with_shape(Shape::Primitive(primitive));
        resolved.name = primitive.name().to_string();
        resolved
    }

    pub fn reference(name: impl Into<String>, package: impl Into<String>) -> Self {
        let mut resolved = Self::with_shape(Shape::Reference);
        resolved.name = name.into();
        resolved.package = package.into();
        resolved
    }

    pub fn slice(items: ResolvedType) -> Self {
        Self::with_shape(Shape::Slice(Box::new(items)))
    }

    pub fn array(items: ResolvedType, length: usize) -> Self {
        Self::with_shape(Shape::Array(Box::new(items), length))
    }

    pub fn map(key: ResolvedType, value: ResolvedType) -> Self {
        Self::with_shape(Shape::Map(Box::new(key), Box::new(value)))
    }

    pub fn any() -> Self {
        Self::with_shape(Shape::Any)
    }

    pub fn nil() -> Self {
        Self::with_shape(Shape::Nil)
    }

    pub fn named(mut self, name: impl Into<String>, package: impl Into<String>) -> Self {
        self.name = name.into();
        self.package = package.into();
        self
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.shape, Shape::Reference)
    }

    pub fn as_struct(&self) -> Option<&StructShape> {
        match &self.shape {
            Shape::Struct(shape) => Some(shape),
            _ => None,
        }
    }

    /// Flattens into the serializable form
    pub fn to_field(&self) -> Field {
        let mut field = match &self.shape {
            Shape::Primitive(primitive) => Field::primitive(*primitive),
            Shape::Struct(shape) => {
                let properties = shape.fields.iter().map(StructField::to_property).collect();
                let mut field = Field::structure(&self.name, &self.package, properties);
                field.uniform = shape.uniform;
                field.formats = shape.formats.clone();
                field
            }
            Shape::Slice(items) => Field::slice(items.to_field()),
            Shape::Array(items, length) => Field::array(items.to_field(), *length),
            Shape::Map(key, value) => Field::map(key.to_field(), value.to_field()),
            Shape::Reference => Field::reference(&self.name, &self.package),
            Shape::Any => Field::any(),
            Shape::Nil => Field::nil(),
        };
        if !self.name.is_empty() {
            field.name = self.name.clone();
            field.package = self.package.clone();
        }
        field.doc = self.doc.clone();
        field.enum_values = self.enum_values.clone();
        field.constant = self.constant.clone();
        field
    }
}

impl StructField {
    fn to_property(&self) -> Property {
        Property {
            name: self.name.clone(),
            field: self.ty.to_field(),
            embedded: self.embedded,
            required: self.required,
            formats: self.tags.formats.clone(),
            validations: self.tags.validations.clone(),
            doc: self.doc.clone(),
        }
    }
}
