//! Field attribute parsing: per-format binding names and per-framework validation flags.
//!
//! Binding formats are read from `#[serde(..)]` (JSON, XML and YAML all follow serde) and from
//! the request-extraction attributes `#[header(..)]`, `#[form(..)]` and `#[uri(..)]`.
//! Validation comes from `#[validate(..)]` (the `validator` crate) and `#[garde(..)]`.

use crate::error::{AnalysisError, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use syn::meta::ParseNestedMeta;

/// A serialization format a field can be bound from or rendered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingFormat {
    Header,
    Form,
    Uri,
    Json,
    Xml,
    Yaml,
    /// No format attribute on the field; the identifier applies everywhere
    Untagged,
}

pub const KNOWN_FORMATS: [BindingFormat; 6] = [
    BindingFormat::Header,
    BindingFormat::Form,
    BindingFormat::Uri,
    BindingFormat::Json,
    BindingFormat::Xml,
    BindingFormat::Yaml,
];

const SERDE_FORMATS: [BindingFormat; 3] = [BindingFormat::Json, BindingFormat::Xml, BindingFormat::Yaml];

/// How a field appears in one format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatTag {
    /// Display name
    pub name: String,
    /// `false` when the format skips the field
    pub shown: bool,
    /// `true` when the format tolerates the field being absent
    pub optional: bool,
}

impl FormatTag {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shown: true,
            optional: false,
        }
    }
}

/// A validation framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validator {
    Validator,
    Garde,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationTag {
    pub required: bool,
}

/// Everything the attributes of one field say about binding and validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldTags {
    pub formats: IndexMap<BindingFormat, FormatTag>,
    pub validations: IndexMap<Validator, ValidationTag>,
    /// `#[serde(flatten)]`
    pub flatten: bool,
}

impl FieldTags {
    /// Reads the tags of a field named `ident` (already adjusted by any container
    /// `rename_all`).
    ///
    /// Without any recognized format attribute the result has one `untagged` entry named
    /// `ident`.
    ///
    /// # Errors
    ///
    /// Returns a structural error when a recognized attribute is malformed.
    pub fn parse(attrs: &[syn::Attribute], ident: &str) -> Result<Self> {
        let mut tags = FieldTags::default();

        for attr in attrs {
            let Some(name) = attr.path().get_ident().map(|i| i.to_string()) else {
                continue;
            };
            match name.as_str() {
                "serde" => {
                    let base = tags.current(BindingFormat::Json, ident);
                    let tag = tags.parse_serde(attr, base)?;
                    for format in SERDE_FORMATS {
                        tags.formats.insert(format, tag.clone());
                    }
                }
                "header" => {
                    let tag = parse_format_attr(attr, tags.current(BindingFormat::Header, ident))?;
                    tags.formats.insert(BindingFormat::Header, tag);
                }
                "form" => {
                    let tag = parse_format_attr(attr, tags.current(BindingFormat::Form, ident))?;
                    tags.formats.insert(BindingFormat::Form, tag);
                }
                "uri" => {
                    let tag = parse_format_attr(attr, tags.current(BindingFormat::Uri, ident))?;
                    tags.formats.insert(BindingFormat::Uri, tag);
                }
                "validate" => {
                    let tag = parse_validation_attr(attr)?;
                    tags.validations.insert(Validator::Validator, tag);
                }
                "garde" => {
                    let tag = parse_validation_attr(attr)?;
                    tags.validations.insert(Validator::Garde, tag);
                }
                _ => {}
            }
        }

        if tags.formats.is_empty() {
            tags.formats
                .insert(BindingFormat::Untagged, FormatTag::named(ident));
        }
        Ok(tags)
    }

    /// Entry a repeated attribute of `format` refines
    fn current(&self, format: BindingFormat, ident: &str) -> FormatTag {
        self.formats
            .get(&format)
            .cloned()
            .unwrap_or_else(|| FormatTag::named(ident))
    }

    fn parse_serde(&mut self, attr: &syn::Attribute, mut tag: FormatTag) -> Result<FormatTag> {
        let unrenamed = tag.name.clone();
        if !matches!(attr.meta, syn::Meta::List(_)) {
            return Ok(tag);
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                if meta.input.peek(syn::Token![=]) {
                    tag.name = meta.value()?.parse::<syn::LitStr>()?.value();
                } else {
                    // rename(serialize = "..", deserialize = ".."): requests are deserialized
                    meta.parse_nested_meta(|inner| {
                        let value = inner.value()?.parse::<syn::LitStr>()?.value();
                        if inner.path.is_ident("deserialize") {
                            tag.name = value;
                        } else if inner.path.is_ident("serialize") && tag.name == unrenamed {
                            tag.name = value;
                        }
                        Ok(())
                    })?;
                }
            } else if meta.path.is_ident("skip")
                || meta.path.is_ident("skip_serializing")
                || meta.path.is_ident("skip_deserializing")
            {
                tag.shown = false;
            } else if meta.path.is_ident("default") || meta.path.is_ident("skip_serializing_if") {
                tag.optional = true;
                skip_meta(&meta)?;
            } else if meta.path.is_ident("flatten") {
                self.flatten = true;
            } else {
                skip_meta(&meta)?;
            }
            Ok(())
        })
        .map_err(|e| malformed("serde", e))?;

        Ok(tag)
    }

    /// Whether every format agrees on the field's display name
    pub fn is_uniform(&self) -> bool {
        let mut names = self.formats.values().map(|tag| tag.name.as_str());
        match names.next() {
            Some(first) => names.all(|name| name == first),
            None => true,
        }
    }

    /// Whether any format shows the field
    pub fn is_shown(&self) -> bool {
        self.formats.values().any(|tag| tag.shown)
    }

    /// Display name in the first format the field was tagged with
    pub fn display_name(&self) -> Option<&str> {
        self.formats.values().next().map(|tag| tag.name.as_str())
    }

    /// Requiredness as read from the tags.
    ///
    /// Only the first format entry's optionality is consulted; a `required` validation
    /// overrides it.
    pub fn is_required(&self) -> bool {
        if self.validations.values().any(|v| v.required) {
            return true;
        }
        self.formats
            .values()
            .next()
            .map(|tag| !tag.optional)
            .unwrap_or(true)
    }

    pub fn format(&self, format: BindingFormat) -> Option<&FormatTag> {
        self.formats.get(&format)
    }
}

/// Formats tagged anywhere in a set of fields; all known formats when nothing was tagged
pub fn observed_formats<'a>(fields: impl IntoIterator<Item = &'a FieldTags>) -> IndexSet<BindingFormat> {
    let mut observed: IndexSet<BindingFormat> = fields
        .into_iter()
        .flat_map(|tags| tags.formats.keys().copied())
        .filter(|format| *format != BindingFormat::Untagged)
        .collect();

    if observed.is_empty() {
        observed.extend(KNOWN_FORMATS);
    } else {
        observed.sort();
    }
    observed
}

/// `#[header(name = "X-Request-Id")]`, `#[form("user_name")]`, `#[uri(skip)]`
fn parse_format_attr(attr: &syn::Attribute, mut tag: FormatTag) -> Result<FormatTag> {
    let attr_name = attr
        .path()
        .get_ident()
        .map(|i| i.to_string())
        .unwrap_or_default();

    match &attr.meta {
        syn::Meta::Path(_) => return Ok(tag),
        syn::Meta::NameValue(nv) => {
            if let syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(s),
                ..
            }) = &nv.value
            {
                tag.name = s.value();
            }
            return Ok(tag);
        }
        syn::Meta::List(list) => {
            if let Ok(name) = list.parse_args::<syn::LitStr>() {
                tag.name = name.value();
                return Ok(tag);
            }
        }
    }

    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("name") || meta.path.is_ident("rename") {
            tag.name = meta.value()?.parse::<syn::LitStr>()?.value();
        } else if meta.path.is_ident("skip") {
            tag.shown = false;
        } else if meta.path.is_ident("optional") || meta.path.is_ident("default") {
            tag.optional = true;
            skip_meta(&meta)?;
        } else {
            skip_meta(&meta)?;
        }
        Ok(())
    })
    .map_err(|e| malformed(&attr_name, e))?;

    Ok(tag)
}

/// `#[validate(required, length(min = 1))]`, `#[garde(required)]`
fn parse_validation_attr(attr: &syn::Attribute) -> Result<ValidationTag> {
    let mut tag = ValidationTag::default();
    if !matches!(attr.meta, syn::Meta::List(_)) {
        return Ok(tag);
    }

    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("required") {
            tag.required = true;
        }
        skip_meta(&meta)
    })
    .map_err(|e| malformed("validation", e))?;

    Ok(tag)
}

/// Consumes the `= value` or `(..)` following an attribute key we do not interpret
fn skip_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _value: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta(&inner))?;
    }
    Ok(())
}

fn malformed(attr: &str, err: syn::Error) -> AnalysisError {
    AnalysisError::structural(format!("well-formed #[{}] attribute", attr), err.to_string())
}

/// A serde `rename_all` case convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    pub fn parse(rule: &str) -> Option<Self> {
        let rule = match rule {
            "lowercase" => RenameRule::Lower,
            "UPPERCASE" => RenameRule::Upper,
            "PascalCase" => RenameRule::Pascal,
            "camelCase" => RenameRule::Camel,
            "snake_case" => RenameRule::Snake,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnake,
            "kebab-case" => RenameRule::Kebab,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebab,
            _ => return None,
        };
        Some(rule)
    }

    /// Renames a `snake_case` field identifier
    pub fn apply_to_field(&self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => field.split('_').map(capitalize).collect(),
            RenameRule::Camel => {
                let pascal: String = field.split('_').map(capitalize).collect();
                lower_first(&pascal)
            }
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.replace('_', "-").to_ascii_uppercase(),
        }
    }

    /// Renames a `PascalCase` enum variant
    pub fn apply_to_variant(&self, variant: &str) -> String {
        match self {
            RenameRule::Pascal => variant.to_string(),
            RenameRule::Lower => variant.to_ascii_lowercase(),
            RenameRule::Upper => variant.to_ascii_uppercase(),
            RenameRule::Camel => lower_first(variant),
            RenameRule::Snake => to_snake(variant),
            RenameRule::ScreamingSnake => to_snake(variant).to_ascii_uppercase(),
            RenameRule::Kebab => to_snake(variant).replace('_', "-"),
            RenameRule::ScreamingKebab => to_snake(variant).replace('_', "-").to_ascii_uppercase(),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn to_snake(variant: &str) -> String {
    let mut snake = String::with_capacity(variant.len() + 4);
    for (i, ch) in variant.char_indices() {
        if i > 0 && ch.is_uppercase() {
            snake.push('_');
        }
        snake.push(ch.to_ascii_lowercase());
    }
    snake
}

/// Container-level attributes of a struct or enum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerAttrs {
    pub rename_all: Option<RenameRule>,
    /// Derives `Serialize` or `Deserialize`
    pub serde_derived: bool,
}

impl ContainerAttrs {
    pub fn parse(attrs: &[syn::Attribute]) -> Result<Self> {
        let mut container = ContainerAttrs::default();

        for attr in attrs {
            if attr.path().is_ident("derive") {
                attr.parse_nested_meta(|meta| {
                    if let Some(last) = meta.path.segments.last() {
                        if last.ident == "Serialize" || last.ident == "Deserialize" {
                            container.serde_derived = true;
                        }
                    }
                    Ok(())
                })
                .map_err(|e| malformed("derive", e))?;
            } else if attr.path().is_ident("serde") && matches!(attr.meta, syn::Meta::List(_)) {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename_all") {
                        if meta.input.peek(syn::Token![=]) {
                            let rule = meta.value()?.parse::<syn::LitStr>()?;
                            container.rename_all = RenameRule::parse(&rule.value());
                        } else {
                            meta.parse_nested_meta(|inner| {
                                let rule = inner.value()?.parse::<syn::LitStr>()?;
                                if inner.path.is_ident("deserialize") || container.rename_all.is_none() {
                                    container.rename_all = RenameRule::parse(&rule.value());
                                }
                                Ok(())
                            })?;
                        }
                        Ok(())
                    } else {
                        skip_meta(&meta)
                    }
                })
                .map_err(|e| malformed("serde", e))?;
            }
        }

        Ok(container)
    }

    /// Name a field is known by before its own attributes apply
    pub fn field_name(&self, ident: &str) -> String {
        let ident = ident.strip_prefix("r#").unwrap_or(ident);
        match self.rename_all {
            Some(rule) => rule.apply_to_field(ident),
            None => ident.to_string(),
        }
    }
}

/// Serialized name of an enum variant: its `#[serde(rename)]`, else the container rule
pub fn variant_name(variant: &syn::Variant, container: &ContainerAttrs) -> Result<String> {
    let ident = variant.ident.to_string();
    let fallback = match container.rename_all {
        Some(rule) => rule.apply_to_variant(&ident),
        None => ident.clone(),
    };

    for attr in &variant.attrs {
        if attr.path().is_ident("serde") && matches!(attr.meta, syn::Meta::List(_)) {
            let tags = FieldTags::parse(std::slice::from_ref(attr), &fallback)?;
            if let Some(name) = tags.display_name() {
                return Ok(name.to_string());
            }
        }
    }
    Ok(fallback)
}
