//! The service model: routes, components and the named types still waiting to be expanded.

pub mod field;
pub mod route;

pub use field::{Field, FieldKind, Property};
pub use route::{HandlerLocation, HttpMethod, Param, ReturnType, Route};

use crate::config::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named type seen but not yet expanded into a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Processable {
    /// Module path of the declaring module
    pub package: String,
    pub name: String,
}

impl Processable {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }
}

/// Finalized named types in discovery order, unique by (name, package).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Field>", into = "Vec<Field>")]
pub struct ComponentList {
    fields: Vec<Field>,
    index: HashMap<(String, String), usize>,
}

impl ComponentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a component unless one with the same name and package exists
    pub fn add(&mut self, field: Field) -> bool {
        let key = (field.name.clone(), field.package.clone());
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.fields.len());
        self.fields.push(field);
        true
    }

    pub fn contains(&self, name: &str, package: &str) -> bool {
        self.index
            .contains_key(&(name.to_string(), package.to_string()))
    }

    pub fn get(&self, name: &str, package: &str) -> Option<&Field> {
        self.index
            .get(&(name.to_string(), package.to_string()))
            .map(|i| &self.fields[*i])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }
}

impl From<Vec<Field>> for ComponentList {
    fn from(fields: Vec<Field>) -> Self {
        let mut list = ComponentList::new();
        for field in fields {
            list.add(field);
        }
        list
    }
}

impl From<ComponentList> for Vec<Field> {
    fn from(list: ComponentList) -> Self {
        list.fields
    }
}

/// Result of an analysis run, and the state persisted between the two phases of a deferred run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceModel {
    pub config: AnalyzerConfig,
    pub routes: Vec<Route>,
    pub components: ComponentList,
    /// Named types discovered but not expanded yet
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<Processable>,
}

impl ServiceModel {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            routes: Vec::new(),
            components: ComponentList::new(),
            pending: Vec::new(),
        }
    }

    /// Whether every discovered named type has been expanded
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}
