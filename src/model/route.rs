use super::field::Field;
use crate::tags::BindingFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// HTTP methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    /// Maps a router method name (`get`, `POST`) to its HTTP method
    pub fn from_name(name: &str) -> Option<Self> {
        let method = match name.to_ascii_lowercase().as_str() {
            "get" => HttpMethod::Get,
            "post" => HttpMethod::Post,
            "put" => HttpMethod::Put,
            "delete" => HttpMethod::Delete,
            "patch" => HttpMethod::Patch,
            "options" => HttpMethod::Options,
            "head" => HttpMethod::Head,
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a route's handler is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerLocation {
    pub file: PathBuf,
    /// Module path (`crate::api::users`)
    pub package: String,
    pub function: String,
}

/// A named request value: path/query parameter, header or body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub field: Field,
    pub required: bool,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_map: bool,
    /// Decoded as a whole struct rather than read as one named value
    #[serde(default)]
    pub is_bound: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, field: Field, required: bool) -> Self {
        Self {
            name: name.into(),
            field,
            required,
            is_array: false,
            is_map: false,
            is_bound: false,
        }
    }
}

/// One status-coded response a handler can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnType {
    pub status_code: u16,
    pub content_type: String,
    /// Response body; a nil field when the response has none
    pub field: Field,
}

impl ReturnType {
    /// Same status, content type and body type
    pub fn same_as(&self, other: &ReturnType) -> bool {
        self.status_code == other.status_code
            && self.content_type == other.content_type
            && self.field.same_type(&other.field)
    }
}

/// Everything known about one (method, path) endpoint.
///
/// Created as a stub when the route registration is discovered, then filled in by the walker
/// as it recognizes calls in the handler body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
    /// Content type of the request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Format the request body is decoded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_type: Option<BindingFormat>,
    #[serde(default)]
    pub path_params: Vec<Param>,
    #[serde(default)]
    pub query_params: Vec<Param>,
    #[serde(default)]
    pub body: Vec<Param>,
    #[serde(default)]
    pub request_headers: Vec<Param>,
    #[serde(default)]
    pub response_headers: Vec<Param>,
    #[serde(default)]
    pub return_types: Vec<ReturnType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    pub operation_id: String,
    pub handler: HandlerLocation,
}

impl Route {
    pub fn new(method: HttpMethod, path: impl Into<String>, handler: HandlerLocation) -> Self {
        Self {
            method,
            path: path.into(),
            content_type: None,
            body_type: None,
            path_params: Vec::new(),
            query_params: Vec::new(),
            body: Vec::new(),
            request_headers: Vec::new(),
            response_headers: Vec::new(),
            return_types: Vec::new(),
            doc: None,
            operation_id: handler.function.clone(),
            handler,
        }
    }

    /// Appends a return type unless an equal one is already recorded
    pub fn add_return_type(&mut self, return_type: ReturnType) -> bool {
        if self.return_types.iter().any(|rt| rt.same_as(&return_type)) {
            return false;
        }
        self.return_types.push(return_type);
        true
    }

    pub fn add_path_param(&mut self, param: Param) -> bool {
        push_unique(&mut self.path_params, param)
    }

    pub fn add_query_param(&mut self, param: Param) -> bool {
        push_unique(&mut self.query_params, param)
    }

    pub fn add_body(&mut self, param: Param) -> bool {
        push_unique(&mut self.body, param)
    }

    pub fn add_request_header(&mut self, param: Param) -> bool {
        push_unique(&mut self.request_headers, param)
    }

    pub fn add_response_header(&mut self, param: Param) -> bool {
        push_unique(&mut self.response_headers, param)
    }

    /// `GET /users/:id`
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Appends a param unless one with the same name is present
fn push_unique(params: &mut Vec<Param>, param: Param) -> bool {
    if params.iter().any(|p| p.name == param.name) {
        return false;
    }
    params.push(param);
    true
}
