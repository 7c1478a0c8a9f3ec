//! Built-in request/response operations of the request context.

use super::builder::CallBuilder;
use crate::error::Result;
use crate::model::{Field, Param, ReturnType, Route};
use crate::resolver::PrimitiveType;
use crate::tags::BindingFormat;

/// Where a bound value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindSource {
    Body(BindingFormat),
    Query,
    Header,
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    PathParam,
    QueryParam,
    QueryArray,
    QueryMap,
    Header,
    Bind(BindSource),
    /// `(status, value)` rendered with a fixed content type
    Respond(&'static str),
    /// `(status, content_type, bytes)`
    RespondData,
    /// `(status)` with no body
    Status,
    /// `(status, location)`
    Redirect,
    /// `(name, value)`
    SetHeader,
}

const BUILTINS: &[(&str, Builtin)] = &[
    ("param", Builtin::PathParam),
    ("query", Builtin::QueryParam),
    ("default_query", Builtin::QueryParam),
    ("query_array", Builtin::QueryArray),
    ("query_map", Builtin::QueryMap),
    ("header", Builtin::Header),
    ("get_header", Builtin::Header),
    ("bind", Builtin::Bind(BindSource::Body(BindingFormat::Json))),
    ("bind_json", Builtin::Bind(BindSource::Body(BindingFormat::Json))),
    ("bind_xml", Builtin::Bind(BindSource::Body(BindingFormat::Xml))),
    ("bind_yaml", Builtin::Bind(BindSource::Body(BindingFormat::Yaml))),
    ("bind_form", Builtin::Bind(BindSource::Body(BindingFormat::Form))),
    ("bind_query", Builtin::Bind(BindSource::Query)),
    ("bind_header", Builtin::Bind(BindSource::Header)),
    ("bind_uri", Builtin::Bind(BindSource::Path)),
    ("json", Builtin::Respond("application/json")),
    ("pretty_json", Builtin::Respond("application/json")),
    ("xml", Builtin::Respond("application/xml")),
    ("yaml", Builtin::Respond("application/yaml")),
    ("string", Builtin::Respond("text/plain")),
    ("html", Builtin::Respond("text/html")),
    ("data", Builtin::RespondData),
    ("status", Builtin::Status),
    ("abort_with_status", Builtin::Status),
    ("redirect", Builtin::Redirect),
    ("set_header", Builtin::SetHeader),
];

fn content_type(format: BindingFormat) -> &'static str {
    match format {
        BindingFormat::Xml => "application/xml",
        BindingFormat::Yaml => "application/yaml",
        BindingFormat::Form => "application/x-www-form-urlencoded",
        _ => "application/json",
    }
}

fn string() -> Field {
    Field::primitive(PrimitiveType::String)
}

fn lookup(method: &str) -> Option<Builtin> {
    BUILTINS
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, builtin)| *builtin)
}

/// Folds a context method call into the route; `None` when the method is not in the table.
pub fn apply(builder: &mut CallBuilder<'_>) -> Result<Option<Route>> {
    let Some(builtin) = lookup(&builder.name()) else {
        return Ok(None);
    };

    let route = match builtin {
        Builtin::PathParam => builder.value().build(|mut route, args| {
            route.add_path_param(Param::new(args.string(0)?, string(), true));
            Ok(route)
        })?,
        Builtin::QueryParam => builder.value().build(|mut route, args| {
            route.add_query_param(Param::new(args.string(0)?, string(), false));
            Ok(route)
        })?,
        Builtin::QueryArray => builder.value().build(|mut route, args| {
            let mut param = Param::new(args.string(0)?, Field::slice(string()), false);
            param.is_array = true;
            route.add_query_param(param);
            Ok(route)
        })?,
        Builtin::QueryMap => builder.value().build(|mut route, args| {
            let mut param = Param::new(args.string(0)?, Field::map(string(), string()), false);
            param.is_map = true;
            route.add_query_param(param);
            Ok(route)
        })?,
        Builtin::Header => builder.value().build(|mut route, args| {
            route.add_request_header(Param::new(args.string(0)?, string(), false));
            Ok(route)
        })?,
        Builtin::Bind(source) => {
            // `ctx.bind_json(&mut user)` names the target; `ctx.bind_json::<User>()` and
            // `let user: User = ctx.bind_json()` describe it
            let explicit = builder.arg_count() > 0;
            if explicit {
                builder.type_of();
            } else {
                builder.target_type();
            }
            builder.build(|mut route, args| {
                let resolved = if explicit { args.resolved(0)? } else { args.target()? };
                let name = if resolved.name.is_empty() { "body".to_string() } else { resolved.name.clone() };
                let mut param = Param::new(name, resolved.to_field(), true);
                param.is_bound = true;

                match source {
                    BindSource::Body(format) => {
                        route.content_type = Some(content_type(format).to_string());
                        route.body_type = Some(format);
                        route.add_body(param);
                    }
                    BindSource::Query => {
                        route.add_query_param(param);
                    }
                    BindSource::Header => {
                        route.add_request_header(param);
                    }
                    BindSource::Path => {
                        route.add_path_param(param);
                    }
                }
                Ok(route)
            })?
        }
        Builtin::Respond(content_type) => builder.status_code().type_of().build(|mut route, args| {
            route.add_return_type(ReturnType {
                status_code: args.status_code(0)?,
                content_type: content_type.to_string(),
                field: args.field(1)?,
            });
            Ok(route)
        })?,
        Builtin::RespondData => builder.status_code().value().type_of().build(|mut route, args| {
            route.add_return_type(ReturnType {
                status_code: args.status_code(0)?,
                content_type: args.string(1)?,
                field: args.field(2)?,
            });
            Ok(route)
        })?,
        Builtin::Status => builder.status_code().build(|mut route, args| {
            route.add_return_type(ReturnType {
                status_code: args.status_code(0)?,
                content_type: String::new(),
                field: Field::nil(),
            });
            Ok(route)
        })?,
        Builtin::Redirect => builder.status_code().ignore().build(|mut route, args| {
            route.add_return_type(ReturnType {
                status_code: args.status_code(0)?,
                content_type: String::new(),
                field: Field::nil(),
            });
            route.add_response_header(Param::new("Location", string(), true));
            Ok(route)
        })?,
        Builtin::SetHeader => builder.value().ignore().build(|mut route, args| {
            route.add_response_header(Param::new(args.string(0)?, string(), true));
            Ok(route)
        })?,
    };

    Ok(Some(route))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookup() {
        assert!(lookup("json").is_some());
        assert!(lookup("bind_query").is_some());
        assert!(lookup("user_agent").is_none());
        assert_eq!(lookup("bind_form"), Some(Builtin::Bind(BindSource::Body(BindingFormat::Form))));
    }

    #[test]
    fn test_body_content_types() {
        assert_eq!(content_type(BindingFormat::Json), "application/json");
        assert_eq!(content_type(BindingFormat::Form), "application/x-www-form-urlencoded");
    }
}
