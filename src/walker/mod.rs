//! Route extraction: walks handler bodies and folds recognized calls into routes.

pub mod builder;
pub mod calls;
pub mod methods;
pub mod recognizer;

pub use builder::{ArgValue, Arguments, CallBuilder};
pub use recognizer::{from_fn, FnRecognizer, Handling, Recognizer};

use crate::config::ContextType;
use crate::error::{AnalysisError, Result};
use crate::materializer::Materializer;
use crate::model::Route;
use crate::resolver::call::FunctionDecl;
use crate::resolver::{CallSite, Callee, Resolver, Scope};
use builder::names_local;
use calls::{collect_calls, CollectedCall};
use log::{debug, warn};
use std::sync::Arc;

/// Walks one handler (and the helpers it hands the request context to).
pub struct RouteWalker<'a> {
    resolver: &'a mut Resolver,
    materializer: &'a mut Materializer,
    recognizers: &'a [Box<dyn Recognizer>],
    context: &'a ContextType,
    max_depth: usize,
}

impl<'a> RouteWalker<'a> {
    pub fn new(
        resolver: &'a mut Resolver,
        materializer: &'a mut Materializer,
        recognizers: &'a [Box<dyn Recognizer>],
        context: &'a ContextType,
        max_depth: usize,
    ) -> Self {
        Self {
            resolver,
            materializer,
            recognizers,
            context,
            max_depth,
        }
    }

    /// Walks `func` and returns the route with everything its calls contribute.
    ///
    /// At depth 0 `func` is the handler: it must take the request context and the walk must
    /// record at least one response. Deeper calls are helpers; one without a context parameter
    /// contributes nothing.
    ///
    /// # Errors
    ///
    /// The first error met while processing a call aborts the walk.
    pub fn walk(&mut self, func: &Arc<FunctionDecl>, route: Route, depth: usize) -> Result<Route> {
        if depth > self.max_depth {
            warn!(
                "Not descending into {}: helper depth {} exceeds {}",
                func.name, depth, self.max_depth
            );
            return Ok(route);
        }

        let context = self.resolver.find_argument_name_by_type(
            func,
            &self.context.name,
            &self.context.package,
            true,
        );
        if context.is_empty() {
            if depth == 0 {
                return Err(AnalysisError::unsupported(format!(
                    "handler {} without a {} parameter",
                    func.name, self.context
                )));
            }
            return Ok(route);
        }

        debug!("Walking {} (depth {}, context {})", func.name, depth, context);
        let scope = func.scope();
        let mut route = route;
        for call in collect_calls(&func.body) {
            route = self.visit_call(&scope, &context, call, route, depth)?;
        }

        if depth == 0 {
            if route.return_types.is_empty() {
                return Err(AnalysisError::NoResponse(format!(
                    "{} ({})",
                    func.name,
                    route.label()
                )));
            }
            if route.doc.is_none() {
                route.doc = func.doc.clone();
            }
        }
        Ok(route)
    }

    fn visit_call(
        &mut self,
        scope: &Scope,
        context: &str,
        call: CollectedCall<'_>,
        route: Route,
        depth: usize,
    ) -> Result<Route> {
        let recognizers = self.recognizers;
        for recognizer in recognizers {
            let mut builder = CallBuilder::new(
                self.resolver,
                self.materializer,
                scope,
                call.site,
                call.let_type,
                &route,
            );
            if let Handling::Handled(next) = recognizer.try_handle(context, &mut builder)? {
                debug!("{} handled by a recognizer", call.site.name());
                return Ok(next);
            }
        }

        if call.site.args().iter().any(|arg| names_local(arg, context)) {
            return self.walk_callee(scope, call.site, route, depth);
        }

        if call.site.receiver().is_some_and(|r| names_local(r, context)) {
            let mut builder = CallBuilder::new(
                self.resolver,
                self.materializer,
                scope,
                call.site,
                call.let_type,
                &route,
            );
            if let Some(next) = methods::apply(&mut builder)? {
                return Ok(next);
            }
            debug!("Ignoring {}.{}()", context, call.site.name());
        }

        Ok(route)
    }

    /// Re-enters the walker on a helper that receives the context
    fn walk_callee(&mut self, scope: &Scope, site: CallSite<'_>, route: Route, depth: usize) -> Result<Route> {
        match self.resolver.call_function(scope, site)? {
            Callee::Function(callee) => {
                debug!("Descending into {} from {}", callee.name, scope.package_path());
                self.walk(&callee, route, depth + 1)
            }
            Callee::External(name) => {
                debug!("Skipping {}: declared outside the crate", name);
                Ok(route)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materializer::Mode;
    use crate::model::{Field, FieldKind, HandlerLocation, HttpMethod, Param};
    use crate::resolver::test_support::resolver_for;
    use crate::resolver::PrimitiveType;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const LIB: &str = "pub mod models; pub mod api; pub mod helpers;";

    const MODELS: &str = r#"
        use serde::{Deserialize, Serialize};

        #[derive(Serialize, Deserialize)]
        pub struct User { pub id: u64, pub name: String }

        #[derive(Deserialize)]
        pub struct NewUser { pub name: String }

        #[derive(Serialize)]
        pub struct ApiError { pub message: String }
    "#;

    const HELPERS: &str = r#"
        use web::Context;
        use crate::models::ApiError;

        /// Rejects requests without a token
        pub fn require_token(ctx: &mut Context) {
            ctx.header("Authorization");
            ctx.json(401, &ApiError { message: String::new() });
        }

        pub fn log_request(path: &str) {}
    "#;

    const API: &str = r#"
        use web::Context;
        use http::StatusCode;
        use crate::models::{NewUser, User, ApiError};
        use crate::helpers;

        const NOT_FOUND: u16 = 404;

        /// Updates a user
        pub fn update_user(ctx: &mut Context) {
            let id = ctx.param("id");
            let verbose = ctx.query("verbose");
            let body: NewUser = ctx.bind_json();
            ctx.user_agent();
            ctx.json(StatusCode::OK, &User { id: 1, name: body.name });
            ctx.json(400, &ApiError { message: String::new() });
        }

        pub fn guarded(ctx: &mut Context) {
            helpers::require_token(ctx);
            helpers::log_request("/x");
            ctx.status(NOT_FOUND);
        }

        pub fn lookup(ctx: &mut Context) {
            let id = ctx.param("id");
            ctx.user_agent();
            ctx.json(200, &User { id: 1, name: String::new() });
        }

        pub fn lookup_plain(ctx: &mut Context) {
            let id = ctx.param("id");
            ctx.json(200, &User { id: 1, name: String::new() });
        }

        pub fn reborrowed(ctx: &mut Context) {
            helpers::require_token(&mut *ctx);
            ctx.status(204);
        }

        pub fn silent(ctx: &mut Context) {
            ctx.param("id");
        }

        pub fn no_context(id: u64) {}

        pub fn recursive(ctx: &mut Context) {
            recursive(ctx);
            ctx.status(204);
        }
    "#;

    fn fixture() -> (tempfile::TempDir, Resolver) {
        resolver_for(&[
            ("src/lib.rs", LIB),
            ("src/models.rs", MODELS),
            ("src/helpers.rs", HELPERS),
            ("src/api.rs", API),
        ])
    }

    fn stub(function: &str) -> Route {
        Route::new(
            HttpMethod::Put,
            "/users/:id",
            HandlerLocation {
                file: PathBuf::from("src/api.rs"),
                package: "crate::api".into(),
                function: function.into(),
            },
        )
    }

    fn walk(resolver: &mut Resolver, function: &str, recognizers: &[Box<dyn Recognizer>]) -> Result<Route> {
        walk_into(resolver, function, stub(function), recognizers)
    }

    fn walk_into(
        resolver: &mut Resolver,
        function: &str,
        route: Route,
        recognizers: &[Box<dyn Recognizer>],
    ) -> Result<Route> {
        let mut materializer = Materializer::new(Mode::Discover);
        let context = ContextType::default();
        let handler = resolver.function_named("crate::api", function).unwrap();
        RouteWalker::new(resolver, &mut materializer, recognizers, &context, 8).walk(&handler, route, 0)
    }

    #[test]
    fn test_handler_parameters_and_responses() {
        let (_dir, mut resolver) = fixture();
        let route = walk(&mut resolver, "update_user", &[]).unwrap();

        assert_eq!(route.path_params, vec![Param::new("id", Field::primitive(PrimitiveType::String), true)]);
        assert_eq!(route.query_params.len(), 1);
        assert_eq!(route.query_params[0].name, "verbose");
        assert!(!route.query_params[0].required);

        assert_eq!(route.body.len(), 1);
        assert!(route.body[0].is_bound);
        assert_eq!(route.body[0].field.name, "NewUser");
        assert_eq!(route.content_type.as_deref(), Some("application/json"));

        let statuses: Vec<u16> = route.return_types.iter().map(|r| r.status_code).collect();
        assert_eq!(statuses, vec![200, 400]);
        assert_eq!(route.return_types[0].field.kind, FieldKind::Reference);
        assert_eq!(route.doc.as_deref(), Some("Updates a user"));
    }

    #[test]
    fn test_helpers_receiving_the_context_are_folded_in() {
        let (_dir, mut resolver) = fixture();
        let route = walk(&mut resolver, "guarded", &[]).unwrap();

        assert_eq!(route.request_headers.len(), 1);
        assert_eq!(route.request_headers[0].name, "Authorization");

        // the helper's file resolved its own imports; NOT_FOUND still resolves in api.rs
        let statuses: Vec<u16> = route.return_types.iter().map(|r| r.status_code).collect();
        assert_eq!(statuses, vec![401, 404]);
        assert_eq!(route.return_types[0].field.name, "ApiError");
        assert!(route.return_types[1].field.is_nil());

        // the helper's doc is not the handler's
        assert_eq!(route.doc, None);
    }

    #[test]
    fn test_reborrowed_context_reaches_helpers() {
        let (_dir, mut resolver) = fixture();
        let route = walk(&mut resolver, "reborrowed", &[]).unwrap();

        assert_eq!(route.request_headers.len(), 1);
        let statuses: Vec<u16> = route.return_types.iter().map(|r| r.status_code).collect();
        assert_eq!(statuses, vec![401, 204]);
    }

    #[test]
    fn test_handler_without_response_is_an_error() {
        let (_dir, mut resolver) = fixture();
        let err = walk(&mut resolver, "silent", &[]).unwrap_err();
        assert!(matches!(err, AnalysisError::NoResponse(_)));
    }

    #[test]
    fn test_handler_without_context_is_an_error() {
        let (_dir, mut resolver) = fixture();
        let err = walk(&mut resolver, "no_context", &[]).unwrap_err();
        assert!(matches!(err, AnalysisError::Unsupported(_)));
    }

    #[test]
    fn test_recursion_stops_at_the_depth_cap() {
        let (_dir, mut resolver) = fixture();
        let route = walk(&mut resolver, "recursive", &[]).unwrap();
        assert_eq!(route.return_types.len(), 1);
        assert_eq!(route.return_types[0].status_code, 204);
    }

    #[test]
    fn test_recognizers_run_first_and_short_circuit() {
        let (_dir, mut resolver) = fixture();
        let recognizers: Vec<Box<dyn Recognizer>> = vec![
            Box::new(from_fn(|context: &str, builder: &mut CallBuilder<'_>| {
                if !builder.is_method_on(context) || builder.name() != "user_agent" {
                    return Ok(Handling::NotHandled);
                }
                let mut route = builder.route().clone();
                route.add_request_header(Param::new("User-Agent", Field::primitive(PrimitiveType::String), false));
                Ok(Handling::Handled(route))
            })),
            Box::new(from_fn(|_: &str, builder: &mut CallBuilder<'_>| {
                // would replace every response if it were reached for json calls
                if builder.name() == "user_agent" {
                    panic!("first recognizer should have handled this call");
                }
                Ok(Handling::NotHandled)
            })),
        ];

        let route = walk(&mut resolver, "update_user", &recognizers).unwrap();
        assert_eq!(route.request_headers.len(), 1);
        assert_eq!(route.request_headers[0].name, "User-Agent");
        assert_eq!(route.return_types.len(), 2);
    }

    #[test]
    fn test_unmatched_context_methods_leave_the_route_unchanged() {
        let (_dir, mut resolver) = fixture();
        let with_agent = walk_into(&mut resolver, "lookup", stub("lookup"), &[]);
        let without = walk_into(&mut resolver, "lookup_plain", stub("lookup"), &[]).unwrap();

        let with_agent = with_agent.expect("an unmatched context call is not an error");
        assert_eq!(with_agent, without);
        assert_eq!(with_agent.return_types.len(), 1);
    }
}
