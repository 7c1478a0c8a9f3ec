use pretty_assertions::assert_eq;
use routewalk::{
    analyzer::Analyzer,
    config::AnalyzerConfig,
    model::{Field, FieldKind, HttpMethod, Param, Route, ServiceModel},
    resolver::{ConstValue, PrimitiveType},
    serializer::{load_model, serialize_json, serialize_yaml, write_to_file},
    walker::{from_fn, CallBuilder, Handling},
};
use tempfile::TempDir;

const SERVICE: &[(&str, &str)] = &[
    ("Cargo.toml", include_str!("fixtures/service/Cargo.toml")),
    ("src/lib.rs", include_str!("fixtures/service/src/lib.rs")),
    ("src/routes.rs", include_str!("fixtures/service/src/routes.rs")),
    ("src/auth.rs", include_str!("fixtures/service/src/auth.rs")),
    ("src/models.rs", include_str!("fixtures/service/src/models.rs")),
    ("src/api/mod.rs", include_str!("fixtures/service/src/api/mod.rs")),
    ("src/api/health.rs", include_str!("fixtures/service/src/api/health.rs")),
    ("src/api/users.rs", include_str!("fixtures/service/src/api/users.rs")),
];

/// Helper function to create a temporary test project
fn create_test_project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

fn config_for(dir: &TempDir) -> AnalyzerConfig {
    AnalyzerConfig::from_project_dir(dir.path()).expect("Failed to read fixture manifest")
}

fn route<'m>(model: &'m ServiceModel, method: HttpMethod, path: &str) -> &'m Route {
    model
        .routes
        .iter()
        .find(|r| r.method == method && r.path == path)
        .unwrap_or_else(|| panic!("no route {} {}", method, path))
}

fn statuses(route: &Route) -> Vec<u16> {
    route.return_types.iter().map(|r| r.status_code).collect()
}

fn names(params: &[Param]) -> Vec<&str> {
    params.iter().map(|p| p.name.as_str()).collect()
}

fn sorted_components(model: &ServiceModel) -> Vec<Field> {
    let mut components: Vec<Field> = model.components.iter().cloned().collect();
    components.sort_by(|a, b| a.name.cmp(&b.name));
    components
}

#[test]
fn test_end_to_end_analysis() {
    let dir = create_test_project(SERVICE);
    let config = config_for(&dir);
    assert_eq!(config.crate_name, "user_service");

    let model = Analyzer::run(config).expect("Analysis failed");

    let registered: Vec<String> = model.routes.iter().map(|r| r.label()).collect();
    assert_eq!(
        registered,
        vec![
            "GET /health",
            "DELETE /admin/cache",
            "GET /api/v1/users/:id",
            "POST /api/v1/users",
            "GET /api/v1/users",
        ]
    );
    assert!(model.is_complete());
}

#[test]
fn test_handler_with_helper() {
    let dir = create_test_project(SERVICE);
    let model = Analyzer::run(config_for(&dir)).unwrap();

    let get_user = route(&model, HttpMethod::Get, "/api/v1/users/:id");
    assert_eq!(get_user.handler.package, "crate::api::users");
    assert_eq!(get_user.handler.function, "get_user");
    assert_eq!(get_user.operation_id, "get_user");
    assert_eq!(get_user.doc.as_deref(), Some("Fetches one user"));

    assert_eq!(names(&get_user.path_params), vec!["id"]);
    assert_eq!(names(&get_user.query_params), vec!["expand"]);
    assert_eq!(names(&get_user.request_headers), vec!["Authorization"]);

    // the helper's response comes first: it runs before the handler's own calls
    assert_eq!(statuses(get_user), vec![401, 200, 404]);
    assert_eq!(get_user.return_types[1].content_type, "application/json");
    assert_eq!(get_user.return_types[1].field.kind, FieldKind::Reference);
    assert_eq!(get_user.return_types[1].field.name, "User");
    assert_eq!(get_user.return_types[1].field.package, "crate::models");
}

#[test]
fn test_bound_body_and_bare_statuses() {
    let dir = create_test_project(SERVICE);
    let model = Analyzer::run(config_for(&dir)).unwrap();

    let create = route(&model, HttpMethod::Post, "/api/v1/users");
    assert_eq!(create.content_type.as_deref(), Some("application/json"));
    assert_eq!(create.body.len(), 1);
    assert_eq!(create.body[0].name, "NewUser");
    assert!(create.body[0].is_bound);
    assert_eq!(names(&create.response_headers), vec!["Location"]);
    assert_eq!(statuses(create), vec![401, 201, 400]);
    assert!(create.return_types[1].field.is_nil());

    let health = route(&model, HttpMethod::Get, "/health");
    assert_eq!(health.return_types[0].content_type, "text/plain");
    assert_eq!(health.return_types[0].field.primitive, Some(PrimitiveType::String));
    assert_eq!(health.return_types[0].field.constant, Some(ConstValue::Str("ok".into())));
    assert_eq!(health.doc.as_deref(), Some("Liveness probe"));

    let flush = route(&model, HttpMethod::Delete, "/admin/cache");
    assert_eq!(statuses(flush), vec![204]);
    assert_eq!(flush.doc, None);
}

#[test]
fn test_components() {
    let dir = create_test_project(SERVICE);
    let model = Analyzer::run(config_for(&dir)).unwrap();

    let names: Vec<&str> = model.components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["ApiError", "Role", "User", "NewUser"]);

    let user = model.components.get("User", "crate::models").unwrap();
    assert_eq!(user.kind, FieldKind::Struct);
    assert_eq!(user.doc.as_deref(), Some("A registered user"));
    let properties: Vec<(&str, bool)> = user
        .properties
        .iter()
        .map(|p| (p.name.as_str(), p.required))
        .collect();
    assert_eq!(
        properties,
        vec![("id", true), ("displayName", true), ("email", false), ("role", true)]
    );

    let role = model.components.get("Role", "crate::models").unwrap();
    assert_eq!(
        role.enum_values,
        vec![ConstValue::Str("admin".into()), ConstValue::Str("member".into())]
    );

    // generic instantiations are expanded where they are used
    let list = route(&model, HttpMethod::Get, "/api/v1/users");
    let page = &list.return_types[0].field;
    assert_eq!(page.name, "Page_User");
    assert_eq!(page.kind, FieldKind::Struct);
    let items = page.properties[0].field.items.as_ref().unwrap();
    assert_eq!(items.kind, FieldKind::Reference);
    assert_eq!(items.name, "User");
    assert!(model.components.get("Page_User", "crate::models").is_none());
}

#[test]
fn test_deferred_run_resumes_to_the_same_model() {
    let dir = create_test_project(SERVICE);
    let direct = Analyzer::run(config_for(&dir)).unwrap();

    let deferred = Analyzer::run(config_for(&dir).deferred(true)).unwrap();
    assert!(deferred.components.is_empty());
    assert!(!deferred.is_complete());
    assert_eq!(deferred.routes, direct.routes);

    let saved = dir.path().join("target/partial.json");
    write_to_file(&serialize_json(&deferred).unwrap(), &saved).unwrap();

    let mut analyzer = Analyzer::resume(load_model(&saved).unwrap()).unwrap();
    let expanded = analyzer.resolve_pending().unwrap();
    assert_eq!(expanded, 4);

    let resumed = analyzer.into_model();
    assert!(resumed.is_complete());
    assert_eq!(resumed.routes, direct.routes);
    assert_eq!(sorted_components(&resumed), sorted_components(&direct));
}

#[test]
fn test_denied_paths_are_not_analyzed() {
    let dir = create_test_project(SERVICE);
    let config = config_for(&dir).with_deny_prefix("/admin");
    let mut analyzer = Analyzer::new(config).unwrap();
    analyzer.deny_path(|path| path == "/health");

    assert_eq!(analyzer.discover().unwrap(), 3);
    assert!(analyzer
        .routes()
        .iter()
        .all(|r| r.path.starts_with("/api/v1")));
}

#[test]
fn test_recognizer_replaces_helper_walk() {
    let dir = create_test_project(SERVICE);
    let mut analyzer = Analyzer::new(config_for(&dir)).unwrap();
    analyzer.register_recognizer(from_fn(|_context: &str, builder: &mut CallBuilder<'_>| {
        if !builder.is_call_to("auth::require_token") {
            return Ok(Handling::NotHandled);
        }
        let mut route = builder.route().clone();
        route.add_request_header(Param::new(
            "X-Api-Key",
            Field::primitive(PrimitiveType::String),
            true,
        ));
        Ok(Handling::Handled(route))
    }));

    analyzer.discover().unwrap();
    analyzer.resolve_pending().unwrap();
    let model = analyzer.into_model();

    let get_user = route(&model, HttpMethod::Get, "/api/v1/users/:id");
    assert_eq!(names(&get_user.request_headers), vec!["X-Api-Key"]);
    assert_eq!(statuses(get_user), vec![200, 404]);
}

#[test]
fn test_model_serialization() {
    let dir = create_test_project(SERVICE);
    let model = Analyzer::run(config_for(&dir)).unwrap();

    let yaml = serialize_yaml(&model).unwrap();
    assert!(yaml.contains("/api/v1/users/:id"));
    assert!(yaml.contains("displayName"));

    let json = serialize_json(&model).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["routes"][0]["method"], "GET");
    assert_eq!(parsed["routes"][0]["path"], "/health");
}

#[test]
fn test_handler_without_response_fails_the_run() {
    let dir = create_test_project(&[
        ("Cargo.toml", "[package]\nname = \"broken\"\nversion = \"0.1.0\"\n"),
        (
            "src/lib.rs",
            r#"
            use web::{Context, Router};
            pub fn router(r: Router) { r.get("/silent", silent); }
            pub fn silent(ctx: &mut Context) { ctx.param("id"); }
            "#,
        ),
    ]);

    let err = Analyzer::run(config_for(&dir)).unwrap_err();
    assert!(matches!(err, routewalk::error::AnalysisError::NoResponse(_)));
}
