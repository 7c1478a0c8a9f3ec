//! Serialization of the service model to YAML or JSON, and loading it back for a resumed run.

use crate::model::ServiceModel;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes a service model to YAML.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(model: &ServiceModel) -> Result<String> {
    debug!("Serializing service model to YAML");
    serde_yaml::to_string(model).context("Failed to serialize service model to YAML")
}

/// Serializes a service model to pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(model: &ServiceModel) -> Result<String> {
    debug!("Serializing service model to JSON");
    serde_json::to_string_pretty(model).context("Failed to serialize service model to JSON")
}

/// Writes string content to a file, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Reads a model written by [`serialize_json`] or [`serialize_yaml`]; `.json` files are read as
/// JSON, anything else as YAML.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold a service model.
pub fn load_model(path: &Path) -> Result<ServiceModel> {
    debug!("Loading service model from {}", path.display());
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read model file: {}", path.display()))?;

    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let model = if is_json {
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON model: {}", path.display()))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("Invalid YAML model: {}", path.display()))?
    };
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::model::{Field, HandlerLocation, HttpMethod, Param, Processable, ReturnType, Route};
    use crate::resolver::PrimitiveType;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_model() -> ServiceModel {
        let config = AnalyzerConfig::new(PathBuf::from("/srv/app"), "app", PathBuf::from("/srv/app/src/lib.rs"));
        let mut model = ServiceModel::new(config);

        let mut route = Route::new(
            HttpMethod::Get,
            "/users/:id",
            HandlerLocation {
                file: PathBuf::from("src/api.rs"),
                package: "crate::api".to_string(),
                function: "get_user".to_string(),
            },
        );
        route.add_path_param(Param::new("id", Field::primitive(PrimitiveType::String), true));
        route.add_return_type(ReturnType {
            status_code: 200,
            content_type: "application/json".to_string(),
            field: Field::reference("User", "crate::models"),
        });
        model.routes.push(route);

        model.components.add(Field::structure("User", "crate::models", vec![]));
        model.pending.push(Processable::new("crate::models", "Role"));
        model
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&create_test_model()).unwrap();

        assert!(yaml.contains("routes:"));
        assert!(yaml.contains("/users/:id"));
        assert!(yaml.contains("method: GET"));
        assert!(yaml.contains("components:"));
        assert!(yaml.contains("pending:"));
    }

    #[test]
    fn test_serialize_json() {
        let json = serialize_json(&create_test_model()).unwrap();
        assert!(json.contains('\n'));

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["routes"][0]["path"], "/users/:id");
        assert_eq!(parsed["routes"][0]["return_types"][0]["status_code"], 200);
        assert_eq!(parsed["components"][0]["name"], "User");
        assert_eq!(parsed["config"]["crate_name"], "app");
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("out").join("nested").join("model.yaml");

        write_to_file("first", &file_path).unwrap();
        write_to_file("second", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "second");
    }

    #[test]
    fn test_load_model_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let model = create_test_model();

        let json_path = temp_dir.path().join("model.json");
        write_to_file(&serialize_json(&model).unwrap(), &json_path).unwrap();
        assert_eq!(load_model(&json_path).unwrap(), model);

        let yaml_path = temp_dir.path().join("model.yaml");
        write_to_file(&serialize_yaml(&model).unwrap(), &yaml_path).unwrap();
        assert_eq!(load_model(&yaml_path).unwrap(), model);
    }

    #[test]
    fn test_load_model_rejects_other_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.json");
        write_to_file("{\"openapi\": \"3.0.0\"}", &path).unwrap();
        assert!(load_model(&path).is_err());
    }
}
