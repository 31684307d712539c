//! Layered configuration loader.
//!
//! Supports loading configuration from two files in the config directory:
//! - `config.json` - Service configuration
//! - `secrets.json` - Credentials (WhatsApp token, SMTP password, portal URLs)
//!
//! `secrets.json` is deep-merged over `config.json`, so it may carry any
//! subset of the config tree.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::config_dir;
use crate::error::{Error, Result};

/// Configuration file names, lowest priority first.
pub const CONFIG_FILES: &[&str] = &["config.json", "secrets.json"];

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
    let value: Value = serde_json::from_str(&content).map_err(|e| Error::parse(path, e))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => {
                        merge_json(target_value, source_value);
                    }
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Load layered configuration from the config directory.
///
/// Priority (lowest to highest):
/// 1. `config.json`
/// 2. `secrets.json`
/// 3. Environment variables (applied separately by [`crate::Config::apply_env_overrides`])
pub fn load_layered_config(dir: Option<PathBuf>) -> Result<Value> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    tracing::debug!("Loading layered config from {}", cfg_dir.display());

    let mut config = Value::Object(Default::default());
    for file in CONFIG_FILES {
        if let Some(layer) = load_json_file(&cfg_dir.join(file))? {
            merge_json(&mut config, layer);
            tracing::debug!("Loaded {}", file);
        }
    }

    Ok(config)
}

/// Check which config files exist.
pub fn check_config_files(dir: Option<PathBuf>) -> Vec<(String, bool)> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    CONFIG_FILES
        .iter()
        .map(|file| {
            let path = cfg_dir.join(file);
            (file.to_string(), path.exists())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_json_objects() {
        let mut target = json!({
            "a": 1,
            "b": {
                "x": 10,
                "y": 20
            }
        });

        let source = json!({
            "b": {
                "y": 25,
                "z": 30
            },
            "c": 3
        });

        merge_json(&mut target, source);

        assert_eq!(target["a"], 1);
        assert_eq!(target["b"]["x"], 10);
        assert_eq!(target["b"]["y"], 25);
        assert_eq!(target["b"]["z"], 30);
        assert_eq!(target["c"], 3);
    }

    #[test]
    fn test_merge_json_overwrite_non_object() {
        let mut target = json!({ "a": [1, 2, 3] });
        let source = json!({ "a": [4, 5] });

        merge_json(&mut target, source);

        assert_eq!(target["a"], json!([4, 5]));
    }

    #[test]
    fn test_secrets_layer_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"whatsapp": {"phone_number_id": "111", "access_token": "from-config"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("secrets.json"),
            r#"{"whatsapp": {"access_token": "from-secrets"}}"#,
        )
        .unwrap();

        let value = load_layered_config(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(value["whatsapp"]["phone_number_id"], "111");
        assert_eq!(value["whatsapp"]["access_token"], "from-secrets");
    }

    #[test]
    fn test_missing_files_yield_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let value = load_layered_config(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(value, json!({}));

        let files = check_config_files(Some(dir.path().to_path_buf()));
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|(_, exists)| !exists));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "not json").unwrap();
        let err = load_layered_config(Some(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(err.path(), dir.path().join("config.json"));
    }
}
