//! YAML loader that resolves `!env_var` and `!secret` tags

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub struct YamlLoader {
    config_dir: PathBuf,
    secrets: Secrets,
}

impl YamlLoader {
    /// Loader for `config_dir`, reading its `secrets.yaml` if present
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self {
            config_dir,
            secrets,
        })
    }

    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
        }
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!(path = %path.display(), "Loading YAML file");

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        self.load_string(&content, &path)
    }

    pub fn load_string(&self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;
        self.process_value(value)
    }

    fn process_value(&self, value: Value) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    result.insert(self.process_value(k)?, self.process_value(v)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            _ => Ok(value),
        }
    }

    fn process_tagged(&self, tagged: TaggedValue) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!(tag = %tag, "Processing tag");

        match tag.as_str() {
            "!secret" => self.process_secret(tagged.value),
            "!env_var" => self.process_env_var(tagged.value),
            _ => Ok(Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag,
                value: self.process_value(tagged.value)?,
            }))),
        }
    }

    fn process_secret(&self, value: Value) -> ConfigResult<Value> {
        let Value::String(key) = value else {
            return Err(ConfigError::InvalidValue {
                key: "!secret".to_string(),
                reason: "secret key must be a string".to_string(),
            });
        };

        let secret = self.secrets.get(&key)?;
        debug!(key = %key, "Substituted secret");
        Ok(Value::String(secret.to_string()))
    }

    /// `!env_var NAME` or `!env_var NAME default`
    fn process_env_var(&self, value: Value) -> ConfigResult<Value> {
        let Value::String(tag_value) = value else {
            return Err(ConfigError::InvalidValue {
                key: "!env_var".to_string(),
                reason: "environment variable name must be a string".to_string(),
            });
        };

        let (name, default) = match tag_value.trim().split_once(char::is_whitespace) {
            Some((name, default)) => (name, Some(default.trim())),
            None => (tag_value.trim(), None),
        };

        match (std::env::var(name), default) {
            (Ok(value), _) => {
                debug!(var = %name, "Substituted env var");
                Ok(env_scalar(&value))
            }
            (Err(_), Some(default)) => {
                debug!(var = %name, "Env var unset, using default");
                Ok(env_scalar(default))
            }
            (Err(_), None) => Err(ConfigError::EnvVarNotFound {
                var: name.to_string(),
            }),
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// Numbers and booleans keep their YAML type, anything else stays text
///
/// A number only survives if it prints back unchanged, so codes such as
/// `0401` stay strings.
fn env_scalar(text: &str) -> Value {
    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Number(n)) if n.to_string() == text => Value::Number(n),
        Ok(value @ Value::Bool(_)) => value,
        _ => Value::String(text.to_string()),
    }
}
