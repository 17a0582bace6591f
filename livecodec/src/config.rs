//! Worker configuration
//!
//! A flat string key/value store, the way cluster workers see their
//! configuration. Sources, lowest precedence first:
//!
//! 1. built-in defaults (none today; unset keys fall back at the call site)
//! 2. a TOML file, with nested tables flattened to dotted keys
//! 3. `LIVECODEC_*` environment variables
//! 4. explicit `key=value` overrides

use crate::error::{LiveError, LiveResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const ENV_PREFIX: &str = "LIVECODEC_";

/// Names the configuration file itself; never a configuration key.
pub const CONFIG_FILE_ENV: &str = "LIVECODEC_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerConf {
    entries: BTreeMap<String, String>,
}

impl WorkerConf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse TOML. Scalars become strings; nested tables become dotted keys.
    pub fn from_toml_str(source: &str) -> LiveResult<Self> {
        let table: toml::Table = source.parse()?;
        let mut conf = WorkerConf::new();
        flatten_into(&mut conf, "", &table)?;
        Ok(conf)
    }

    pub fn from_file(path: &Path) -> LiveResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            LiveError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "loading worker configuration");
        Self::from_toml_str(&source)
    }

    /// Merge `LIVECODEC_*` variables: `LIVECODEC_CODEC_CUSTOMIZER` sets
    /// `livecodec.codec.customizer`. [`CONFIG_FILE_ENV`] is skipped.
    pub fn merge_env<I>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if name == CONFIG_FILE_ENV {
                continue;
            }
            if let Some(rest) = name.strip_prefix(ENV_PREFIX) {
                if rest.is_empty() {
                    continue;
                }
                let key = format!("livecodec.{}", rest.to_lowercase().replace('_', "."));
                debug!(env = %name, key = %key, "configuration from environment");
                self.set(key, value);
            }
        }
        self
    }

    /// Apply a `key=value` override.
    pub fn apply_override(&mut self, assignment: &str) -> LiveResult<&mut Self> {
        match assignment.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok(self.set(key.trim(), value.trim()))
            }
            _ => Err(LiveError::Config(format!(
                "expected key=value, got '{}'",
                assignment
            ))),
        }
    }

    pub fn to_toml_string(&self) -> LiveResult<String> {
        toml::to_string(self).map_err(|e| LiveError::Config(e.to_string()))
    }
}

fn flatten_into(conf: &mut WorkerConf, prefix: &str, table: &toml::Table) -> LiveResult<()> {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let text = match value {
            toml::Value::Table(nested) => {
                flatten_into(conf, &full_key, nested)?;
                continue;
            }
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            toml::Value::Array(_) => {
                return Err(LiveError::Config(format!(
                    "'{}': arrays are not supported in worker configuration",
                    full_key
                )))
            }
        };
        conf.set(full_key, text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_nested_tables_flatten_to_dotted_keys() {
        let conf = WorkerConf::from_toml_str(
            r#"
            [livecodec.codec]
            customizer = "my.session/install"

            [worker]
            threads = 4
            "#,
        )
        .unwrap();
        assert_eq!(
            conf.get("livecodec.codec.customizer"),
            Some("my.session/install")
        );
        assert_eq!(conf.get("worker.threads"), Some("4"));
        assert_eq!(conf.get_or("missing", "fallback"), "fallback");
    }

    #[test]
    fn test_arrays_are_rejected() {
        let err = WorkerConf::from_toml_str("hosts = [\"a\", \"b\"]").unwrap_err();
        assert!(matches!(err, LiveError::Config(_)));
        assert!(WorkerConf::from_toml_str("not toml =").is_err());
    }

    #[test]
    fn test_precedence_env_then_overrides() {
        let mut conf =
            WorkerConf::from_toml_str("[livecodec.codec]\ncustomizer = \"file/one\"").unwrap();
        conf.merge_env(vec![
            ("LIVECODEC_CODEC_CUSTOMIZER".to_string(), "env/two".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
            ("LIVECODEC_".to_string(), "ignored".to_string()),
            (CONFIG_FILE_ENV.to_string(), "/etc/livecodec.toml".to_string()),
        ]);
        assert_eq!(conf.get("livecodec.config"), None);
        assert_eq!(conf.get("livecodec.codec.customizer"), Some("env/two"));
        assert_eq!(conf.len(), 1);

        conf.apply_override("livecodec.codec.customizer = cli/three")
            .unwrap();
        assert_eq!(conf.get("livecodec.codec.customizer"), Some("cli/three"));
        assert!(conf.apply_override("no-equals-sign").is_err());
        assert!(conf.apply_override("=value").is_err());
    }

    #[test]
    fn test_from_file_and_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[livecodec.codec]\ncustomizer = \"a.b/c\"").unwrap();
        let conf = WorkerConf::from_file(file.path()).unwrap();
        assert_eq!(conf.get("livecodec.codec.customizer"), Some("a.b/c"));

        let dumped = conf.to_toml_string().unwrap();
        assert_eq!(WorkerConf::from_toml_str(&dumped).unwrap(), conf);

        let missing = WorkerConf::from_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(missing, Err(LiveError::Config(_))));
    }
}
