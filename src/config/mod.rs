//! Typed configuration for QuantMind: YAML loading, environment-variable
//! substitution, and explicit flow-type dispatch.

pub mod flow;
pub mod llm;
pub mod registry;
pub mod storage;
pub mod tagger;

pub use flow::{BaseFlowConfig, ChunkingStrategy, FlowConfig, SummaryFlowConfig};
pub use llm::{EmbeddingConfig, LlmConfig, ProviderType};
pub use registry::{register_chunker, register_flow_config};
pub use storage::LocalStorageConfig;
pub use tagger::LlmTaggerConfig;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Substitutes `${VAR}` and `${VAR:default}` occurrences in a string using
/// the process environment.
///
/// An unset `VAR` with no default substitutes to the empty string; an unset
/// `VAR` with a default substitutes to the default; a set `VAR` always wins
/// regardless of any default given. Mirrors the original's
/// `\$\{([^}:]+)(?::([^}]*))?\}` regex semantics exactly.
#[must_use]
pub fn expand_env_vars(input: &str) -> String {
    if !input.contains("${") {
        return input.to_string();
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(close) = after_open.find('}') else {
            // No closing brace: leave the remainder untouched.
            result.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let inner = &after_open[..close];
        let (var_name, default_val) = match inner.find(':') {
            Some(colon) => (&inner[..colon], Some(&inner[colon + 1..])),
            None => (inner, None),
        };
        let resolved = std::env::var(var_name)
            .ok()
            .or_else(|| default_val.map(str::to_string))
            .unwrap_or_default();
        result.push_str(&resolved);
        rest = &after_open[close + 1..];
    }
    result.push_str(rest);
    result
}

/// Recursively substitutes environment variables in every string value of a
/// parsed YAML tree (maps, sequences, and scalars), before typed
/// deserialization. This is a generic preprocessing pass over the raw value
/// tree, not a per-field application — unlike the original's selective
/// per-named-field substitution, every string anywhere in the document is
/// eligible.
#[must_use]
pub fn substitute_env_vars(value: serde_yaml_ng::Value) -> serde_yaml_ng::Value {
    use serde_yaml_ng::Value;
    match value {
        Value::String(s) => Value::String(expand_env_vars(&s)),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(substitute_env_vars).collect()),
        Value::Mapping(map) => {
            let mut new_map = serde_yaml_ng::Mapping::new();
            for (k, v) in map {
                new_map.insert(substitute_env_vars(k), substitute_env_vars(v));
            }
            Value::Mapping(new_map)
        }
        other => other,
    }
}

/// Auto-discovers and loads a `.env` file, matching the original's
/// discovery order: an explicit path if given, else `./.env` then `../.env`
/// relative to the current working directory.
///
/// Returns `true` if a file was found and loaded.
pub fn load_dotenv(dotenv_path: Option<&Path>) -> bool {
    if let Some(path) = dotenv_path {
        if path.exists() {
            let _ = dotenvy::from_path(path);
            tracing::info!(path = %path.display(), "loaded environment from dotenv file");
            return true;
        }
        tracing::warn!(path = %path.display(), "dotenv file not found");
        return false;
    }

    let Ok(cwd) = std::env::current_dir() else {
        return false;
    };
    let candidates = [cwd.join(".env"), cwd.join("..").join(".env")];
    for candidate in candidates {
        if candidate.exists() {
            let _ = dotenvy::from_path(&candidate);
            tracing::info!(path = %candidate.display(), "loaded environment from dotenv file");
            return true;
        }
    }
    tracing::debug!("no dotenv file found");
    false
}

/// Unified root configuration for QuantMind.
#[derive(Debug)]
pub struct Setting {
    /// Storage configuration (always present; defaults to a local store).
    pub storage: LocalStorageConfig,
    /// Root LLM configuration.
    pub llm: LlmConfig,
    /// Optional tagger configuration.
    pub tagger: Option<LlmTaggerConfig>,
    /// Named flow configurations, dispatched through the flow registry.
    pub flows: HashMap<String, Box<dyn BaseFlowConfig>>,
    /// Log level, one of `DEBUG|INFO|WARNING|ERROR|CRITICAL`.
    pub log_level: String,
    /// Paths of every config file folded into this `Setting`.
    pub config_sources: Vec<PathBuf>,
}

impl Default for Setting {
    fn default() -> Self {
        Self {
            storage: LocalStorageConfig::default(),
            llm: LlmConfig::default(),
            tagger: None,
            flows: HashMap::new(),
            log_level: "INFO".to_string(),
            config_sources: Vec::new(),
        }
    }
}

impl Setting {
    /// Loads configuration from a YAML file, performing `.env` loading and
    /// environment-variable substitution first.
    ///
    /// Per the flow-registry redesign (see `SPEC_FULL.md` §9), this does
    /// **not** scan directories for user-defined flow types: any
    /// `<user-registered>` flow type named in the `flows:` section must
    /// already be registered via [`register_flow_config`] before this call.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if the file is missing, is
    /// not valid YAML, is not a mapping at the top level, or names an
    /// unregistered component/flow type.
    pub fn from_yaml(config_path: impl AsRef<Path>, env_file: Option<&Path>) -> crate::Result<Self> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Err(crate::Error::Configuration(format!(
                "configuration file not found: {}",
                config_path.display()
            )));
        }

        load_dotenv(env_file);

        let text = std::fs::read_to_string(config_path).map_err(|e| {
            crate::Error::Configuration(format!(
                "failed to read {}: {e}",
                config_path.display()
            ))
        })?;
        let raw: serde_yaml_ng::Value = serde_yaml_ng::from_str(&text).map_err(|e| {
            crate::Error::Configuration(format!(
                "failed to parse {} as YAML: {e}",
                config_path.display()
            ))
        })?;
        if !matches!(raw, serde_yaml_ng::Value::Mapping(_)) {
            return Err(crate::Error::Configuration(
                "configuration file must contain a mapping at the top level".to_string(),
            ));
        }
        let substituted = substitute_env_vars(raw);

        let mut setting = Self::parse_config(substituted)?;
        setting.config_sources.push(config_path.to_path_buf());
        Ok(setting)
    }

    /// Loads configuration from the default location
    /// (`~/.config/quantmind/config.yaml`), or returns [`Setting::default`]
    /// if no home directory can be resolved or no file exists there.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };
        let config_path = base_dirs.home_dir().join(".config").join("quantmind").join("config.yaml");
        Self::from_yaml(&config_path, None).unwrap_or_else(|_| Self::default())
    }

    /// Serializes the storage, LLM, tagger, and log-level sections back to a
    /// YAML document at `path`.
    ///
    /// Per `SPEC_FULL.md` §6, sensitive fields (`llm.api_key`,
    /// `tagger.api_key`) are stripped rather than written out — see
    /// [`LlmConfig::api_key`]'s `skip_serializing` — and `Path` values
    /// (`storage.storage_dir`) serialize as plain strings, which
    /// `serde_yaml_ng` already does for `PathBuf`. Flow configs are not
    /// round-tripped: [`BaseFlowConfig`] is a trait object with no generic
    /// serialization hook, so exporting a flow section would require each
    /// registered flow-config type to opt in explicitly, which is out of
    /// this crate's scope.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OperationFailed`] if serialization or the
    /// file write fails.
    pub fn save_to_yaml(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        #[derive(serde::Serialize)]
        struct Exported<'a> {
            storage: &'a LocalStorageConfig,
            llm: &'a LlmConfig,
            #[serde(skip_serializing_if = "Option::is_none")]
            tagger: &'a Option<LlmTaggerConfig>,
            log_level: &'a str,
        }
        let exported = Exported {
            storage: &self.storage,
            llm: &self.llm,
            tagger: &self.tagger,
            log_level: &self.log_level,
        };
        let yaml = serde_yaml_ng::to_string(&exported).map_err(|e| crate::Error::OperationFailed {
            operation: "serialize_setting".to_string(),
            cause: e.to_string(),
        })?;
        std::fs::write(path.as_ref(), yaml).map_err(|e| crate::Error::OperationFailed {
            operation: "write_setting_yaml".to_string(),
            cause: e.to_string(),
        })
    }

    fn parse_config(value: serde_yaml_ng::Value) -> crate::Result<Self> {
        let serde_yaml_ng::Value::Mapping(map) = value else {
            return Err(crate::Error::Configuration(
                "configuration must be a mapping".to_string(),
            ));
        };

        let mut setting = Self::default();

        if let Some(storage_section) = map.get("storage") {
            setting.storage = parse_typed_section(storage_section, "local", |v| {
                serde_yaml_ng::from_value(v).map_err(|e| {
                    crate::Error::Configuration(format!("invalid storage config: {e}"))
                })
            })?
            .unwrap_or_default();
        }

        if let Some(tagger_section) = map.get("tagger") {
            setting.tagger = parse_typed_section(tagger_section, "llm", |v| {
                serde_yaml_ng::from_value(v).map_err(|e| {
                    crate::Error::Configuration(format!("invalid tagger config: {e}"))
                })
            })?;
        }

        if let Some(llm_section) = map.get("llm") {
            setting.llm = serde_yaml_ng::from_value(llm_section.clone()).map_err(|e| {
                crate::Error::Configuration(format!("invalid llm config: {e}"))
            })?;
        }

        if let Some(serde_yaml_ng::Value::String(level)) = map.get("log_level") {
            setting.log_level = level.clone();
        }

        if let Some(serde_yaml_ng::Value::Mapping(flows_map)) = map.get("flows") {
            for (name_value, flow_value) in flows_map {
                let serde_yaml_ng::Value::String(flow_name) = name_value else {
                    continue;
                };
                let serde_yaml_ng::Value::Mapping(flow_entry) = flow_value else {
                    continue;
                };
                let flow_type = flow_entry
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("base")
                    .to_string();
                let flow_config_value = flow_entry
                    .get("config")
                    .cloned()
                    .unwrap_or(serde_yaml_ng::Value::Mapping(serde_yaml_ng::Mapping::new()));

                let factory = registry::lookup_flow_config(&flow_type).ok_or_else(|| {
                    crate::Error::Configuration(format!(
                        "unknown flow type '{flow_type}' for flow '{flow_name}'"
                    ))
                })?;
                let parsed = factory(flow_config_value)?;
                setting.flows.insert(flow_name.clone(), parsed);
            }
        }

        Ok(setting)
    }
}

/// Parses a `{type, config}` section when `type` matches `expected_type`,
/// mirroring the original's `CONFIG_REGISTRY` dispatch for single-variant
/// component sections (storage only has `local`; tagger only has `llm`).
fn parse_typed_section<T>(
    section: &serde_yaml_ng::Value,
    expected_type: &str,
    parse: impl FnOnce(serde_yaml_ng::Value) -> crate::Result<T>,
) -> crate::Result<Option<T>> {
    let serde_yaml_ng::Value::Mapping(map) = section else {
        return Ok(None);
    };
    let actual_type = map.get("type").and_then(|v| v.as_str()).unwrap_or(expected_type);
    if actual_type != expected_type {
        return Err(crate::Error::Configuration(format!(
            "unknown type '{actual_type}', expected '{expected_type}'"
        )));
    }
    let config_value = map
        .get("config")
        .cloned()
        .unwrap_or(serde_yaml_ng::Value::Mapping(serde_yaml_ng::Mapping::new()));
    Ok(Some(parse(config_value)?))
}
