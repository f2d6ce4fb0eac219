//! Process-wide registries for flow-config types and custom chunkers.
//!
//! The original implementation discovers flow-config subclasses by scanning
//! directories for `flow.py` files and checking class inheritance at import
//! time. A statically typed target has no equivalent reflection hook, so
//! this crate replaces directory-scan discovery with explicit registration:
//! callers invoke [`register_flow_config`] (or a plugin crate's own `init()`)
//! before [`crate::config::Setting::from_yaml`] is called.

use crate::config::flow::{BaseFlowConfig, SummaryFlowConfig};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// A constructor for a named flow-config type: parses the `config` section
/// of a `{type, config}` YAML block into a boxed [`BaseFlowConfig`].
pub type FlowConfigFactory =
    fn(serde_yaml_ng::Value) -> crate::Result<Box<dyn BaseFlowConfig>>;

/// A registered custom chunking function, resolved by name for
/// `chunk_strategy: ByCustom`.
pub type ChunkerFn = fn(&str) -> Vec<String>;

fn flow_registry() -> &'static Mutex<HashMap<String, FlowConfigFactory>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, FlowConfigFactory>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<String, FlowConfigFactory> = HashMap::new();
        map.insert("base".to_string(), build_base_flow_config as FlowConfigFactory);
        map.insert("summary".to_string(), build_summary_flow_config as FlowConfigFactory);
        Mutex::new(map)
    })
}

fn chunker_registry() -> &'static Mutex<HashMap<String, ChunkerFn>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, ChunkerFn>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn build_base_flow_config(value: serde_yaml_ng::Value) -> crate::Result<Box<dyn BaseFlowConfig>> {
    let config: crate::config::flow::FlowConfig =
        serde_yaml_ng::from_value(value).map_err(|e| {
            crate::Error::Configuration(format!("invalid base flow config: {e}"))
        })?;
    Ok(Box::new(config.new()?))
}

fn build_summary_flow_config(
    value: serde_yaml_ng::Value,
) -> crate::Result<Box<dyn BaseFlowConfig>> {
    let parsed: SummaryFlowConfig = serde_yaml_ng::from_value(value).map_err(|e| {
        crate::Error::Configuration(format!("invalid summary flow config: {e}"))
    })?;
    // Load `prompt_templates_path` (if set) before `with_defaults` runs, so a
    // path-loaded non-empty map suppresses the built-in defaults the same
    // way an inline `prompt_templates` map would.
    let base = parsed.base.new()?;
    // Populate the default llm_blocks/prompt_templates (cheap_summarizer +
    // powerful_combiner, summarize_chunk_template + combine_summaries_template)
    // only when the user supplied neither map — see SummaryFlowConfig::with_defaults.
    let mut config = SummaryFlowConfig::with_defaults(base);
    config.use_chunking = parsed.use_chunking;
    config.chunk_size = parsed.chunk_size;
    config.chunk_strategy = parsed.chunk_strategy;
    config.chunk_custom_strategy = parsed.chunk_custom_strategy;
    config.validate_construction()?;
    Ok(Box::new(config))
}

/// Registers a flow-config type under `name`. A later registration under
/// the same name silently overwrites the earlier one (logged at debug
/// level), matching the original registry's permissive re-registration
/// behavior.
pub fn register_flow_config(name: impl Into<String>, factory: FlowConfigFactory) {
    let name = name.into();
    let mut registry = flow_registry()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if registry.contains_key(&name) {
        tracing::debug!(flow_type = %name, "overwriting existing flow-config registration");
    }
    registry.insert(name, factory);
}

/// Looks up a registered flow-config factory by name.
#[must_use]
pub fn lookup_flow_config(name: &str) -> Option<FlowConfigFactory> {
    flow_registry()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(name)
        .copied()
}

/// Registers a custom chunking function under `name`, for use as a
/// `chunk_strategy: ByCustom` target. Closures cannot be serialized into
/// YAML, so `SummaryFlowConfig::chunk_custom_strategy` stores only this name.
pub fn register_chunker(name: impl Into<String>, chunker: ChunkerFn) {
    let name = name.into();
    let mut registry = chunker_registry()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if registry.contains_key(&name) {
        tracing::debug!(chunker = %name, "overwriting existing chunker registration");
    }
    registry.insert(name, chunker);
}

/// Looks up a registered chunker by name.
#[must_use]
pub fn lookup_chunker(name: &str) -> Option<ChunkerFn> {
    chunker_registry()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(name)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_chunker(text: &str) -> Vec<String> {
        text.split("---").map(str::to_string).collect()
    }

    #[test]
    fn test_register_and_lookup_chunker() {
        register_chunker("test_chunker_registry_roundtrip", test_chunker);
        let found = lookup_chunker("test_chunker_registry_roundtrip").expect("registered");
        assert_eq!(found("a---b---c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_lookup_unknown_chunker_is_none() {
        assert!(lookup_chunker("definitely_not_registered").is_none());
    }

    #[test]
    fn test_builtin_flow_types_preregistered() {
        assert!(lookup_flow_config("base").is_some());
        assert!(lookup_flow_config("summary").is_some());
        assert!(lookup_flow_config("totally_unknown_flow_type").is_none());
    }

    #[test]
    fn test_summary_flow_built_from_registry_gets_default_blocks_and_templates() {
        let factory = lookup_flow_config("summary").expect("registered");
        let value = serde_yaml_ng::from_str("use_chunking: false\n").unwrap();
        let config = factory(value).unwrap();
        let summary = config
            .as_any()
            .downcast_ref::<SummaryFlowConfig>()
            .expect("summary flow config");
        assert!(!summary.use_chunking);
        assert!(summary.llm_blocks().contains_key("cheap_summarizer"));
        assert!(summary.llm_blocks().contains_key("powerful_combiner"));
        assert!(summary
            .prompt_templates()
            .contains_key("summarize_chunk_template"));
    }

    #[test]
    fn test_summary_flow_built_from_registry_leaves_user_blocks_untouched() {
        let factory = lookup_flow_config("summary").expect("registered");
        let value = serde_yaml_ng::from_str(
            "llm_blocks:\n  only_one:\n    model: gpt-4o\n",
        )
        .unwrap();
        let config = factory(value).unwrap();
        let summary = config
            .as_any()
            .downcast_ref::<SummaryFlowConfig>()
            .expect("summary flow config");
        assert_eq!(summary.llm_blocks().len(), 1);
        assert!(summary.llm_blocks().contains_key("only_one"));
    }

    #[test]
    fn test_summary_flow_from_registry_loads_prompt_templates_path_and_suppresses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let templates_path = dir.path().join("templates.yaml");
        std::fs::write(
            &templates_path,
            "templates:\n  summarize_chunk_template: \"Custom: {{ chunk_text }}\"\n",
        )
        .unwrap();

        let factory = lookup_flow_config("summary").expect("registered");
        let yaml = format!(
            "prompt_templates_path: {}\n",
            serde_yaml_ng::to_string(&templates_path.to_string_lossy().to_string())
                .unwrap()
                .trim()
        );
        let value = serde_yaml_ng::from_str(&yaml).unwrap();
        let config = factory(value).unwrap();
        let summary = config
            .as_any()
            .downcast_ref::<SummaryFlowConfig>()
            .expect("summary flow config");

        assert_eq!(
            summary.prompt_templates().get("summarize_chunk_template").map(String::as_str),
            Some("Custom: {{ chunk_text }}")
        );
        // The file supplied a non-empty map, so the built-in
        // combine_summaries_template default must not have been injected.
        assert!(!summary.prompt_templates().contains_key("combine_summaries_template"));
    }

    #[test]
    fn test_base_flow_from_registry_loads_prompt_templates_path() {
        let dir = tempfile::tempdir().unwrap();
        let templates_path = dir.path().join("templates.yaml");
        std::fs::write(
            &templates_path,
            "templates:\n  greeting: \"Hello, {{ name }}!\"\n",
        )
        .unwrap();

        let factory = lookup_flow_config("base").expect("registered");
        let yaml = format!(
            "prompt_templates_path: {}\n",
            serde_yaml_ng::to_string(&templates_path.to_string_lossy().to_string())
                .unwrap()
                .trim()
        );
        let value = serde_yaml_ng::from_str(&yaml).unwrap();
        let config = factory(value).unwrap();

        assert_eq!(
            config.prompt_templates().get("greeting").map(String::as_str),
            Some("Hello, {{ name }}!")
        );
    }
}
