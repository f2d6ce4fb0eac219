//! Jinja-compatible prompt-template rendering, backed by `tera`.
//!
//! Each [`crate::flow::BaseFlow`] compiles its configured
//! `prompt_templates` map into a [`TemplateMap`] at construction time, then
//! renders by name immediately before each LLM call.

use std::collections::HashMap;
use tera::{Context, Tera};

/// A compiled, name-addressable set of prompt templates for one flow
/// instance.
///
/// Missing variables raise at render time by default, matching Tera's own
/// strict-by-default undefined-variable behavior (see `SPEC_FULL.md` §4.4
/// — this supersedes the original Python implementation's lenient
/// `"[var: not available]"` substitution).
#[derive(Debug)]
pub struct TemplateMap {
    tera: Tera,
    names: Vec<String>,
}

impl TemplateMap {
    /// Compiles every `(name, template_string)` pair in `templates`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if any template string fails
    /// to parse.
    pub fn new(templates: &HashMap<String, String>) -> crate::Result<Self> {
        let mut tera = Tera::default();
        let mut names = Vec::with_capacity(templates.len());
        for (name, body) in templates {
            tera.add_raw_template(name, body).map_err(|e| {
                crate::Error::Configuration(format!("invalid template '{name}': {e}"))
            })?;
            names.push(name.clone());
        }
        Ok(Self { tera, names })
    }

    /// Renders the template registered under `name` with the given
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TemplateNotFound`] if `name` was never
    /// registered, or [`crate::Error::OperationFailed`] if rendering fails
    /// (e.g. a referenced variable is missing).
    pub fn render(&self, name: &str, vars: &HashMap<String, String>) -> crate::Result<String> {
        if !self.names.iter().any(|n| n == name) {
            return Err(crate::Error::TemplateNotFound(name.to_string()));
        }
        let mut context = Context::new();
        for (key, value) in vars {
            context.insert(key, value);
        }
        self.tera.render(name, &context).map_err(|e| crate::Error::OperationFailed {
            operation: format!("render_template[{name}]"),
            cause: e.to_string(),
        })
    }

    /// Whether a template is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}
