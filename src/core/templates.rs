//! Document templates used when scaffolding proposals and maintenance items.
//!
//! Templates are embedded at compile time from `templates/` and rendered by
//! plain `{{key}}` substitution. Unknown keys are left in place so they show
//! up as unfilled placeholders.

use crate::core::error::SpecdeckError;
use rust_embed::RustEmbed;
use std::collections::BTreeMap;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.md"]
struct Embedded;

pub type TemplateData<'a> = BTreeMap<&'a str, &'a str>;

pub trait TemplateRenderer {
    fn render(&self, template: &str, data: &TemplateData<'_>) -> Result<String, SpecdeckError>;
}

/// Renderer over the templates baked into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTemplates;

impl EmbeddedTemplates {
    pub fn list() -> Vec<String> {
        let mut names: Vec<String> = Embedded::iter().map(|n| n.into_owned()).collect();
        names.sort();
        names
    }

    pub fn raw(name: &str) -> Option<String> {
        Embedded::get(name).map(|f| String::from_utf8_lossy(&f.data).into_owned())
    }
}

impl TemplateRenderer for EmbeddedTemplates {
    fn render(&self, template: &str, data: &TemplateData<'_>) -> Result<String, SpecdeckError> {
        let raw = Self::raw(template)
            .ok_or_else(|| SpecdeckError::NotFound(format!("template {template}")))?;
        Ok(substitute(&raw, data))
    }
}

pub fn substitute(raw: &str, data: &TemplateData<'_>) -> String {
    let mut out = raw.to_string();
    for (key, value) in data {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}
