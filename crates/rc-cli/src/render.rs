//! Plain-text template rendering.
//!
//! Templates are UTF-8 text with `{{field}}` markers. Markers naming a field
//! that is not in the map are left in place so they stand out in the output.

use std::sync::LazyLock;

use rc_core::{FieldMap, TemplateHandle, TemplateRenderer};
use regex::{Captures, Regex};
use thiserror::Error;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap());

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template {0} is not valid UTF-8")]
    NotUtf8(String),
}

/// Renders `{{field}}` templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    type Error = RenderError;

    fn render(&self, template: &TemplateHandle, fields: &FieldMap) -> Result<Vec<u8>, RenderError> {
        let text = std::str::from_utf8(&template.content)
            .map_err(|_| RenderError::NotUtf8(template.name.clone()))?;

        let rendered = PLACEHOLDER_RE.replace_all(text, |caps: &Captures<'_>| {
            let key = &caps[1];
            fields.get(key).map_or_else(
                || {
                    tracing::warn!(template = %template.name, field = key, "unknown placeholder");
                    caps[0].to_string()
                },
                ToString::to_string,
            )
        });
        Ok(rendered.into_owned().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_core::FieldValue;

    fn template(text: &str) -> TemplateHandle {
        TemplateHandle {
            name: "register.txt".to_string(),
            content: text.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_replaces_known_fields_and_keeps_unknown_ones() {
        let mut fields = FieldMap::new();
        fields.insert("day".into(), FieldValue::Int(19));
        fields.insert("participant_1_name".into(), FieldValue::Text("Anna Rossi".into()));

        let out = PlaceholderRenderer
            .render(
                &template("{{day}}: {{ participant_1_name }} / {{missing}}"),
                &fields,
            )
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "19: Anna Rossi / {{missing}}");
    }

    #[test]
    fn test_rejects_binary_templates() {
        let handle = TemplateHandle {
            name: "register.docx".to_string(),
            content: vec![0xff, 0xfe],
        };
        let err = PlaceholderRenderer.render(&handle, &FieldMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "template register.docx is not valid UTF-8");
    }
}
