use std::io::ErrorKind;
use std::path::PathBuf;

use handlebars::Handlebars;

use crate::notification::errors::NotificationError;
use crate::notification::ports::TemplateRenderer;

/// Renders Handlebars templates read from a directory.
///
/// Templates are read on every render so they can be edited without a restart.
pub struct HandlebarsTemplateRenderer {
    registry: Handlebars<'static>,
    templates_dir: PathBuf,
}

impl HandlebarsTemplateRenderer {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        let mut registry = Handlebars::new();
        // A template referencing a value the data lacks is a bug, not an empty string.
        registry.set_strict_mode(true);

        Self {
            registry,
            templates_dir: templates_dir.into(),
        }
    }
}

impl TemplateRenderer for HandlebarsTemplateRenderer {
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String, NotificationError> {
        let path = self.templates_dir.join(template);
        let source = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => NotificationError::TemplateMissing(path.display().to_string()),
            _ => NotificationError::RenderingFailed(format!("{}: {}", path.display(), e)),
        })?;

        self.registry
            .render_template(&source, data)
            .map_err(|e| NotificationError::RenderingFailed(format!("{}: {}", template, e)))
    }
}
