use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Valores disponibles para los placeholders de un step.
///
/// Los links sólo están presentes cuando el step los referencia.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderContext {
    pub client_name: String,
    pub workflow_name: String,
    pub step_name: String,
    pub contract_link: Option<String>,
    pub form_link: Option<String>,
    pub booking_link: Option<String>,
}

impl RenderContext {
    pub fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            "client_name" => Some(&self.client_name),
            "workflow_name" => Some(&self.workflow_name),
            "step_name" => Some(&self.step_name),
            "contract_link" => self.contract_link.as_deref(),
            "form_link" => self.form_link.as_deref(),
            "booking_link" => self.booking_link.as_deref(),
            _ => None,
        }
    }
}

pub trait TemplateRenderer {
    fn render(&self, template: &str, ctx: &RenderContext) -> Result<String, CoreError>;
}

impl<T: TemplateRenderer + ?Sized> TemplateRenderer for &T {
    fn render(&self, template: &str, ctx: &RenderContext) -> Result<String, CoreError> {
        (**self).render(template, ctx)
    }
}

impl<T: TemplateRenderer + ?Sized> TemplateRenderer for Box<T> {
    fn render(&self, template: &str, ctx: &RenderContext) -> Result<String, CoreError> {
        (**self).render(template, ctx)
    }
}

/// Sustitución de `{clave}` sin lógica. Las claves desconocidas (o links que
/// el step no pidió) quedan tal cual en el texto.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, ctx: &RenderContext) -> Result<String, CoreError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find(['{', '}']) {
                Some(close) if after.as_bytes()[close] == b'}' => {
                    let key = &after[..close];
                    match ctx.lookup(key) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}
