//! Template engine for request templates
//!
//! Request fields are written with `${ ... }` expressions, `{% ... %}` blocks
//! and `{# ... #}` comments. `$${` renders a literal `${`, which lets a body
//! carry shell or JSONPath snippets untouched.

use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, UndefinedBehavior};

use super::context::TemplateContext;
use super::error::TemplateError;
use super::filters;

/// Stand-in for `$${` while minijinja runs
const ESCAPED_PLACEHOLDER: &str = "\x00__HTTP_PROVIDER_ESCAPED_DOLLAR_BRACE__\x00";

/// Template engine for request URLs, bodies, and headers
///
/// Undefined variables are errors, so a template that references a field
/// missing from the cached response fails instead of rendering an empty
/// string.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a new template engine
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded delimiter configuration is rejected by
    /// minijinja, which only happens on an incompatible library version.
    pub fn new() -> Self {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters("${", "}")
            .block_delimiters("{%", "%}")
            .comment_delimiters("{#", "#}")
            .build()
            .expect("template syntax configuration is hardcoded and valid");

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        filters::register(&mut env);

        Self { env }
    }

    /// Render a template string with the given context
    ///
    /// Templates without any template syntax are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Render` if the syntax is invalid, a referenced
    /// variable is undefined, or a filter fails.
    pub fn render(&self, template: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        if !Self::has_template_syntax(template) {
            return Ok(template.to_string());
        }

        let preprocessed = template.replace("$${", ESCAPED_PLACEHOLDER);

        let rendered = self
            .env
            .render_str(&preprocessed, ctx.to_value())
            .map_err(TemplateError::from)?;

        Ok(rendered.replace(ESCAPED_PLACEHOLDER, "${"))
    }

    /// Whether `s` needs rendering at all
    pub fn has_template_syntax(s: &str) -> bool {
        s.contains("${") || s.contains("{%") || s.contains("{#")
    }
}
