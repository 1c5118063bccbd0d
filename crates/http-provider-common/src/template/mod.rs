//! Request templating
//!
//! Request URLs, bodies, and header values are minijinja templates using
//! `${...}` placeholders. Templates can reference:
//! - `${payload.baseUrl}`, `${payload.body}` - Static payload from the resource
//! - `${response.statusCode}`, `${response.headers}`, `${response.body}` - Last cached response
//! - `${secret.NAME.KEY}`, `${secret.NAMESPACE/NAME.KEY}` - Kubernetes Secret values
//! - `{% if %}...{% endif %}`, `{% for %}...{% endfor %}` - Blocks
//! - Filters: `tojson`, `default`, `base64_encode`, `base64_decode`, `upper`, `lower`

mod context;
mod engine;
mod error;
mod filters;
mod secret_ref;

pub use context::{TemplateContext, TemplateContextBuilder};
pub use engine::TemplateEngine;
pub use error::TemplateError;
pub use secret_ref::{extract_secret_refs, parse_secret_ref, SecretReference};
