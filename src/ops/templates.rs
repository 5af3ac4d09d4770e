//! Template rendering.
//!
//! Built-in templates are compiled into the binary. A template directory
//! given on the command line shadows them by relative name.

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::error::{Result, TemplateError};
use crate::session::SessionContext;

/// Apache vhost template.
pub const APACHE_TEMPLATE: &str = "apache/base.conf";
/// WSGI entry point template.
pub const WSGI_TEMPLATE: &str = "wsgi/base.conf";
/// Settings module template.
pub const SETTINGS_TEMPLATE: &str = "settings/base.py";
/// Management entry point template.
pub const MANAGE_TEMPLATE: &str = "manage.py";
/// Starter configuration written by `init`.
pub const CONFIG_TEMPLATE: &str = "stitch.yml";

const BUILTIN: &[(&str, &str)] = &[
    (APACHE_TEMPLATE, include_str!("../../templates/apache/base.conf")),
    (WSGI_TEMPLATE, include_str!("../../templates/wsgi/base.conf")),
    (SETTINGS_TEMPLATE, include_str!("../../templates/settings/base.py")),
    (MANAGE_TEMPLATE, include_str!("../../templates/manage.py")),
    (CONFIG_TEMPLATE, include_str!("../../templates/stitch.yml")),
];

/// Returns the source of a built-in template.
#[must_use]
pub fn builtin(name: &str) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find(|(builtin_name, _)| *builtin_name == name)
        .map(|(_, source)| *source)
}

/// Renders configuration templates with strict undefined checks.
pub struct TemplateRenderer {
    env: Environment<'static>,
    override_dir: Option<PathBuf>,
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer")
            .field("override_dir", &self.override_dir)
            .finish_non_exhaustive()
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Creates a renderer using only the built-in templates.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a renderer that looks in `dir` before the built-ins.
    #[must_use]
    pub fn with_override_dir(dir: impl Into<PathBuf>) -> Self {
        Self::build(Some(dir.into()))
    }

    fn build(override_dir: Option<PathBuf>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);

        let dir = override_dir.clone();
        env.set_loader(move |name: &str| load_template(dir.as_deref(), name));

        Self { env, override_dir }
    }

    /// Renders `name` with `vars`.
    ///
    /// # Errors
    ///
    /// Returns a `TemplateError` if the template is missing, malformed or
    /// uses a variable that is not defined.
    pub fn render(&self, name: &str, vars: &Mapping) -> Result<String> {
        trace!(template = name, "Rendering template");
        let template = self
            .env
            .get_template(name)
            .map_err(|e| TemplateError::render(name, e.to_string()))?;
        let rendered = template
            .render(vars)
            .map_err(|e| TemplateError::render(name, e.to_string()))?;
        Ok(rendered)
    }
}

fn load_template(
    dir: Option<&Path>,
    name: &str,
) -> std::result::Result<Option<String>, minijinja::Error> {
    if name.split('/').any(|segment| segment == "..") {
        return Ok(None);
    }
    if let Some(dir) = dir {
        let path = dir.join(name);
        if path.is_file() {
            return std::fs::read_to_string(&path).map(Some).map_err(|e| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("cannot read {}: {e}", path.display()),
                )
            });
        }
    }
    Ok(builtin(name).map(str::to_string))
}

/// Builds the variables every configuration template sees.
#[must_use]
pub fn template_vars(ctx: &SessionContext, sitepackages: &str) -> Mapping {
    let mut vars = ctx.settings.values.clone();
    let mut set = |key: &str, value: Value| {
        vars.insert(Value::from(key), value);
    };

    let pypath: Vec<Value> = ctx.settings.pythonpath().into_iter().map(Value::from).collect();
    let overrides: Vec<Value> = ctx
        .settings
        .settings_overrides()
        .iter()
        .map(|(name, value)| {
            let name = name.as_str().map_or_else(|| python_literal(name), str::to_string);
            Value::Sequence(vec![Value::from(name), Value::from(python_literal(value))])
        })
        .collect();

    set("site", Value::from(ctx.site.as_str()));
    set("host", Value::from(ctx.host.shortname.as_str()));
    set("sitepackages", Value::from(sitepackages));
    set(
        "admin_media",
        Value::from(format!("{sitepackages}/django/contrib/admin/media")),
    );
    set("pypath", Value::Sequence(pypath));
    set(
        "staging_domain",
        ctx.host.staging_domain.as_deref().map_or(Value::Null, Value::from),
    );
    set("virtualenv_dir", Value::from(ctx.environment_path.as_str()));
    set("wsgi_dir", Value::from(ctx.wsgi_dir.as_str()));
    set("repository_path", Value::from(ctx.repository_path.as_str()));
    set("original_settings", Value::from(ctx.original_settings.as_str()));
    set(
        "settings_overrides",
        Value::Mapping(ctx.settings.settings_overrides().clone()),
    );
    set("overrides", Value::Sequence(overrides));
    vars
}

/// Formats a YAML value as a Python literal.
#[must_use]
pub fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => String::from("None"),
        Value::Bool(true) => String::from("True"),
        Value::Bool(false) => String::from("False"),
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() && float.is_nan() => String::from("float('nan')"),
            Some(float) if number.is_f64() && float.is_infinite() => {
                if float > 0.0 {
                    String::from("float('inf')")
                } else {
                    String::from("float('-inf')")
                }
            }
            _ => number.to_string(),
        },
        Value::String(text) => python_string(text),
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(python_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Mapping(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", python_literal(k), python_literal(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Tagged(tagged) => python_literal(&tagged.value),
    }
}

fn python_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\\"),
            '\'' => out.push_str(r"\'"),
            '\n' => out.push_str(r"\n"),
            '\r' => out.push_str(r"\r"),
            '\t' => out.push_str(r"\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}
