//! Tera expansion of configuration files before they are parsed
//!
//! Lets a config file pull values from the environment or the command line:
//!
//! ```text
//! credentials:
//!   username: "{{ user }}"
//!   password: "{{ env(name='UPLOAD_PASSWORD') }}"
//! blob_store:
//!   url: "gs://{{ env(name='BUCKET', default='your-bucket-name') }}"
//! ```

use anyhow::Result;
use std::collections::HashMap;
use tera::{Tera, Value};

/// Render `yaml_content` with `variables` and the `env` function available
pub fn expand_yaml_template(
    yaml_content: &str,
    variables: &HashMap<String, String>,
) -> Result<String> {
    let mut tera = Tera::default();
    tera.register_function("env", env_function());

    let mut context = tera::Context::new();
    for (key, value) in variables {
        context.insert(key, value);
    }

    tera.render_str(yaml_content, &context).map_err(|e| {
        let mut parts = vec![format!("Config template rendering failed: {e}")];
        let chain = error_chain(&e);
        for cause in chain.iter().skip(1) {
            parts.push(format!("  caused by: {cause}"));
        }
        if variables.is_empty() {
            parts.push("No template variables provided (use --var key=value)".to_string());
        } else {
            let mut names: Vec<_> = variables.keys().collect();
            names.sort();
            parts.push(format!("Available variables: {names:?}"));
        }
        anyhow::anyhow!("{}", parts.join("\n"))
    })
}

/// Split `key=value` pairs given on the command line
pub fn parse_variables(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| anyhow::anyhow!("Invalid variable '{pair}', expected key=value"))
        })
        .collect()
}

fn error_chain(err: &dyn std::error::Error) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(err) = source {
        chain.push(err.to_string());
        source = err.source();
    }
    chain
}

/// `{{ env(name="VAR") }}` or `{{ env(name="VAR", default="fallback") }}`
fn env_function() -> impl tera::Function {
    Box::new(
        move |args: &HashMap<String, Value>| -> tera::Result<Value> {
            let var_name = args
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| tera::Error::msg("env function requires 'name' parameter"))?;
            let default_value = args.get("default").and_then(|v| v.as_str());

            match std::env::var(var_name) {
                Ok(value) => Ok(Value::String(value)),
                Err(std::env::VarError::NotPresent) => default_value
                    .map(|d| Value::String(d.to_string()))
                    .ok_or_else(|| {
                        tera::Error::msg(format!(
                            "Environment variable '{var_name}' not set and no default provided"
                        ))
                    }),
                Err(e) => Err(tera::Error::msg(format!(
                    "Failed to read environment variable '{var_name}': {e}"
                ))),
            }
        },
    )
}
