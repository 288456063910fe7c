//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use askbot_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde_json::Value;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// This function:
/// 1. Checks that every variable declared under `input.variables` is supplied
/// 2. Renders the system and user templates using Handlebars
/// 3. Returns a `BuiltPrompt` ready for LLM execution
///
/// Variables are a JSON object so templates can iterate structured data such
/// as `{{#each history}}`.
///
/// # Example
/// ```no_run
/// use askbot_prompt::{build_prompt, PromptDefinition};
/// use serde_json::json;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let vars = json!({ "question": "What is Rust?", "history": [] });
/// let built = build_prompt(&def, &vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, variables: &Value) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let object = variables.as_object().ok_or_else(|| {
        AppError::Prompt(format!(
            "Variables for prompt {} must be a JSON object",
            definition.id
        ))
    })?;

    let missing: Vec<&str> = definition
        .input
        .variables
        .iter()
        .filter(|name| object.get(name.as_str()).map_or(true, Value::is_null))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt {} is missing variables: {}",
            definition.id,
            missing.join(", ")
        )));
    }

    let handlebars = registry();

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(&handlebars, template, variables))
        .transpose()?;
    let user = render_template(&handlebars, &definition.template, variables)?;

    let resolved_variables: HashMap<String, String> = object
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect();

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        definition.output.is_json(),
        resolved_variables,
    ))
}

fn registry() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
}

/// Render a Handlebars template with variables.
fn render_template(
    handlebars: &Handlebars<'static>,
    template: &str,
    variables: &Value,
) -> AppResult<String> {
    handlebars
        .render_template(template, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
