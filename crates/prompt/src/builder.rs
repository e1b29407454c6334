//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use agentrag_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

/// Build a prompt from a definition and template data.
///
/// Both the system template (when present) and the user template are rendered
/// with Handlebars against the same `data`. HTML escaping is disabled since
/// the output is plain text for an LLM.
///
/// # Example
/// ```no_run
/// use agentrag_prompt::{build_prompt, builtin_prompt};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt("answer.cited")?;
/// let data = serde_json::json!({ "question": "What is Rust?", "sources": [] });
/// let built = build_prompt(&def, &data)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt<T: Serialize>(definition: &PromptDefinition, data: &T) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let handlebars = registry(definition)?;

    let user = handlebars
        .render("user", data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    let system = if definition.system.is_some() {
        Some(
            handlebars
                .render("system", data)
                .map_err(|e| AppError::Prompt(format!("Failed to render system template: {}", e)))?
                .trim_end()
                .to_string(),
        )
    } else {
        None
    };

    Ok(BuiltPrompt::new(system, user, definition.id.clone()))
}

fn registry(definition: &PromptDefinition) -> AppResult<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("user", &definition.template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    if let Some(ref system) = definition.system {
        handlebars
            .register_template_string("system", system)
            .map_err(|e| AppError::Prompt(format!("Failed to register system template: {}", e)))?;
    }

    Ok(handlebars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PromptBehavior, PromptOutputSpec};
    use serde_json::json;

    fn create_test_definition(template: &str, system: Option<&str>) -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            created_by: "test".to_string(),
            behavior: PromptBehavior {
                tone: "factual".to_string(),
                style: "concise".to_string(),
            },
            system: system.map(str::to_string),
            template: template.to_string(),
            output: PromptOutputSpec {
                format: "markdown".to_string(),
            },
        }
    }

    #[test]
    fn test_render_simple_template() {
        let def = create_test_definition("Question: {{question}}", None);
        let built = build_prompt(&def, &json!({ "question": "Hello, world!" })).unwrap();

        assert_eq!(built.user, "Question: Hello, world!");
        assert!(built.system.is_none());
        assert_eq!(built.metadata.source_prompt_id, "test.prompt");
    }

    #[test]
    fn test_no_html_escaping() {
        let def = create_test_definition("{{question}}", None);
        let built = build_prompt(&def, &json!({ "question": "a < b && \"c\"" })).unwrap();
        assert_eq!(built.user, "a < b && \"c\"");
    }

    #[test]
    fn test_each_over_sources_and_system() {
        let def = create_test_definition(
            "{{#each sources}}[{{index}}] {{text}};{{/each}}",
            Some("Mode: {{mode}}\n"),
        );
        let data = json!({
            "mode": "cited",
            "sources": [
                { "index": 1, "text": "first" },
                { "index": 2, "text": "second" }
            ]
        });

        let built = build_prompt(&def, &data).unwrap();
        assert_eq!(built.user, "[1] first;[2] second;");
        assert_eq!(built.system.as_deref(), Some("Mode: cited"));
    }

    #[test]
    fn test_render_template_missing_variable() {
        let def = create_test_definition("Question: {{missing}}", None);
        // Handlebars renders missing variables as empty string
        let built = build_prompt(&def, &json!({})).unwrap();
        assert_eq!(built.user, "Question: ");
    }

    #[test]
    fn test_invalid_template_is_error() {
        let def = create_test_definition("{{#each sources}}unterminated", None);
        assert!(build_prompt(&def, &json!({})).is_err());
    }
}
