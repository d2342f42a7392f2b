//! Prompt builder for rendering templates with grounding context.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use concierge_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde_json::Value;

/// Build a prompt from a definition and template variables.
///
/// Both the system and the user template are rendered with the same
/// variables. Missing variables render as empty strings.
///
/// # Example
/// ```no_run
/// use concierge_prompt::{build_prompt, PromptDefinition};
/// use serde_json::json;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let vars = json!({ "query": "Where is the taxi stand?", "hasContext": false });
/// let built = build_prompt(&def, &vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, variables: &Value) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, variables))
        .transpose()?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let user = render_template(&definition.template, variables)?
        .trim()
        .to_string();

    let context_included = variables
        .get("hasContext")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(BuiltPrompt {
        system,
        user,
        temperature: definition.behavior.temperature,
        max_tokens: definition.behavior.max_tokens,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            context_included,
            resolved_variables: variables.clone(),
        },
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &Value) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Prompts are plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{embedded_prompt, GROUNDED_CHAT_PROMPT};
    use crate::types::{PromptBehavior, PromptOutputSpec};
    use serde_json::json;

    fn definition(system: Option<&str>, template: &str) -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            created_by: "test".to_string(),
            behavior: PromptBehavior::default(),
            system: system.map(str::to_string),
            template: template.to_string(),
            output: PromptOutputSpec::default(),
        }
    }

    #[test]
    fn test_render_simple_template() {
        let result = render_template("Question: {{query}}", &json!({"query": "Hello & bye"}));
        assert_eq!(result.unwrap(), "Question: Hello & bye");
    }

    #[test]
    fn test_render_template_missing_variable() {
        // Handlebars renders missing variables as empty string
        let result = render_template("Question: {{missing}}", &json!({}));
        assert_eq!(result.unwrap(), "Question: ");
    }

    #[test]
    fn test_build_renders_system_and_user() {
        let def = definition(Some("You work at {{airportName}}."), "Q: {{query}}");
        let built = build_prompt(
            &def,
            &json!({"airportName": "Mactan-Cebu International Airport", "query": "Taxi?"}),
        )
        .unwrap();

        assert_eq!(
            built.system.as_deref(),
            Some("You work at Mactan-Cebu International Airport.")
        );
        assert_eq!(built.user, "Q: Taxi?");
        assert_eq!(built.max_tokens, 400);
        assert!(!built.metadata.context_included);
    }

    #[test]
    fn test_grounded_prompt_switches_on_context() {
        let def = embedded_prompt(GROUNDED_CHAT_PROMPT).unwrap();

        let grounded = build_prompt(
            &def,
            &json!({
                "query": "Is KFC available?",
                "context": "Q: Where is KFC?\nA: Level 2 food court",
                "hasContext": true,
                "lowConfidence": false,
                "airportName": "MCIA"
            }),
        )
        .unwrap();
        assert!(grounded.user.contains("Level 2 food court"));
        assert!(!grounded.user.contains("No airport information"));
        assert!(grounded.user.ends_with("Traveller question: Is KFC available?"));
        assert!(grounded.metadata.context_included);

        let ungrounded = build_prompt(
            &def,
            &json!({"query": "Hi", "hasContext": false, "lowConfidence": true}),
        )
        .unwrap();
        assert!(ungrounded.user.contains("No airport information matched"));
        assert!(ungrounded.user.contains("may only partly match"));
    }
}
