//! Prompt loader for YAML prompt definitions.
//!
//! Workspace files under `.concierge/prompts/` override the definitions
//! compiled into the binary.

use crate::types::PromptDefinition;
use concierge_core::{AppError, AppResult};
use std::path::Path;

/// Id of the prompt used to answer chat messages.
pub const GROUNDED_CHAT_PROMPT: &str = "airport.chat.grounded";

const EMBEDDED: &[(&str, &str)] = &[(
    GROUNDED_CHAT_PROMPT,
    include_str!("../prompts/airport.chat.grounded.yml"),
)];

/// Load a prompt definition by ID.
///
/// Searches for `<id>.yml` in `.concierge/prompts/` first and falls back to
/// the embedded definition of the same id.
///
/// # Example
/// ```no_run
/// use concierge_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "airport.chat.grounded")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".concierge/prompts")
        .join(format!("{}.yml", prompt_id));

    if prompt_file.exists() {
        tracing::debug!("Loading prompt from: {:?}", prompt_file);

        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;

        let definition = parse_prompt(&contents)
            .map_err(|e| AppError::Prompt(format!("{:?}: {}", prompt_file, e)))?;
        tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);
        return Ok(definition);
    }

    embedded_prompt(prompt_id)
}

/// The compiled-in definition for `prompt_id`.
pub fn embedded_prompt(prompt_id: &str) -> AppResult<PromptDefinition> {
    let (_, contents) = EMBEDDED
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Prompt not found: {}", prompt_id)))?;
    parse_prompt(contents)
}

/// List available prompt IDs: embedded ones plus workspace overrides.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = EMBEDDED.iter().map(|(id, _)| id.to_string()).collect();

    let prompts_dir = workspace_path.join(".concierge/prompts");
    if prompts_dir.exists() {
        for entry in walkdir::WalkDir::new(&prompts_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

fn parse_prompt(contents: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML: {}", e)))?;
    validate_prompt(&definition)?;
    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
