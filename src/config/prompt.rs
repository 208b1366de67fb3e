use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use log::info;
use thiserror::Error;

pub const CONTEXT_PLACEHOLDER: &str = "{context}";

pub const DEFAULT_SYSTEM_TEMPLATE: &str = "You are a helpful AI assistant for PaperPusher, a document management and product catalog system.
Your role is to help users with their questions about products and documents.

{context}

Guidelines:
1. Be professional and courteous
2. If you don't know something, say so
3. When discussing products, use accurate pricing and details
4. Keep responses focused and relevant";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file IO error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Prompt JSON parsing error for '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("System template is missing the {CONTEXT_PLACEHOLDER} placeholder")]
    MissingPlaceholder,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PromptConfig {
    pub system_template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { system_template: DEFAULT_SYSTEM_TEMPLATE.to_string() }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if !self.system_template.contains(CONTEXT_PLACEHOLDER) {
            return Err(PromptError::MissingPlaceholder);
        }
        Ok(())
    }

    pub fn render_system(&self, context_text: &str) -> String {
        self.system_template.replace(CONTEXT_PLACEHOLDER, context_text)
    }
}

pub fn parse_prompts(path: &str, content: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json
        ::from_str(content)
        .map_err(|source| PromptError::Json { path: path.to_string(), source })?;
    config.validate()?;
    Ok(config)
}

/// Loads the prompt file if one is configured, otherwise the built-in template.
pub fn load_prompts(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    let Some(path) = path else {
        info!("No prompts file configured, using built-in system template.");
        return Ok(Arc::new(PromptConfig::default()));
    };
    let file_content = fs
        ::read_to_string(path)
        .map_err(|source| PromptError::Io { path: path.to_string(), source })?;
    let config = parse_prompts(path, &file_content)?;
    info!("Loaded system template from: {}", path);
    Ok(Arc::new(config))
}
