//! Per-request debug trace returned to the caller alongside every chunk.
//!
//! A trace is created by [`DebugTrace::new`] for each request and then only grows: fields are filled in as the
//! request progresses and errors are appended under unique keys.

pub mod step;

use log::warn;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

pub use self::step::{ ExecutionStep, Step };
use crate::cli::Args;
use crate::llm::chat::PromptMessage;
use crate::models::product::SearchResult;

/// Static model / resource configuration, fixed for the lifetime of a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigInfo {
    pub openai_model: String,
    pub openai_temperature: f32,
    pub embedding_model: String,
    pub embedding_dimensions: u32,
    pub vector_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supabase_url: Option<String>,
}

impl ConfigInfo {
    pub fn from_args(args: &Args) -> Self {
        Self {
            openai_model: args.chat_model.clone(),
            openai_temperature: args.temperature,
            embedding_model: args.embedding_model.clone(),
            embedding_dimensions: args.dimension,
            vector_type: args.vector_type.clone(),
            vector_index: Some(args.index_name.clone()).filter(|s| !s.is_empty()),
            supabase_url: Some(args.supabase_url.clone()).filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntermediateValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_request: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_fetch_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_messages: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_messages: Option<Vec<PromptMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugTrace {
    request_id: String,
    config: ConfigInfo,
    pub intermediate_values: IntermediateValues,
    execution_step: ExecutionStep,
    errors: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_results: Option<Vec<SearchResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_embedding_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_inputs: Option<Value>,
}

impl DebugTrace {
    pub fn new(config: ConfigInfo) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            config,
            intermediate_values: IntermediateValues::default(),
            execution_step: ExecutionStep::Active(Step::Initializing),
            errors: BTreeMap::new(),
            product_context: None,
            similarity_results: None,
            query_embedding_size: None,
            context_text: None,
            chain_inputs: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn config(&self) -> &ConfigInfo {
        &self.config
    }

    pub fn execution_step(&self) -> ExecutionStep {
        self.execution_step
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn has_error_prefix(&self, prefix: &str) -> bool {
        self.errors.keys().any(|k| k.starts_with(prefix))
    }

    /// Moves to `next` if the transition table allows it. Otherwise the step is
    /// left unchanged and `false` is returned.
    pub fn advance(&mut self, next: Step) -> bool {
        match self.execution_step {
            ExecutionStep::Active(current) if current.can_advance_to(next) => {
                self.execution_step = ExecutionStep::Active(next);
                true
            }
            current => {
                warn!(
                    "[{}] rejected execution step transition {} -> {}",
                    self.request_id,
                    current,
                    next
                );
                false
            }
        }
    }

    /// Marks the current step as failed and returns it. A trace that already
    /// failed or completed keeps its step.
    pub fn fail(&mut self) -> Step {
        let step = self.execution_step.step();
        if self.execution_step.is_terminal() {
            warn!("[{}] {} is terminal, not marking it failed", self.request_id, self.execution_step);
            return step;
        }
        self.execution_step = ExecutionStep::Failed(step);
        step
    }

    /// Records an error without touching earlier entries. A key that is
    /// already taken gets a `_2`, `_3`, ... suffix. Returns the key used.
    pub fn record_error(&mut self, key: impl Into<String>, message: impl Into<String>) -> String {
        let base = key.into();
        let mut key = base.clone();
        let mut n = 2;
        while self.errors.contains_key(&key) {
            key = format!("{}_{}", base, n);
            n += 1;
        }
        self.errors.insert(key.clone(), message.into());
        key
    }
}
