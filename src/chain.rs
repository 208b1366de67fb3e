use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::debug::{ ConfigInfo, DebugTrace, Step };
use crate::error::ProviderError;
use crate::llm::{ LlmConfig, LlmType };
use crate::llm::chat::{ ChatClient, ChatStream, PromptMessage, MessageKind, new_client as new_chat_client };
use crate::llm::embedding::new_client as new_embedding_client;
use crate::models::chat::Message;
use crate::rag::context::{ ContextAssembler, ContextSource };
use crate::rag::history::{ format_chat_history, HistoryError };
use crate::store::Stores;

use futures::{ Stream, StreamExt };
use log::{ info, error };
use serde::Serialize;
use serde_json::json;
use std::error::Error;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Content of the last chunk of a stream that failed part way.
pub const STREAM_ERROR_SENTINEL: &str = "Error: the response could not be completed.";

#[derive(Debug, Clone, Serialize)]
pub struct ChainChunk {
    pub content: String,
    pub debug: DebugTrace,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("conversation has no messages")]
    EmptyConversation,
    #[error("failed to format chat history: {0}")]
    History(#[from] HistoryError),
    #[error("completion failed: {0}")]
    Completion(#[from] ProviderError),
}

pub type ChainStream = Pin<Box<dyn Stream<Item = Result<ChainChunk, ChainError>> + Send>>;

#[derive(Clone)]
pub struct ChatChain {
    chat_client: Arc<dyn ChatClient>,
    context: ContextAssembler,
    prompt_config: Arc<PromptConfig>,
    config: ConfigInfo,
}

fn optional_key(key: &str) -> Option<String> {
    if key.is_empty() { None } else { Some(key.to_string()) }
}

/// Plain-text rendering of the prompt, for the trace.
pub fn render_prompt(messages: &[PromptMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.kind {
                MessageKind::System => "System",
                MessageKind::Human => "Human",
                MessageKind::Assistant => "AI",
            };
            format!("{}: {}", role, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl ChatChain {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        context: ContextAssembler,
        prompt_config: Arc<PromptConfig>,
        config: ConfigInfo
    ) -> Self {
        Self { chat_client, context, prompt_config, config }
    }

    pub fn initialize(args: &Args, stores: &Stores) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_llm_type: LlmType = args.chat_llm_type.parse()?;
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: optional_key(&args.chat_api_key),
            completion_model: Some(args.chat_model.clone()),
            ..Default::default()
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={:?}",
            args.chat_llm_type,
            chat_client.get_model(),
            chat_config.base_url.as_deref().unwrap_or("adapter default")
        );

        let embedding_llm_type: LlmType = args.embedding_llm_type.parse()?;
        let embedding_config = LlmConfig {
            llm_type: embedding_llm_type,
            base_url: args.embedding_base_url.clone(),
            api_key: optional_key(&args.embedding_api_key).or_else(||
                optional_key(&args.chat_api_key)
            ),
            embedding_model: Some(args.embedding_model.clone()),
            embedding_dimensions: Some(args.dimension),
            ..Default::default()
        };
        let embedding_client = new_embedding_client(&embedding_config)?;
        info!(
            "Embedding client configured: Type={}, Model={}, Dimensions={}",
            args.embedding_llm_type,
            args.embedding_model,
            args.dimension
        );

        let prompt_config = prompt::load_prompts(args.prompts_path.as_deref())?;
        let context = ContextAssembler::new(
            embedding_client,
            Arc::clone(&stores.search),
            args.top_k
        );

        Ok(Self::new(chat_client, context, prompt_config, ConfigInfo::from_args(args)))
    }

    pub fn context(&self) -> &ContextAssembler {
        &self.context
    }

    /// A new request-scoped trace carrying this chain's config.
    pub fn begin_trace(&self) -> DebugTrace {
        DebugTrace::new(self.config.clone())
    }

    pub fn produce(&self, messages: Vec<Message>, context_override: Option<String>) -> ChainStream {
        self.produce_with_trace(messages, context_override, self.begin_trace())
    }

    /// Streams the reply to the last message. Every chunk carries a snapshot of
    /// the trace taken when the chunk was produced. If anything fails, the stream
    /// ends with a [`STREAM_ERROR_SENTINEL`] chunk followed by the error.
    pub fn produce_with_trace(
        &self,
        messages: Vec<Message>,
        context_override: Option<String>,
        trace: DebugTrace
    ) -> ChainStream {
        let chain = self.clone();

        Box::pin(
            async_stream::stream! {
            let mut trace = trace;
            trace.advance(Step::StreamStarted);
            info!("[{}] stream started with {} message(s)", trace.request_id(), messages.len());

            let mut completion = match chain.prepare(&messages, context_override, &mut trace).await {
                Ok(s) => s,
                Err(e) => {
                    yield Ok(Self::fail(&mut trace, &e));
                    yield Err(e);
                    return;
                }
            };

            let mut chunks = 0usize;
            while let Some(item) = completion.next().await {
                match item {
                    Ok(content) => {
                        chunks += 1;
                        yield Ok(ChainChunk { content, debug: trace.clone() });
                    }
                    Err(e) => {
                        let e = ChainError::from(e);
                        yield Ok(Self::fail(&mut trace, &e));
                        yield Err(e);
                        return;
                    }
                }
            }

            trace.advance(Step::Completed);
            info!("[{}] stream completed after {} chunk(s)", trace.request_id(), chunks);
        }
        )
    }

    async fn prepare(
        &self,
        messages: &[Message],
        context_override: Option<String>,
        trace: &mut DebugTrace
    ) -> Result<ChatStream, ChainError> {
        let (last, history) = messages.split_last().ok_or(ChainError::EmptyConversation)?;
        trace.intermediate_values.last_message = Some(last.content.clone());

        trace.advance(Step::GettingContext);
        let context_text = match context_override.filter(|c| !c.is_empty()) {
            Some(ctx) => {
                info!("[{}] using supplied context, skipping similarity search", trace.request_id());
                trace.context_text = Some(ctx.clone());
                ctx
            }
            None => self.context.assemble(ContextSource::Query(&last.content), trace).await.0,
        };

        trace.advance(Step::FormattingHistory);
        let chat_history = format_chat_history(history, trace)?;

        trace.advance(Step::CreatingPrompt);
        let history_len = chat_history.len();
        let mut prompt = Vec::with_capacity(history_len + 2);
        prompt.push(PromptMessage::system(self.prompt_config.render_system(&context_text)));
        prompt.extend(chat_history);
        prompt.push(PromptMessage::human(last.content.clone()));

        trace.intermediate_values.prompt_template = Some(self.prompt_config.system_template.clone());
        trace.intermediate_values.final_prompt = Some(render_prompt(&prompt));
        trace.chain_inputs = Some(
            json!({
                "context": context_text,
                "chat_history_length": history_len,
                "input": last.content,
            })
        );

        trace.advance(Step::GeneratingResponse);
        info!(
            "[{}] generating response with {} prompt message(s), temperature {}",
            trace.request_id(),
            prompt.len(),
            self.config.openai_temperature
        );
        let stream = self.chat_client.stream_chat(&prompt, self.config.openai_temperature).await?;
        Ok(stream)
    }

    fn fail(trace: &mut DebugTrace, err: &ChainError) -> ChainChunk {
        let step = trace.fail();
        error!("[{}] stream failed during {}: {}", trace.request_id(), step, err);
        trace.record_error(format!("stream_error_{}", step), err.to_string());
        ChainChunk { content: STREAM_ERROR_SENTINEL.to_string(), debug: trace.clone() }
    }
}
