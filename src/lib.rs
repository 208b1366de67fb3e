pub mod chain;
pub mod cli;
pub mod config;
pub mod debug;
pub mod error;
pub mod llm;
pub mod models;
pub mod rag;
pub mod server;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use chain::ChatChain;
use cli::Args;
use log::info;
use server::{ AppState, Server };
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model);
    info!("Chat Temperature: {}", args.temperature);
    info!("Embedding LLM Type: {}", args.embedding_llm_type);
    info!("Embedding Model: {} ({} dimensions)", args.embedding_model, args.dimension);
    info!("Vector Store Type: {}", args.vector_type);
    info!("Vector Index: {}", args.index_name);
    info!("Supabase URL: {}", args.supabase_url);
    info!("Similarity Top K: {}", args.top_k);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("(built-in)"));
    info!("-------------------------");

    let stores = store::initialize_stores(&args)?;
    let chain = ChatChain::initialize(&args, &stores)?;
    let state = AppState { chain, products: stores.products };

    let server = Server::new(args.server_addr.clone(), state);
    server.run().await?;

    Ok(())
}
