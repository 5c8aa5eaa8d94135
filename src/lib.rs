pub mod cli;
pub mod config;
pub mod history;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod store;

use log::info;
use std::error::Error;
use std::sync::Arc;

use cli::Args;
use config::prompt::load_system_instruction;
use llm::chat::new_bridge;
use llm::LlmConfig;
use pipeline::ChatTurnPipeline;
use server::auth::OpaqueTokenVerifier;
use server::Server;
use store::initialize_conversation_store;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Conversation Store Type: {}", args.history_type);
    info!("Conversation Store Host: {}", args.history_host);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("History Window: {} turns", args.max_history_turns);
    info!("Expose Error Details: {}", args.expose_error_details);
    info!("-------------------------");

    let store = initialize_conversation_store(&args)?;

    let chat_config = LlmConfig {
        llm_type: args.chat_llm_type
            .parse()
            .map_err(|e| format!("Invalid chat LLM type: {}", e))?,
        base_url: args.chat_base_url.clone(),
        api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
        model: args.chat_model.clone(),
    };
    let bridge = new_bridge(&chat_config)?;

    let system_instruction = load_system_instruction(args.system_prompt_path.as_deref())?;

    let pipeline = Arc::new(
        ChatTurnPipeline::new(store, bridge, system_instruction, args.max_history_turns)
    );

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, pipeline, Arc::new(OpaqueTokenVerifier), args);
    server.run().await?;

    Ok(())
}
