pub mod client;
pub mod config;
pub mod error;
pub mod generation;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod routes;
pub mod session;
pub mod state;

use std::sync::Arc;

pub fn build_state(config: &config::Config) -> anyhow::Result<state::AppState> {
    let completion_client: Arc<dyn provider::CompletionClient> =
        Arc::new(provider::OpenAiClient::from_config(config));
    state::AppState::new(completion_client)
}
