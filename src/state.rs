use crate::generation::{compile_record_schema, GenerationService};
use crate::provider::CompletionClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub generator: GenerationService,
}

impl AppState {
    pub fn new(completion_client: Arc<dyn CompletionClient>) -> anyhow::Result<Self> {
        let record_schema = compile_record_schema()?;
        Ok(Self {
            generator: GenerationService::new(completion_client, record_schema),
        })
    }
}
