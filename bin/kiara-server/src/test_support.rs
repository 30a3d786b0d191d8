//! Fixtures shared by the route and extractor tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kiara_core::{
    ChatService, GenerationError, GenerationOptions, InferenceBackend, PromptFormatter,
    TemplateVariant,
};

use crate::config::Config;
use crate::db::sqlite::SqliteStore;
use crate::state::AppState;

pub const TOKEN: &str = "test-token";

/// What a [`ScriptedBackend`] does on every call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Echo the prompt followed by this completion, like llama.cpp does.
    Reply(String),
    Fail,
    Panic,
}

#[derive(Debug)]
pub struct ScriptedBackend {
    script: Script,
    pub calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Reply(completion) => Ok(format!("{prompt}{completion}")),
            Script::Fail => Err(GenerationError::Unavailable("model offline".into())),
            Script::Panic => panic!("backend exploded"),
        }
    }
}

pub fn test_config(production: bool) -> Config {
    Config {
        production,
        bind_address: "127.0.0.1:0".into(),
        database_url: "sqlite::memory:".into(),
        db_max_connections: 1,
        internal_token: TOKEN.into(),
        inference_url: "http://127.0.0.1:9".into(),
        model: "test".into(),
        template: TemplateVariant::GenericAssistantTag,
        chat_template_file: None,
        system_prompt: None,
        generation: GenerationOptions::default(),
        inference_timeout: Duration::from_secs(5),
        max_concurrent_generations: 1,
        max_message_bytes: 256,
        cors_allowed_origins: None,
        enable_swagger: !production,
        log_level: "debug".into(),
        log_json: false,
        log_dir: None,
    }
}

/// A wired application over a fresh in-memory database.  `store` shares
/// the pool and `backend` the call counter, so tests can inspect both.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: SqliteStore,
    pub backend: Arc<ScriptedBackend>,
}

impl TestApp {
    pub async fn new(production: bool, script: Script) -> Self {
        let config = test_config(production);
        let store = SqliteStore::in_memory().await.unwrap();
        let backend = Arc::new(ScriptedBackend::new(script));
        let chat = ChatService::new(
            backend.clone(),
            Arc::new(store.clone()),
            PromptFormatter::new(config.template),
            config.generation,
        );
        let state = Arc::new(AppState {
            config: Arc::new(config),
            chat: Arc::new(chat),
            store: store.clone(),
        });
        Self { state, store, backend }
    }

    pub fn generations(&self) -> usize {
        self.backend.calls.load(Ordering::SeqCst)
    }
}
