//! kiara-core – everything between an inbound chat message and the stored
//! answer, minus the HTTP surface.

pub mod cleaner;
pub mod inference;
pub mod log_store;
pub mod prompt;
pub mod service;

pub use cleaner::{ResponseCleaner, TemplateVariant};
pub use inference::{GenerationError, GenerationOptions, InferenceBackend, LlamaServerBackend};
pub use log_store::{ChatExchange, ChatLogStore, InMemoryChatLogStore, StoreError};
pub use prompt::{PromptError, PromptFormatter};
pub use service::{ChatError, ChatReply, ChatService};
