pub mod cascade;
pub mod keywords;
pub mod llm;
pub mod model;

pub use cascade::IntentCascade;
pub use llm::{ChatCompletionsBackend, LlmBackend, LlmConfirmer};
pub use model::{IntentModel, TfidfIntentModel};
