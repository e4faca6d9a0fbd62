pub mod message;
pub mod types;

pub use message::InboundMessage;
pub use types::{ContactRecord, IntentLabel, UserProfile, Verdict};
