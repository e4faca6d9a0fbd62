pub mod checkpoint;
pub mod coordinator;
pub mod handler;
pub mod replay;

pub use checkpoint::CheckpointStore;
pub use coordinator::IngestCoordinator;
pub use handler::{HandleOutcome, IngestSource, MessageHandler};
pub use replay::{HistorySource, ReplayController};
