pub mod broadcast;

pub use broadcast::Broadcaster;
