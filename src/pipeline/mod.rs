pub mod consumer;
pub mod dlq;

pub use consumer::{OrderConsumer, PipelineConfig, ProcessOutcome};
pub use dlq::{DeadLetterPublisher, DeadLetterReason};
