//! Translators from inbound events to orchestrator requests

pub mod notification;
pub mod storage_event;

pub use notification::JobCompletion;
pub use storage_event::StorageEvent;
