//! Derived keys and mutable status storage

pub mod keys;
pub mod status_tags;

pub use keys::{structured_key, text_key};
pub use status_tags::{StatusRecord, StatusTagStore, TAG_KEY_JOB_ID, TAG_KEY_STATUS};
