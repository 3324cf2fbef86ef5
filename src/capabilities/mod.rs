//! Capability modules: thin wrappers over a provider's `Transport` and the
//! shared chat translators, one per advertised capability surface beyond
//! plain chat.

pub mod assistants;
pub mod audio;
pub mod embeddings;
pub mod files;
pub mod images;
pub mod models;
pub mod moderation;
