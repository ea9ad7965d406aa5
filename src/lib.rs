//! shopchat library.
//!
//! A streaming chat client for the ShopMind assistant service: session
//! identity and bounded conversational memory, an incremental streaming
//! answer pipeline, and a dual-pass renderer for link-aware display markup.

pub mod chat;
pub mod cli;
pub mod config;
pub mod history;
pub mod message;
pub mod paths;
pub mod render;
pub mod repl;
pub mod session;
pub mod storage;
pub mod transport;
