//! Model provider implementations for CloudWarden.
//!
//! All providers implement the `cloudwarden_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
