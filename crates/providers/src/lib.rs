//! Oracle provider implementations for taskloom.
//!
//! All providers implement the `taskloom_core::Provider` trait.

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;

use std::sync::Arc;
use taskloom_config::AppConfig;
use taskloom_core::error::ProviderError;

/// Build the configured oracle: an OpenAI-compatible client behind retries.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn taskloom_core::Provider>, ProviderError> {
    let provider = OpenAiCompatProvider::from_config(config)?;
    Ok(Arc::new(RetryProvider::new(Arc::new(provider))))
}
