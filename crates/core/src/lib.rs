//! # taskloom core
//!
//! Domain types, traits, and error definitions for the taskloom agent
//! execution engine. Every other crate depends inward on this one.
//!
//! ## Design Philosophy
//!
//! The oracle (an LLM endpoint) and the tools are collaborators defined here
//! as traits. Implementations live in their respective crates, which keeps
//! the step loop testable against scripted mocks.

pub mod agent;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentState, AgentStatus};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use memory::Memory;
pub use message::{Message, Role, ToolCall};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition};
pub use tool::{Tool, ToolRegistry, ToolResult};
