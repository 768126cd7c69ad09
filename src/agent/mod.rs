//! Agents: the executor capability, its tool-loop implementation, per-thread
//! state, and the built-in catalog.

pub mod catalog;
pub mod checkpoint;
pub mod conversation;
pub mod events;
pub mod executor;
pub mod runtime;

pub use catalog::{definitions, AgentDefinition, BuildContext};
pub use checkpoint::MemoryCheckpointer;
pub use conversation::Conversation;
pub use events::{RawEvent, INTERNAL_TAG};
pub use executor::{AgentExecutor, AgentInput, AgentState, RawEventStream, RunConfig};
pub use runtime::ToolLoopAgent;
