//! The event relay: routing, normalization and SSE framing.

pub mod normalize;
pub mod router;
pub mod wire;

pub use normalize::{normalize, normalize_event};
pub use router::{AgentHandle, AgentRegistry, ChatMessage};
pub use wire::{encode_frame, FrameDecoder, WireEvent, END_FRAME};
