//! Command/response protocol over the packetised link.
//!
//! - [`frame`]: packed frame headers, status taxonomy, bounded response
//!   builder.
//! - [`wire`]: byte-exact payload layouts (calendar, sample envelope,
//!   profile-adjacent structs).
//! - [`engine`]: the dispatch table and handlers.

pub mod engine;
pub mod frame;
pub mod wire;

pub use engine::{CommandContext, CommandId, ProtocolEngine};
pub use frame::{CommandFrame, FrameError, Response, StatusCode};
