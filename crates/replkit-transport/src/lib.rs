//! Line-delimited JSON stdio transport for the tool surface.
//!
//! Provides:
//! - Wire protocol types (`ClientRequest` / `ServerReply`)
//! - The serve loop (`serve`, `serve_stdio`)

pub mod protocol;
pub mod stdio;

pub use protocol::{ClientRequest, ServerReply};
pub use stdio::{ProtocolError, ReplyWriter, serve, serve_stdio};
