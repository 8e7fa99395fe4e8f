//! LSP client plumbing for the FFI Navigator host.
//!
//! Owns the spawned language-server process and the protocol lifecycle:
//! the initialize/initialized handshake on the way up, the shutdown/exit
//! pair on the way down. All protocol traffic runs on a dedicated thread;
//! the owner communicates via channels and never blocks on the server.

pub mod messages;
pub mod session;
pub mod transport;

pub use messages::{LogLevel, SessionEvent, SessionRequest};
pub use session::{IoMode, LaunchConfig, LspSession, SessionOptions, StopSignal};
