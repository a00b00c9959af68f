//! `it` protocol implementation.
//!
//! The control channel used by interactive image viewers to drive a
//! renderer. After `UtTcpOpen -proto it`, the viewer sends one command per
//! chunk, each terminated by a null byte and acknowledged with `ok\0`:
//!
//! ```text
//! dspyRender -crop 0 1 0 1\0        start a render
//! dspyIPR\0                         start interactive refinement
//! stopRender\0                      stop the current render
//! SelectObject -id 17\0             select an object by id
//! SelectSurface -id 4\0             select a surface by id
//! ```
//!
//! The handler here performs no driver work itself. It tracks render and
//! selection state for the session so a driver can be layered on top.

pub mod handler;

pub use handler::ItHandler;

/// Protocol id requested in the handshake.
pub const PROTOCOL_ID: &str = "it";
