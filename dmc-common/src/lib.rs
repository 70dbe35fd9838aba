// dmc-common - Shared error, encoding and framing definitions for the
// delimited message channel
//
// This crate holds everything that does not touch a socket

pub mod encoding;
pub mod error;
pub mod framing;

// Re-export for convenience
pub use encoding::*;
pub use error::*;
pub use framing::*;
