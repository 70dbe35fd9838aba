//! # Delimited Message Channel Client
//!
//! Purpose: Provide a small, synchronous TCP client that exchanges
//! delimiter-terminated text messages with a peer running on another runtime.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Channel` hides socket setup, buffering and framing.
//! 2. **Blocking by Design**: Calls block on the transport; there are no
//!    background threads.
//! 3. **Fail Fast**: Connection, I/O and truncation failures are typed errors.
//! 4. **Optional Hooks**: Notifications are injected closures, not listeners.

mod channel;
mod config;
mod events;

pub use channel::{Channel, ChannelBuilder, ChannelState};
pub use config::ChannelConfig;
pub use dmc_common::{ChannelError, ChannelResult, RemainderPolicy, TextEncoding};
pub use events::{ChannelEvents, ConnectedHook, MessageHook};
