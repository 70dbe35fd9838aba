//! # Channel Events
//!
//! Optional notification sinks injected when a channel is built. They observe
//! the lifecycle; they never change framing or connection state.

use std::fmt;
use std::net::SocketAddr;

/// Called once after `open` succeeds, with the peer address.
pub type ConnectedHook = Box<dyn FnMut(SocketAddr) + Send>;

/// Called once per completed `read_message`, with the decoded payload.
pub type MessageHook = Box<dyn FnMut(&str) + Send>;

/// Set of optional event sinks for a channel.
#[derive(Default)]
pub struct ChannelEvents {
    on_connected: Option<ConnectedHook>,
    on_message: Option<MessageHook>,
}

impl ChannelEvents {
    pub fn new() -> Self {
        ChannelEvents::default()
    }

    /// Registers the connected sink, replacing any previous one.
    pub fn on_connected<F>(mut self, hook: F) -> Self
    where
        F: FnMut(SocketAddr) + Send + 'static,
    {
        self.on_connected = Some(Box::new(hook));
        self
    }

    /// Registers the message sink, replacing any previous one.
    pub fn on_message<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.on_message = Some(Box::new(hook));
        self
    }

    pub(crate) fn connected(&mut self, peer: SocketAddr) {
        if let Some(hook) = self.on_connected.as_mut() {
            hook(peer);
        }
    }

    pub(crate) fn message(&mut self, text: &str) {
        if let Some(hook) = self.on_message.as_mut() {
            hook(text);
        }
    }
}

impl fmt::Debug for ChannelEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEvents")
            .field("on_connected", &self.on_connected.is_some())
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn empty_events_are_silent() {
        let mut events = ChannelEvents::new();
        events.connected("127.0.0.1:1".parse().unwrap());
        events.message("ignored");
    }

    #[test]
    fn message_sink_receives_payload() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut events = ChannelEvents::new().on_message(move |text| {
            sink.lock().unwrap().push(text.to_string());
        });

        events.message("first");
        events.message("second");
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }
}
