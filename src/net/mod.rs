pub use client::ChatClient;

mod client;

use crate::chat::Message;

pub const CHAT_PATH: &str = "/ws/chat";

/// What the connection task reports back to the app.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Connecting(String),
    Connected(String),
    ConnectFailed(String),
    Message(Message),
    Closed,
}

/// Server base addresses; the chat path is appended to each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    primary: String,
    fallback: Option<String>,
}

impl Endpoints {
    pub fn new(primary: &str, fallback: Option<&str>) -> Self {
        Self {
            primary: primary.to_string(),
            fallback: fallback.map(str::to_string),
        }
    }

    pub fn primary_url(&self) -> String {
        chat_url(&self.primary)
    }

    /// None when there is no fallback or it is the same server as the primary.
    pub fn fallback_url(&self) -> Option<String> {
        let fallback = chat_url(self.fallback.as_deref()?);
        if fallback == self.primary_url() {
            None
        } else {
            Some(fallback)
        }
    }
}

pub fn chat_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), CHAT_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_chat_path() {
        assert_eq!(chat_url("ws://localhost:8080"), "ws://localhost:8080/ws/chat");
        assert_eq!(chat_url("ws://localhost:8080/"), "ws://localhost:8080/ws/chat");
    }

    #[test]
    fn fallback_same_as_primary_is_skipped() {
        let endpoints = Endpoints::new("ws://localhost:8080", Some("ws://localhost:8080/"));
        assert_eq!(endpoints.fallback_url(), None);

        let endpoints = Endpoints::new("ws://a:1", Some("ws://b:2"));
        assert_eq!(endpoints.fallback_url().as_deref(), Some("ws://b:2/ws/chat"));

        let endpoints = Endpoints::new("ws://a:1", None);
        assert_eq!(endpoints.fallback_url(), None);
    }
}
