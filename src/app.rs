use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chat::{ChatEntry, ChatLog, Message, Reconcile, AI_SENDER, LOCAL_SENDER};
use crate::config::Config;
use crate::net::{ChatClient, ChatEvent, Endpoints};

const MAX_STATUS_MESSAGES: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Idle,
    Connecting(String),
    Connected(String),
    Disconnected,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    UsernameEntry,
    Chat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    pub should_quit: bool,
    pub screen: Screen,
    pub state: AppState,
    pub input_mode: InputMode,
    pub input: String,
    /// Cursor position in chars, not bytes.
    pub cursor_position: usize,
    /// Entries scrolled back from the newest one.
    pub scroll_offset: usize,

    pub username: Option<String>,
    pub username_hint: Option<String>,

    pub chat_log: ChatLog,
    pub status_messages: Vec<String>,

    endpoints: Endpoints,
    client: Option<ChatClient>,
    event_tx: mpsc::UnboundedSender<ChatEvent>,
    event_rx: mpsc::UnboundedReceiver<ChatEvent>,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            should_quit: false,
            screen: Screen::UsernameEntry,
            state: AppState::Idle,
            input_mode: InputMode::Editing,
            input: String::new(),
            cursor_position: 0,
            scroll_offset: 0,

            username: None,
            username_hint: None,

            chat_log: ChatLog::new(),
            status_messages: Vec::new(),

            endpoints: config.endpoints(),
            client: None,
            event_tx,
            event_rx,
        };

        if let Some(name) = config.username.as_deref() {
            app.submit_username(name);
        }

        app
    }

    pub fn handle_input(&mut self, event: Event) -> Result<()> {
        if let Event::Key(key) = event {
            // Windows reports releases too
            if key.kind == KeyEventKind::Press {
                self.handle_key_event(key);
            }
        }
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.screen {
            Screen::UsernameEntry => match key.code {
                KeyCode::Enter => {
                    let name = std::mem::take(&mut self.input);
                    self.cursor_position = 0;
                    self.submit_username(&name);
                }
                KeyCode::Esc => self.should_quit = true,
                _ => self.edit_input(key.code),
            },
            Screen::Chat => match self.input_mode {
                InputMode::Normal => match key.code {
                    KeyCode::Char('q') => self.should_quit = true,
                    KeyCode::Char('i') => self.input_mode = InputMode::Editing,
                    KeyCode::Up => self.scroll_up(1),
                    KeyCode::Down => self.scroll_down(1),
                    KeyCode::PageUp => self.scroll_up(10),
                    KeyCode::PageDown => self.scroll_down(10),
                    _ => {}
                },
                InputMode::Editing => match key.code {
                    KeyCode::Enter => {
                        self.submit_input();
                        self.input.clear();
                        self.cursor_position = 0;
                    }
                    KeyCode::Esc => {
                        self.input.clear();
                        self.cursor_position = 0;
                        self.input_mode = InputMode::Normal;
                    }
                    _ => self.edit_input(key.code),
                },
            },
        }
    }

    fn edit_input(&mut self, code: KeyCode) {
        let len = self.input.chars().count();
        match code {
            KeyCode::Char(c) => {
                let at = self.byte_index(self.cursor_position);
                self.input.insert(at, c);
                self.cursor_position += 1;
            }
            KeyCode::Backspace => {
                if self.cursor_position > 0 {
                    let at = self.byte_index(self.cursor_position - 1);
                    self.input.remove(at);
                    self.cursor_position -= 1;
                }
            }
            KeyCode::Delete => {
                if self.cursor_position < len {
                    let at = self.byte_index(self.cursor_position);
                    self.input.remove(at);
                }
            }
            KeyCode::Left => {
                self.cursor_position = self.cursor_position.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.cursor_position < len {
                    self.cursor_position += 1;
                }
            }
            KeyCode::Home => self.cursor_position = 0,
            KeyCode::End => self.cursor_position = len,
            _ => {}
        }
    }

    fn byte_index(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    /// Accept a username and open the chat session. Invalid names leave us on the form.
    pub fn submit_username(&mut self, name: &str) {
        let name = name.trim();
        if let Err(hint) = validate_username(name) {
            self.username_hint = Some(hint);
            return;
        }

        info!(username = %name, "Joining chat");
        self.username = Some(name.to_string());
        self.username_hint = None;
        self.screen = Screen::Chat;
        self.input_mode = InputMode::Editing;
        self.add_status_message(format!("Joined as {}", name));
        self.connect();
    }

    fn connect(&mut self) {
        self.client = Some(ChatClient::start(self.endpoints.clone(), self.event_tx.clone()));
    }

    fn submit_input(&mut self) {
        let input = self.input.trim().to_string();
        if input.is_empty() {
            return;
        }

        if let Some(command) = input.strip_prefix('/') {
            self.handle_command(command);
        } else {
            self.send_chat_message(&input);
        }
    }

    fn handle_command(&mut self, command: &str) {
        let name = command.split_whitespace().next().unwrap_or("");

        match name.to_lowercase().as_str() {
            "help" | "h" | "commands" => self.show_help(),
            "status" => self.show_status(),
            "clear" => {
                self.chat_log.clear();
                self.scroll_offset = 0;
                self.add_status_message("Chat log cleared".to_string());
            }
            "quit" | "q" | "exit" => self.should_quit = true,
            _ => {
                self.add_status_message(format!(
                    "Unknown command: {}. Type /help for available commands.",
                    name
                ));
            }
        }
    }

    fn send_chat_message(&mut self, content: &str) {
        let Some(username) = self.username.clone() else {
            return;
        };
        let Some(client) = self.client.as_ref() else {
            self.add_status_message("Not connected - message not sent".to_string());
            return;
        };

        let message = Message::outgoing(&username, content);
        match client.send(&message) {
            Ok(()) => {
                debug!(id = %message.id, "Message sent");
                self.chat_log.record_outgoing(&message);
                self.scroll_offset = 0;
            }
            Err(e) => {
                warn!(error = %e, "Message not sent");
                self.add_status_message(format!("Message not sent: {}", e));
            }
        }
    }

    fn show_help(&mut self) {
        let help_text = [
            "LLMChatroom Commands:",
            "/status - Show connection details",
            "/clear - Clear the chat log",
            "/help, /commands - Show this help",
            "/quit, /exit - Exit LLMChatroom",
            "",
            "Keyboard Commands:",
            "Esc=normal mode, i=input mode, q=quit (normal mode), Ctrl-C=quit",
            "Up/Down=scroll messages, Page Up/Down=fast scroll",
            "Home/End=cursor start/end, Enter=send (input mode)",
        ];

        for line in help_text {
            self.add_status_message(line.to_string());
        }
    }

    fn show_status(&mut self) {
        let state = match &self.state {
            AppState::Idle => "idle".to_string(),
            AppState::Connecting(url) => format!("connecting to {}", url),
            AppState::Connected(url) => format!("connected to {}", url),
            AppState::Disconnected => "disconnected".to_string(),
            AppState::Error(e) => format!("error: {}", e),
        };
        self.add_status_message(format!("Connection: {}", state));
        self.add_status_message(format!(
            "Messages: {} ({} awaiting AI reply)",
            self.chat_log.len(),
            self.chat_log.pending_replies()
        ));
    }

    pub fn add_status_message(&mut self, message: String) {
        self.status_messages.push(format!(
            "[{}] {}",
            chrono::Local::now().format("%H:%M:%S"),
            message
        ));

        if self.status_messages.len() > MAX_STATUS_MESSAGES {
            self.status_messages.remove(0);
        }
    }

    pub fn on_tick(&mut self) -> Result<()> {
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_chat_event(event);
        }
        Ok(())
    }

    fn handle_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Connecting(url) => {
                self.add_status_message(format!("Attempting to connect to {}", url));
                self.state = AppState::Connecting(url);
            }
            ChatEvent::Connected(url) => {
                self.add_status_message(format!("Connected to {}", url));
                self.state = AppState::Connected(url);
            }
            ChatEvent::ConnectFailed(reason) => {
                self.add_status_message(reason.clone());
                self.state = AppState::Error(reason);
            }
            ChatEvent::Message(message) => {
                let Some(username) = self.username.as_deref() else {
                    return;
                };
                let id = message.id.clone();
                match self.chat_log.apply_incoming(message, username) {
                    Reconcile::Ignored => debug!(%id, "Skipping broadcast of own message"),
                    Reconcile::Replaced(n) => debug!(%id, replaced = n, "AI reply received"),
                    Reconcile::Appended => {}
                }
            }
            ChatEvent::Closed => {
                self.add_status_message("WebSocket connection closed".to_string());
                self.state = AppState::Disconnected;
            }
        }
    }

    fn scroll_up(&mut self, lines: usize) {
        let max = self.chat_log.len().saturating_sub(1);
        self.scroll_offset = (self.scroll_offset + lines).min(max);
    }

    fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    /// The `height` entries ending `scroll_offset` entries before the newest.
    pub fn get_visible_messages(&self, height: usize) -> &[ChatEntry] {
        let entries = self.chat_log.entries();
        let end = entries.len() - self.scroll_offset.min(entries.len());
        let start = end.saturating_sub(height);
        &entries[start..end]
    }

    pub fn get_visible_status_messages(&self, height: usize) -> &[String] {
        let start = self.status_messages.len().saturating_sub(height);
        &self.status_messages[start..]
    }
}

fn validate_username(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Please enter a username".to_string());
    }
    if name == AI_SENDER || name == LOCAL_SENDER {
        return Err(format!("\"{}\" is reserved, pick another name", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{MessageKind, AI_PLACEHOLDER};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn config_for(primary: &str) -> Config {
        Config {
            primary_url: primary.to_string(),
            fallback_url: None,
            username: None,
        }
    }

    async fn dead_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{}", addr)
    }

    /// Chat screen with no connection task behind it.
    fn offline_chat_app(username: &str) -> App {
        let mut app = App::new(&config_for("ws://127.0.0.1:1"));
        app.username = Some(username.to_string());
        app.screen = Screen::Chat;
        app
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_input(key(KeyCode::Char(c))).unwrap();
        }
    }

    fn broadcast(sender: &str, content: &str, id: &str) -> Message {
        Message {
            sender: sender.to_string(),
            content: content.to_string(),
            id: id.to_string(),
            kind: Some(MessageKind::UserMessage),
            recipient: None,
        }
    }

    #[tokio::test]
    async fn empty_or_reserved_username_stays_on_form() {
        let mut app = App::new(&config_for(&dead_address().await));

        app.handle_input(key(KeyCode::Enter)).unwrap();
        assert_eq!(app.screen, Screen::UsernameEntry);
        assert!(app.username_hint.is_some());

        type_text(&mut app, "AI");
        app.handle_input(key(KeyCode::Enter)).unwrap();
        assert_eq!(app.screen, Screen::UsernameEntry);
        assert_eq!(app.username, None);
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn username_submit_opens_chat_and_connects() {
        let mut app = App::new(&config_for(&dead_address().await));

        type_text(&mut app, "  alice ");
        app.handle_input(key(KeyCode::Enter)).unwrap();

        assert_eq!(app.screen, Screen::Chat);
        assert_eq!(app.username.as_deref(), Some("alice"));
        assert!(app.client.is_some());
    }

    #[tokio::test]
    async fn configured_username_skips_form() {
        let mut config = config_for(&dead_address().await);
        config.username = Some("bob".to_string());

        let app = App::new(&config);
        assert_eq!(app.screen, Screen::Chat);
        assert_eq!(app.username.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn send_while_disconnected_adds_nothing() {
        let mut app = offline_chat_app("alice");

        type_text(&mut app, "hello");
        app.handle_input(key(KeyCode::Enter)).unwrap();

        assert!(app.chat_log.is_empty());
        assert!(app.input.is_empty());
        assert!(app.status_messages.last().unwrap().contains("not sent"));
    }

    #[tokio::test]
    async fn events_update_state_and_log() {
        let mut app = offline_chat_app("alice");
        let tx = app.event_tx.clone();

        tx.send(ChatEvent::Connecting("ws://x/ws/chat".to_string())).unwrap();
        tx.send(ChatEvent::Connected("ws://x/ws/chat".to_string())).unwrap();
        tx.send(ChatEvent::Message(broadcast("bob", "hey", "1"))).unwrap();
        tx.send(ChatEvent::Message(broadcast("alice", "mine", "2"))).unwrap();
        app.on_tick().unwrap();

        assert_eq!(app.state, AppState::Connected("ws://x/ws/chat".to_string()));
        assert_eq!(app.chat_log.len(), 1);
        assert_eq!(app.chat_log.entries()[0].sender, "bob");

        tx.send(ChatEvent::Closed).unwrap();
        app.on_tick().unwrap();
        assert_eq!(app.state, AppState::Disconnected);
    }

    #[tokio::test]
    async fn connect_failure_sets_error_state() {
        let mut app = offline_chat_app("alice");
        app.event_tx
            .send(ChatEvent::ConnectFailed("failed to connect to both a and b".to_string()))
            .unwrap();
        app.on_tick().unwrap();

        assert!(matches!(app.state, AppState::Error(_)));
    }

    #[tokio::test]
    async fn send_then_reply_replaces_placeholder() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(frame)) = ws.next().await {
                if let tokio_tungstenite::tungstenite::Message::Text(text) = frame {
                    let _ = frames_tx.send(text);
                }
            }
        });

        let mut config = config_for(&format!("ws://{}", addr));
        config.username = Some("alice".to_string());
        let mut app = App::new(&config);

        for _ in 0..100 {
            app.on_tick().unwrap();
            if matches!(app.state, AppState::Connected(_)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(matches!(app.state, AppState::Connected(_)));

        type_text(&mut app, "hello");
        app.handle_input(key(KeyCode::Enter)).unwrap();

        let text = tokio::time::timeout(Duration::from_secs(5), frames_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let sent = Message::from_json(&text).unwrap();
        assert_eq!(sent.sender, "alice");
        assert_eq!(sent.content, "hello");
        assert_eq!(app.chat_log.pending_replies(), 1);

        app.event_tx
            .send(ChatEvent::Message(Message {
                sender: "AI".to_string(),
                content: "Hello, alice".to_string(),
                id: sent.id.clone(),
                kind: Some(MessageKind::AiResponse),
                recipient: Some("alice".to_string()),
            }))
            .unwrap();
        app.on_tick().unwrap();

        let entries = app.chat_log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sender, "You");
        assert_eq!(entries[0].content, "hello");
        assert_eq!(entries[1].content, "Hello, alice");
        assert_ne!(entries[1].content, AI_PLACEHOLDER);
    }

    #[tokio::test]
    async fn commands_are_handled_locally() {
        let mut app = offline_chat_app("alice");
        app.event_tx
            .send(ChatEvent::Message(broadcast("bob", "hey", "1")))
            .unwrap();
        app.on_tick().unwrap();

        type_text(&mut app, "/clear");
        app.handle_input(key(KeyCode::Enter)).unwrap();
        assert!(app.chat_log.is_empty());

        type_text(&mut app, "/bogus");
        app.handle_input(key(KeyCode::Enter)).unwrap();
        assert!(app.status_messages.last().unwrap().contains("Unknown command: bogus"));

        type_text(&mut app, "/quit");
        app.handle_input(key(KeyCode::Enter)).unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn input_editing_handles_multibyte_chars() {
        let mut app = offline_chat_app("alice");

        type_text(&mut app, "héllo");
        app.handle_input(key(KeyCode::Left)).unwrap();
        app.handle_input(key(KeyCode::Left)).unwrap();
        app.handle_input(key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.input, "hélo");
        assert_eq!(app.cursor_position, 2);

        app.handle_input(key(KeyCode::Home)).unwrap();
        app.handle_input(key(KeyCode::Delete)).unwrap();
        assert_eq!(app.input, "élo");

        app.handle_input(key(KeyCode::End)).unwrap();
        type_text(&mut app, "!");
        assert_eq!(app.input, "élo!");
    }

    #[test]
    fn status_messages_are_bounded() {
        let mut app = offline_chat_app("alice");
        assert!(app.status_messages.is_empty());
        for i in 0..(MAX_STATUS_MESSAGES + 10) {
            app.add_status_message(format!("line {}", i));
        }

        assert_eq!(app.status_messages.len(), MAX_STATUS_MESSAGES);
        assert!(app.status_messages[0].ends_with("] line 10"));
        assert!(app.status_messages.last().unwrap().ends_with(&format!("line {}", MAX_STATUS_MESSAGES + 9)));
        assert_eq!(app.get_visible_status_messages(3).len(), 3);
    }

    #[tokio::test]
    async fn normal_mode_scrolls_and_quits() {
        let mut app = offline_chat_app("alice");
        for i in 0..5 {
            let id = i.to_string();
            app.chat_log.apply_incoming(broadcast("bob", &id, &id), "alice");
        }

        app.handle_input(key(KeyCode::Esc)).unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);

        app.handle_input(key(KeyCode::PageUp)).unwrap();
        assert_eq!(app.scroll_offset, 4);
        let visible = app.get_visible_messages(2);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].content, "0");

        app.handle_input(key(KeyCode::Down)).unwrap();
        let visible = app.get_visible_messages(2);
        assert_eq!(visible[0].content, "0");
        assert_eq!(visible[1].content, "1");

        app.handle_input(key(KeyCode::Char('q'))).unwrap();
        assert!(app.should_quit);
    }
}
