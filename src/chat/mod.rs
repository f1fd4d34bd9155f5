pub use message::{Message, MessageKind};

mod message;

pub const LOCAL_SENDER: &str = "You";
pub const AI_SENDER: &str = "AI";
pub const AI_PLACEHOLDER: &str = "Responding to your message...";

const MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub sender: String,
    pub content: String,
    pub id: String,
    pub received_at: chrono::DateTime<chrono::Local>,
}

impl ChatEntry {
    fn new(sender: &str, content: &str, id: &str) -> Self {
        Self {
            sender: sender.to_string(),
            content: content.to_string(),
            id: id.to_string(),
            received_at: chrono::Local::now(),
        }
    }

    pub fn is_own(&self) -> bool {
        self.sender == LOCAL_SENDER
    }

    pub fn is_ai(&self) -> bool {
        self.sender == AI_SENDER
    }

    pub fn is_pending(&self) -> bool {
        self.is_ai() && self.content == AI_PLACEHOLDER
    }
}

/// Outcome of feeding a server frame into the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Broadcast of our own message; the local entry already shows it.
    Ignored,
    /// AI reply written over this many placeholders.
    Replaced(usize),
    Appended,
}

/// Messages shown in the chat pane, in arrival order.
#[derive(Debug, Default)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo a sent message locally and add the AI placeholder for its reply.
    pub fn record_outgoing(&mut self, message: &Message) {
        self.push(ChatEntry::new(LOCAL_SENDER, &message.content, &message.id));
        self.push(ChatEntry::new(AI_SENDER, AI_PLACEHOLDER, &message.id));
    }

    pub fn apply_incoming(&mut self, message: Message, username: &str) -> Reconcile {
        if message.sender == username {
            return Reconcile::Ignored;
        }

        if message.is_ai_response_for(username) {
            let mut replaced = 0;
            for entry in self
                .entries
                .iter_mut()
                .filter(|e| e.sender == message.sender && e.id == message.id)
            {
                entry.content = message.content.clone();
                replaced += 1;
            }
            if replaced > 0 {
                return Reconcile::Replaced(replaced);
            }
            // Placeholder already drained or cleared; show the reply anyway.
        }

        self.push(ChatEntry::new(&message.sender, &message.content, &message.id));
        Reconcile::Appended
    }

    fn push(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
        if self.entries.len() > MAX_ENTRIES {
            let remove_count = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(0..remove_count);
        }
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_replies(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
