//! Transport-neutral inbound events and outbound replies.
//!
//! The engine never sees teloxide types. Telegram updates are converted
//! into [`Inbound`] at the edge and [`Reply`] keyboards are rendered back
//! into reply markup by the transport.

/// What the user actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A plain text message (including button presses on reply keyboards).
    Text(String),
    /// A shared contact card.
    Contact { phone: String },
    /// Stickers, photos and anything else the assistant does not read.
    Other,
}

/// An inbound event from one user in a private chat.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub user_id: i64,
    /// Chat to answer in. Equals `user_id` for private chats.
    pub chat_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    /// Platform locale hint, e.g. `uz-UZ`.
    pub locale: Option<String>,
    pub payload: Payload,
}

impl Inbound {
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }
}

/// A keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    /// Sends its label as text when pressed.
    Text(String),
    /// Asks the client to share the user's phone contact.
    Contact(String),
}

impl Button {
    pub fn label(&self) -> &str {
        match self {
            Button::Text(l) | Button::Contact(l) => l,
        }
    }
}

/// Reply keyboard attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    Rows(Vec<Vec<Button>>),
    Remove,
}

impl Keyboard {
    pub fn rows(rows: Vec<Vec<Button>>) -> Self {
        Keyboard::Rows(rows)
    }

    /// All button labels, row by row.
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Keyboard::Rows(rows) => rows.iter().flatten().map(Button::label).collect(),
            Keyboard::Remove => Vec::new(),
        }
    }

    pub fn has_contact_button(&self) -> bool {
        match self {
            Keyboard::Rows(rows) => rows.iter().flatten().any(|b| matches!(b, Button::Contact(_))),
            Keyboard::Remove => false,
        }
    }
}

/// An outgoing HTML message with an optional keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Escape user-supplied text for Telegram HTML parse mode.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}
