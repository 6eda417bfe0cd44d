use serde::Deserialize;

use facturo_agent::{Command, MenuButton};

/// One entry of a `getUpdates` batch. Only the fields the bot acts on are
/// modelled; everything else is dropped during deserialization.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<Voice>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Voice {
    pub file_id: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

/// What the update loop does with one update.
#[derive(Clone, Debug, PartialEq)]
pub enum TelegramEvent {
    Voice { chat_id: i64, file_id: String },
    Command { chat_id: i64, command: Command },
    Text { chat_id: i64, text: String },
    Button { chat_id: i64, callback_id: String, button: MenuButton },
    Unsupported,
}

impl TelegramEvent {
    pub fn classify(update: &Update) -> Self {
        if let Some(query) = &update.callback_query {
            let Some(chat_id) = query.message.as_ref().map(|message| message.chat.id) else {
                return Self::Unsupported;
            };
            let Some(button) =
                query.data.as_deref().and_then(MenuButton::from_callback_data)
            else {
                return Self::Unsupported;
            };
            return Self::Button { chat_id, callback_id: query.id.clone(), button };
        }

        let Some(message) = &update.message else {
            return Self::Unsupported;
        };
        let chat_id = message.chat.id;

        if let Some(voice) = &message.voice {
            return Self::Voice { chat_id, file_id: voice.file_id.clone() };
        }

        let Some(text) = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::Unsupported;
        };
        if let Some(stripped) = text.strip_prefix('/') {
            return match parse_command(stripped) {
                Some(command) => Self::Command { chat_id, command },
                None => Self::Unsupported,
            };
        }
        Self::Text { chat_id, text: text.to_owned() }
    }
}

/// Parses the text after the leading slash. A `@botname` suffix on the
/// command word is tolerated; unknown commands are dropped.
fn parse_command(text: &str) -> Option<Command> {
    let mut parts = text.splitn(2, char::is_whitespace);
    let word = parts.next()?;
    let word = word.split('@').next().unwrap_or(word);
    let rest = parts.next().unwrap_or("").trim();

    match word {
        "start" => Some(Command::Start),
        "history" => Some(Command::History),
        "search" => Some(Command::Search(rest.to_owned())),
        "open" => Some(Command::Open(rest.to_owned())),
        _ => None,
    }
}
