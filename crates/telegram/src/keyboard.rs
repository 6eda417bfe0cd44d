use serde::Serialize;

use facturo_agent::MenuButton;

/// `reply_markup` payload for `sendMessage`.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineKeyboardButton {
    fn callback(button: MenuButton) -> Self {
        Self {
            text: button.label().to_owned(),
            callback_data: Some(button.callback_data().to_owned()),
            url: None,
        }
    }
}

/// The invoice menu, two buttons per row.
pub fn main_menu() -> InlineKeyboardMarkup {
    let rows = MenuButton::ALL
        .chunks(2)
        .map(|pair| pair.iter().copied().map(InlineKeyboardButton::callback).collect())
        .collect();
    InlineKeyboardMarkup { inline_keyboard: rows }
}

/// Single URL button, used for the calendar link.
pub fn link_keyboard(label: &str, url: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![InlineKeyboardButton {
            text: label.to_owned(),
            callback_data: None,
            url: Some(url.to_owned()),
        }]],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{link_keyboard, main_menu};

    #[test]
    fn main_menu_covers_every_button_in_pairs() {
        let menu = main_menu();
        assert_eq!(menu.inline_keyboard.len(), 4);
        assert_eq!(menu.inline_keyboard.last().map(Vec::len), Some(1));

        let data: Vec<_> = menu
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| button.callback_data.as_deref())
            .collect();
        assert_eq!(data, vec!["doc", "add", "rename", "qty", "price", "del", "eta"]);
    }

    #[test]
    fn link_keyboard_serializes_without_callback_data() {
        let value = serde_json::to_value(link_keyboard("Открыть", "https://example.com"))
            .expect("serialize keyboard");
        assert_eq!(
            value,
            json!({
                "inline_keyboard": [[
                    { "text": "Открыть", "url": "https://example.com" }
                ]]
            })
        );
    }
}
