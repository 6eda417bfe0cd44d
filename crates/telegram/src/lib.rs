//! Telegram long-polling transport.
//!
//! The bot reads updates via `getUpdates`, classifies each one into a
//! [`TelegramEvent`], hands it to the conversation engine, and delivers the
//! engine's ordered outbound effects back through the Bot API. The HTTP
//! surface sits behind the [`BotApi`] trait so the update loop can be tested
//! against a scripted fake.

pub mod api;
pub mod keyboard;
pub mod runner;
pub mod update;

pub use api::{BotApi, TelegramApi, TransportError};
pub use keyboard::{link_keyboard, main_menu, InlineKeyboardButton, InlineKeyboardMarkup};
pub use runner::{LongPollRunner, RetryPolicy};
pub use update::{CallbackQuery, Chat, Message, TelegramEvent, Update, Voice};
