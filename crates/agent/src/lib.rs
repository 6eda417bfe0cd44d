//! Conversation engine for voice-driven invoice editing.
//!
//! One inbound event (voice note, button press, or text message) runs to
//! completion here: read conversation state → interpret the input for the
//! current pending action → mutate the invoice → recompute → persist →
//! emit ordered outbound effects for the transport to deliver.
//!
//! External services stay behind small traits: [`Transcriber`] turns audio
//! into text, [`StructuredExtractor`] is an optional higher-accuracy parse
//! (it falls back to the deterministic heuristic on failure), and
//! [`DocumentRenderer`] turns a finished invoice into a downloadable file.
//! The engine never decides transport details; it returns [`Outbound`]
//! values whose order the transport must preserve.

pub mod collaborators;
pub mod conversation;
pub mod groq;
pub mod render;

pub use collaborators::{DocumentRenderer, DraftItem, ExtractedDraft, StructuredExtractor, Transcriber};
pub use conversation::{Command, ConversationEngine, MenuButton, Outbound};
pub use groq::GroqClient;
pub use render::TextDocumentRenderer;
