use std::sync::Arc;

use tracing::{debug, error, info, warn};

use facturo_core::flows::input::{parse_line_choice, parse_new_item, parse_user_number};
use facturo_core::{
    apply_delivery_command, calendar, extract_invoice, parse_eta, ApplicationError,
    ConversationState, Invoice, InvoiceId, LineEdit, PendingAction,
};
use facturo_store::{ConversationStore, KvStore, StoreError};

use crate::collaborators::{DocumentRenderer, StructuredExtractor, Transcriber};

const HISTORY_REPLY_LIMIT: usize = 20;
const SEARCH_SCAN_LIMIT: usize = 200;
const SEARCH_REPLY_LIMIT: usize = 30;

/// Buttons of the main invoice menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuButton {
    Document,
    AddItem,
    Rename,
    Quantity,
    Price,
    Delete,
    Eta,
}

impl MenuButton {
    pub const ALL: [MenuButton; 7] = [
        Self::Document,
        Self::AddItem,
        Self::Rename,
        Self::Quantity,
        Self::Price,
        Self::Delete,
        Self::Eta,
    ];

    pub fn callback_data(self) -> &'static str {
        match self {
            Self::Document => "doc",
            Self::AddItem => "add",
            Self::Rename => "rename",
            Self::Quantity => "qty",
            Self::Price => "price",
            Self::Delete => "del",
            Self::Eta => "eta",
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|button| button.callback_data() == data)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Document => "📄 Документ",
            Self::AddItem => "➕ Позиция",
            Self::Rename => "✏️ Имя",
            Self::Quantity => "🔢 Кол-во",
            Self::Price => "💵 Цена",
            Self::Delete => "🗑 Удалить",
            Self::Eta => "📅 Доставка в Calendar",
        }
    }
}

/// Slash commands understood outside the button flows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    History,
    Search(String),
    Open(String),
}

/// Ordered transport effects. The transport must deliver them in sequence;
/// in particular a button acknowledgement always precedes the follow-up
/// prompt.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    /// Acknowledge the button press, optionally with a short notice.
    AckButton { text: Option<String> },
    /// Plain text reply; `with_menu` attaches the main invoice menu.
    Reply { text: String, with_menu: bool },
    /// A file for the user to download.
    Document { filename: String, bytes: Vec<u8> },
    /// Text reply carrying a single URL button.
    LinkButton { text: String, label: String, url: String },
}

impl Outbound {
    fn reply(text: impl Into<String>) -> Self {
        Self::Reply { text: text.into(), with_menu: false }
    }

    fn reply_with_menu(text: impl Into<String>) -> Self {
        Self::Reply { text: text.into(), with_menu: true }
    }
}

/// Per-conversation finite-state machine over injected storage and
/// collaborator services. The host must deliver at most one event per chat
/// at a time; within one call all steps run sequentially and the invoice is
/// persisted exactly once per mutation.
pub struct ConversationEngine<S> {
    store: ConversationStore<S>,
    transcriber: Arc<dyn Transcriber>,
    extractor: Option<Arc<dyn StructuredExtractor>>,
    renderer: Arc<dyn DocumentRenderer>,
    calendar_timezone: String,
}

impl<S> ConversationEngine<S>
where
    S: KvStore,
{
    pub fn new(
        store: ConversationStore<S>,
        transcriber: Arc<dyn Transcriber>,
        extractor: Option<Arc<dyn StructuredExtractor>>,
        renderer: Arc<dyn DocumentRenderer>,
        calendar_timezone: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transcriber,
            extractor,
            renderer,
            calendar_timezone: calendar_timezone.into(),
        }
    }

    /// Voice note → transcript → new invoice.
    pub async fn handle_voice(
        &self,
        chat_id: i64,
        audio: Vec<u8>,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let transcript = match self.transcriber.transcribe(&audio).await {
            Ok(text) => text,
            Err(cause) => {
                error!(chat_id, error = %cause, "voice transcription failed");
                return Ok(vec![Outbound::reply("Не смог распознать голосовое. Попробуй позже.")]);
            }
        };
        if transcript.trim().is_empty() {
            return Ok(vec![Outbound::reply("Не расслышал голосовое. Попробуй ещё раз.")]);
        }
        self.handle_transcript(chat_id, &transcript).await
    }

    /// Builds an invoice from a transcript, persists it, and makes it the
    /// active invoice for the chat.
    pub async fn handle_transcript(
        &self,
        chat_id: i64,
        transcript: &str,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let invoice = self.extract(transcript).await;
        persisted(self.store.insert_invoice(chat_id, &invoice).await)?;

        let state = ConversationState {
            active_invoice_id: Some(invoice.id.clone()),
            pending_action: None,
        };
        persisted(self.store.save_state(chat_id, &state).await)?;

        info!(chat_id, invoice_id = %invoice.id, items = invoice.items.len(), "invoice created from transcript");
        Ok(vec![Outbound::reply_with_menu(invoice.to_string())])
    }

    async fn extract(&self, transcript: &str) -> Invoice {
        if let Some(extractor) = &self.extractor {
            match extractor.extract(transcript).await {
                Ok(Some(draft)) => return draft.into_invoice(),
                Ok(None) => {
                    debug!("structured extractor returned nothing usable; using heuristic")
                }
                Err(cause) => {
                    warn!(error = %cause, "structured extraction failed; falling back to heuristic")
                }
            }
        }
        extract_invoice(transcript)
    }

    /// Main-menu button press. For edit buttons the contract is: acknowledge
    /// the press, persist the new pending action, then prompt for input —
    /// in that order.
    pub async fn handle_button(
        &self,
        chat_id: i64,
        button: MenuButton,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let pending = match button {
            MenuButton::Document => return self.export_document(chat_id).await,
            MenuButton::AddItem => PendingAction::AddItem,
            MenuButton::Rename => PendingAction::ChooseLine { edit: LineEdit::Rename },
            MenuButton::Quantity => PendingAction::ChooseLine { edit: LineEdit::Quantity },
            MenuButton::Price => PendingAction::ChooseLine { edit: LineEdit::Price },
            MenuButton::Delete => PendingAction::ChooseLine { edit: LineEdit::Delete },
            MenuButton::Eta => PendingAction::AwaitEta,
        };

        let mut outbound = vec![Outbound::AckButton { text: None }];
        let mut state = persisted(self.store.load_state(chat_id).await)?;
        state.pending_action = Some(pending);
        persisted(self.store.save_state(chat_id, &state).await)?;
        outbound.push(Outbound::reply(prompt_for(pending)));
        Ok(outbound)
    }

    async fn export_document(&self, chat_id: i64) -> Result<Vec<Outbound>, ApplicationError> {
        let state = persisted(self.store.load_state(chat_id).await)?;
        let Some(active_id) = state.active_invoice_id else {
            return Ok(vec![Outbound::AckButton { text: Some("Нет активной накладной".to_owned()) }]);
        };
        let Some(invoice) = persisted(self.store.load_invoice(chat_id, &active_id).await)? else {
            return Ok(vec![Outbound::AckButton { text: Some("Накладная не найдена".to_owned()) }]);
        };

        match self.renderer.render(&invoice).await {
            Ok(bytes) => Ok(vec![
                Outbound::AckButton { text: None },
                Outbound::Document { filename: self.renderer.filename(&invoice), bytes },
            ]),
            Err(cause) => {
                error!(chat_id, invoice_id = %invoice.id, error = %cause, "document rendering failed");
                Ok(vec![
                    Outbound::AckButton { text: None },
                    Outbound::reply("Не получилось сформировать документ. Попробуй позже."),
                ])
            }
        }
    }

    pub async fn handle_command(
        &self,
        chat_id: i64,
        command: Command,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        match command {
            Command::Start => Ok(vec![Outbound::reply(
                "Кидай голосовое с позициями.\nКоманды:\n/history\n/search <текст>\n/open <id>",
            )]),
            Command::History => {
                let invoices =
                    persisted(self.store.list_invoices(chat_id, HISTORY_REPLY_LIMIT).await)?;
                if invoices.is_empty() {
                    return Ok(vec![Outbound::reply("История пустая.")]);
                }
                let listing = invoices
                    .iter()
                    .map(Invoice::summary_line)
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(vec![Outbound::reply(listing)])
            }
            Command::Search(query) => self.search(chat_id, query.trim()).await,
            Command::Open(id) => self.open(chat_id, id.trim()).await,
        }
    }

    async fn search(&self, chat_id: i64, query: &str) -> Result<Vec<Outbound>, ApplicationError> {
        if query.is_empty() {
            return Ok(vec![Outbound::reply("Пример: /search антигель")]);
        }
        let needle = query.to_lowercase();
        let invoices = persisted(self.store.list_invoices(chat_id, SEARCH_SCAN_LIMIT).await)?;
        let hits: Vec<&Invoice> = invoices
            .iter()
            .filter(|invoice| {
                invoice.items.iter().any(|item| item.name.to_lowercase().contains(&needle))
            })
            .take(SEARCH_REPLY_LIMIT)
            .collect();
        if hits.is_empty() {
            return Ok(vec![Outbound::reply("Ничего не найдено.")]);
        }
        let listing =
            hits.iter().map(|invoice| invoice.summary_line()).collect::<Vec<_>>().join("\n");
        Ok(vec![Outbound::reply(listing)])
    }

    async fn open(&self, chat_id: i64, id: &str) -> Result<Vec<Outbound>, ApplicationError> {
        if id.is_empty() {
            return Ok(vec![Outbound::reply("Пример: /open ABC123")]);
        }
        let invoice_id = InvoiceId(id.to_owned());
        let Some(invoice) = persisted(self.store.load_invoice(chat_id, &invoice_id).await)? else {
            return Ok(vec![Outbound::reply("Не нашёл такую накладную.")]);
        };

        let mut state = persisted(self.store.load_state(chat_id).await)?;
        state.active_invoice_id = Some(invoice_id);
        state.pending_action = None;
        persisted(self.store.save_state(chat_id, &state).await)?;
        Ok(vec![Outbound::reply_with_menu(invoice.to_string())])
    }

    /// Free-text message. Interpretation depends on the pending action; with
    /// no active invoice the message is ignored entirely.
    pub async fn handle_text(
        &self,
        chat_id: i64,
        text: &str,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let mut state = persisted(self.store.load_state(chat_id).await)?;
        let Some(active_id) = state.active_invoice_id.clone() else {
            debug!(chat_id, "text ignored: no active invoice");
            return Ok(Vec::new());
        };
        let Some(mut invoice) = persisted(self.store.load_invoice(chat_id, &active_id).await)?
        else {
            debug!(chat_id, invoice_id = %active_id, "text ignored: active invoice missing");
            return Ok(Vec::new());
        };
        let text = text.trim();

        match state.pending_action {
            None => self.handle_idle_text(chat_id, &mut invoice, text).await,
            Some(PendingAction::AddItem) => match parse_new_item(text) {
                Ok(item) => {
                    invoice.items.push(item);
                    self.commit_edit(chat_id, &mut state, &mut invoice).await
                }
                Err(_) => Ok(vec![Outbound::reply("Формат: Название, кол-во, цена")]),
            },
            Some(PendingAction::ChooseLine { edit }) => {
                match parse_line_choice(text, invoice.items.len()) {
                    Err(_) => Ok(vec![Outbound::reply("Неверный номер позиции.")]),
                    Ok(index) => self.line_chosen(chat_id, &mut state, &mut invoice, edit, index).await,
                }
            }
            Some(PendingAction::RenameLine { index }) => {
                let Some(item) = invoice.items.get_mut(index) else {
                    return self.reset_stale_choice(chat_id, &mut state).await;
                };
                item.name = text.to_owned();
                self.commit_edit(chat_id, &mut state, &mut invoice).await
            }
            Some(PendingAction::SetQuantity { index }) => match parse_user_number(text) {
                Err(_) => Ok(vec![Outbound::reply("Не понял число.")]),
                Ok(quantity) => {
                    let Some(item) = invoice.items.get_mut(index) else {
                        return self.reset_stale_choice(chat_id, &mut state).await;
                    };
                    item.quantity = quantity;
                    self.commit_edit(chat_id, &mut state, &mut invoice).await
                }
            },
            Some(PendingAction::SetPrice { index }) => match parse_user_number(text) {
                Err(_) => Ok(vec![Outbound::reply("Не понял число.")]),
                Ok(price) => {
                    let Some(item) = invoice.items.get_mut(index) else {
                        return self.reset_stale_choice(chat_id, &mut state).await;
                    };
                    item.unit_price = price;
                    self.commit_edit(chat_id, &mut state, &mut invoice).await
                }
            },
            Some(PendingAction::AwaitEta) => {
                self.eta_received(chat_id, &mut state, &mut invoice, text).await
            }
        }
    }

    async fn handle_idle_text(
        &self,
        chat_id: i64,
        invoice: &mut Invoice,
        text: &str,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        if !apply_delivery_command(invoice, text) {
            // Unrelated chatter stays unanswered on purpose.
            return Ok(Vec::new());
        }
        persisted(self.store.update_invoice(chat_id, invoice).await)?;
        Ok(vec![Outbound::reply_with_menu(format!("Ок, обновил доставку.\n\n{invoice}"))])
    }

    async fn line_chosen(
        &self,
        chat_id: i64,
        state: &mut ConversationState,
        invoice: &mut Invoice,
        edit: LineEdit,
        index: usize,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let next = match edit {
            LineEdit::Delete => {
                invoice.items.remove(index);
                return self.commit_edit(chat_id, state, invoice).await;
            }
            LineEdit::Rename => PendingAction::RenameLine { index },
            LineEdit::Quantity => PendingAction::SetQuantity { index },
            LineEdit::Price => PendingAction::SetPrice { index },
        };
        state.pending_action = Some(next);
        persisted(self.store.save_state(chat_id, state).await)?;
        Ok(vec![Outbound::reply(prompt_for(next))])
    }

    async fn eta_received(
        &self,
        chat_id: i64,
        state: &mut ConversationState,
        invoice: &mut Invoice,
        text: &str,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let Some(moment) = parse_eta(text) else {
            return Ok(vec![Outbound::reply(
                "Не понял формат. Пример: 2026-01-20 15:30 или 20.01 15:30",
            )]);
        };

        invoice.eta_text = Some(text.to_owned());
        invoice.recompute();
        persisted(self.store.update_invoice(chat_id, invoice).await)?;
        state.pending_action = None;
        persisted(self.store.save_state(chat_id, state).await)?;

        let link = calendar::event_link(
            &format!("Доставка накладной {}", invoice.id),
            &invoice.item_details(),
            moment,
            &self.calendar_timezone,
        );
        Ok(vec![
            Outbound::LinkButton {
                text: "Готово. Нажми кнопку — откроется Google Calendar с заполненным событием."
                    .to_owned(),
                label: "📅 Добавить в Google Calendar".to_owned(),
                url: link,
            },
            Outbound::reply_with_menu(invoice.to_string()),
        ])
    }

    /// Recompute → persist invoice → clear pending state → echo the result.
    async fn commit_edit(
        &self,
        chat_id: i64,
        state: &mut ConversationState,
        invoice: &mut Invoice,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        invoice.recompute();
        persisted(self.store.update_invoice(chat_id, invoice).await)?;
        state.pending_action = None;
        persisted(self.store.save_state(chat_id, state).await)?;
        Ok(vec![Outbound::reply_with_menu(invoice.to_string())])
    }

    /// A stored line index can go stale only if the invoice shrank since the
    /// choose step; drop the flow back to idle instead of guessing.
    async fn reset_stale_choice(
        &self,
        chat_id: i64,
        state: &mut ConversationState,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        state.pending_action = None;
        persisted(self.store.save_state(chat_id, state).await)?;
        Ok(vec![Outbound::reply("Неверный номер позиции.")])
    }
}

fn prompt_for(pending: PendingAction) -> &'static str {
    match pending {
        PendingAction::AddItem => {
            "Введи новую позицию в формате:\nНазвание, кол-во, цена\nПример: Антигель Mannol 1л, 50, 2600"
        }
        PendingAction::ChooseLine { edit: LineEdit::Rename } => {
            "Номер позиции для переименования? (например: 1)"
        }
        PendingAction::ChooseLine { edit: LineEdit::Quantity } => {
            "Номер позиции для изменения кол-ва? (например: 1)"
        }
        PendingAction::ChooseLine { edit: LineEdit::Price } => {
            "Номер позиции для изменения цены? (например: 1)"
        }
        PendingAction::ChooseLine { edit: LineEdit::Delete } => {
            "Номер позиции для удаления? (например: 1)"
        }
        PendingAction::RenameLine { .. } => "Введи новое название:",
        PendingAction::SetQuantity { .. } => "Введи новое кол-во (число):",
        PendingAction::SetPrice { .. } => "Введи новую цену (число):",
        PendingAction::AwaitEta => {
            "Когда ожидается доставка?\nФормат: 2026-01-20 15:30 или 20.01 15:30"
        }
    }
}

fn persisted<T>(result: Result<T, StoreError>) -> Result<T, ApplicationError> {
    result.map_err(|error| ApplicationError::Persistence(error.to_string()))
}
