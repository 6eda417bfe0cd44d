//! End-to-end conversation scenarios over the in-memory store.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use facturo_agent::{
    Command, ConversationEngine, DraftItem, ExtractedDraft, MenuButton, Outbound,
    StructuredExtractor, TextDocumentRenderer, Transcriber,
};
use facturo_core::{ConversationState, LineEdit, PendingAction};
use facturo_store::{ConversationStore, InMemoryStore};

const TRANSCRIPT: &str = "Антигель 50 штук по 2600, доставка 5000";
const CHAT: i64 = 100500;

struct FixedTranscriber(&'static str);

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        Ok(self.0.to_owned())
    }
}

struct FailingTranscriber;

#[async_trait]
impl Transcriber for FailingTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        Err(anyhow!("whisper endpoint unreachable"))
    }
}

struct FixedExtractor(ExtractedDraft);

#[async_trait]
impl StructuredExtractor for FixedExtractor {
    async fn extract(&self, _text: &str) -> Result<Option<ExtractedDraft>> {
        Ok(Some(self.0.clone()))
    }
}

struct FailingExtractor;

#[async_trait]
impl StructuredExtractor for FailingExtractor {
    async fn extract(&self, _text: &str) -> Result<Option<ExtractedDraft>> {
        Err(anyhow!("llm endpoint unreachable"))
    }
}

fn engine_with(
    extractor: Option<Arc<dyn StructuredExtractor>>,
    transcriber: Arc<dyn Transcriber>,
) -> (ConversationEngine<Arc<InMemoryStore>>, ConversationStore<Arc<InMemoryStore>>) {
    let backend = Arc::new(InMemoryStore::default());
    let engine = ConversationEngine::new(
        ConversationStore::new(Arc::clone(&backend), 500),
        transcriber,
        extractor,
        Arc::new(TextDocumentRenderer),
        "Asia/Almaty",
    );
    (engine, ConversationStore::new(backend, 500))
}

fn engine() -> (ConversationEngine<Arc<InMemoryStore>>, ConversationStore<Arc<InMemoryStore>>) {
    engine_with(None, Arc::new(FixedTranscriber(TRANSCRIPT)))
}

fn reply_text(outbound: &Outbound) -> &str {
    match outbound {
        Outbound::Reply { text, .. } => text,
        other => panic!("expected a text reply, got {other:?}"),
    }
}

async fn pending(store: &ConversationStore<Arc<InMemoryStore>>) -> Option<PendingAction> {
    store.load_state(CHAT).await.expect("load state").pending_action
}

#[tokio::test]
async fn transcript_creates_active_invoice() {
    let (engine, store) = engine();

    let out = engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");
    assert_eq!(out.len(), 1);
    let text = reply_text(&out[0]);
    assert!(text.contains("Антигель — 50 × 2600 = 130000"));
    assert!(text.contains("Итого: 135000 тг"));

    let state = store.load_state(CHAT).await.expect("state");
    let active = state.active_invoice_id.expect("active invoice set");
    let invoice = store.load_invoice(CHAT, &active).await.expect("load").expect("persisted");
    assert_eq!(invoice.items.len(), 2);
}

#[tokio::test]
async fn quantity_edit_scenario_walks_choose_then_value() {
    let (engine, store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");

    // Button: ack comes strictly before the prompt.
    let out = engine.handle_button(CHAT, MenuButton::Quantity).await.expect("button");
    assert!(matches!(out[0], Outbound::AckButton { text: None }));
    assert_eq!(reply_text(&out[1]), "Номер позиции для изменения кол-ва? (например: 1)");
    assert_eq!(
        pending(&store).await,
        Some(PendingAction::ChooseLine { edit: LineEdit::Quantity })
    );

    let out = engine.handle_text(CHAT, "2").await.expect("choose");
    assert_eq!(reply_text(&out[0]), "Введи новое кол-во (число):");
    assert_eq!(pending(&store).await, Some(PendingAction::SetQuantity { index: 1 }));

    let out = engine.handle_text(CHAT, "30").await.expect("value");
    let text = reply_text(&out[0]);
    assert!(text.contains("Доставка — 30 × 5000 = 150000"));
    assert!(text.contains("Итого: 280000 тг"));
    assert_eq!(pending(&store).await, None);
}

#[tokio::test]
async fn out_of_range_choice_reprompts_and_keeps_state() {
    let (engine, store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");
    engine.handle_button(CHAT, MenuButton::Rename).await.expect("button");

    let out = engine.handle_text(CHAT, "99").await.expect("choose");
    assert_eq!(reply_text(&out[0]), "Неверный номер позиции.");
    assert_eq!(
        pending(&store).await,
        Some(PendingAction::ChooseLine { edit: LineEdit::Rename })
    );
}

#[tokio::test]
async fn unparseable_number_reprompts_in_value_state() {
    let (engine, store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");
    engine.handle_button(CHAT, MenuButton::Price).await.expect("button");
    engine.handle_text(CHAT, "1").await.expect("choose");

    let out = engine.handle_text(CHAT, "дорого").await.expect("value");
    assert_eq!(reply_text(&out[0]), "Не понял число.");
    assert_eq!(pending(&store).await, Some(PendingAction::SetPrice { index: 0 }));
}

#[tokio::test]
async fn add_item_flow_appends_and_recomputes() {
    let (engine, store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");
    engine.handle_button(CHAT, MenuButton::AddItem).await.expect("button");

    let out = engine.handle_text(CHAT, "нет запятых").await.expect("malformed");
    assert_eq!(reply_text(&out[0]), "Формат: Название, кол-во, цена");
    assert_eq!(pending(&store).await, Some(PendingAction::AddItem));

    let out = engine.handle_text(CHAT, "Фильтр, 2, 700").await.expect("valid");
    let text = reply_text(&out[0]);
    assert!(text.contains("3) Фильтр — 2 × 700 = 1400"));
    assert!(text.contains("Итого: 136400 тг"));
    assert_eq!(pending(&store).await, None);
}

#[tokio::test]
async fn delete_flow_applies_at_choose_step() {
    let (engine, store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");
    engine.handle_button(CHAT, MenuButton::Delete).await.expect("button");

    let out = engine.handle_text(CHAT, "1").await.expect("choose");
    let text = reply_text(&out[0]);
    assert!(!text.contains("Антигель"));
    assert!(text.contains("Итого: 5000 тг"));
    assert_eq!(pending(&store).await, None);
}

#[tokio::test]
async fn rename_flow_accepts_any_text() {
    let (engine, _store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");
    engine.handle_button(CHAT, MenuButton::Rename).await.expect("button");
    engine.handle_text(CHAT, "1").await.expect("choose");

    let out = engine.handle_text(CHAT, "Антигель Mannol 1л").await.expect("rename");
    assert!(reply_text(&out[0]).contains("1) Антигель Mannol 1л — 50 × 2600 = 130000"));
}

#[tokio::test]
async fn eta_flow_reprompts_then_emits_calendar_link() {
    let (engine, store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");
    engine.handle_button(CHAT, MenuButton::Eta).await.expect("button");

    let out = engine.handle_text(CHAT, "завтра к обеду").await.expect("bad eta");
    assert_eq!(reply_text(&out[0]), "Не понял формат. Пример: 2026-01-20 15:30 или 20.01 15:30");
    assert_eq!(pending(&store).await, Some(PendingAction::AwaitEta));

    let out = engine.handle_text(CHAT, "20.01.2026 15:30").await.expect("eta");
    let Outbound::LinkButton { url, .. } = &out[0] else {
        panic!("expected calendar link, got {:?}", out[0]);
    };
    assert!(url.contains("20260120T153000"));
    assert!(reply_text(&out[1]).contains("Доставка (ETA): 20.01.2026 15:30"));
    assert_eq!(pending(&store).await, None);

    let state = store.load_state(CHAT).await.expect("state");
    let invoice = store
        .load_invoice(CHAT, &state.active_invoice_id.expect("active"))
        .await
        .expect("load")
        .expect("persisted");
    assert_eq!(invoice.eta_text.as_deref(), Some("20.01.2026 15:30"));
}

#[tokio::test]
async fn idle_delivery_command_updates_invoice() {
    let (engine, _store) = engine();
    engine.handle_transcript(CHAT, "Антигель 50 штук по 2600").await.expect("transcript");

    let out = engine.handle_text(CHAT, "добавь доставку 5000").await.expect("delivery");
    let text = reply_text(&out[0]);
    assert!(text.starts_with("Ок, обновил доставку."));
    assert!(text.contains("Итого: 135000 тг"));
}

#[tokio::test]
async fn idle_chatter_is_silently_ignored() {
    let (engine, _store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");

    let out = engine.handle_text(CHAT, "как дела?").await.expect("chatter");
    assert!(out.is_empty());
}

#[tokio::test]
async fn text_without_active_invoice_is_ignored() {
    let (engine, store) = engine();

    let out = engine.handle_text(CHAT, "добавь доставку 5000").await.expect("text");
    assert!(out.is_empty());
    assert_eq!(store.load_state(CHAT).await.expect("state"), ConversationState::default());
}

#[tokio::test]
async fn document_button_without_invoice_answers_in_the_ack() {
    let (engine, _store) = engine();

    let out = engine.handle_button(CHAT, MenuButton::Document).await.expect("button");
    assert_eq!(out.len(), 1);
    assert!(matches!(&out[0], Outbound::AckButton { text: Some(text) }
        if text == "Нет активной накладной"));
}

#[tokio::test]
async fn document_button_renders_active_invoice() {
    let (engine, _store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");

    let out = engine.handle_button(CHAT, MenuButton::Document).await.expect("button");
    assert!(matches!(out[0], Outbound::AckButton { text: None }));
    let Outbound::Document { filename, bytes } = &out[1] else {
        panic!("expected a document, got {:?}", out[1]);
    };
    assert!(filename.starts_with("nakladnaya_"));
    assert!(String::from_utf8_lossy(bytes).contains("Итого: 135000 тг"));
}

#[tokio::test]
async fn transcription_failure_is_reported_without_state_change() {
    let (engine, store) = engine_with(None, Arc::new(FailingTranscriber));

    let out = engine.handle_voice(CHAT, vec![0, 1, 2]).await.expect("voice");
    assert_eq!(reply_text(&out[0]), "Не смог распознать голосовое. Попробуй позже.");
    assert_eq!(store.load_state(CHAT).await.expect("state"), ConversationState::default());
}

#[tokio::test]
async fn structured_extraction_supersedes_the_heuristic() {
    let draft = ExtractedDraft {
        supplier: "ТОО Ромашка".to_owned(),
        date: None,
        eta_text: None,
        items: vec![DraftItem { name: "Антигель".to_owned(), qty: 50.0, unit_price: 2600.0 }],
    };
    let (engine, store) =
        engine_with(Some(Arc::new(FixedExtractor(draft))), Arc::new(FixedTranscriber(TRANSCRIPT)));

    engine.handle_voice(CHAT, vec![0]).await.expect("voice");
    let state = store.load_state(CHAT).await.expect("state");
    let invoice = store
        .load_invoice(CHAT, &state.active_invoice_id.expect("active"))
        .await
        .expect("load")
        .expect("persisted");
    assert_eq!(invoice.supplier, "ТОО Ромашка");
    assert_eq!(invoice.items.len(), 1);
}

#[tokio::test]
async fn extraction_failure_degrades_to_the_heuristic() {
    let (engine, store) =
        engine_with(Some(Arc::new(FailingExtractor)), Arc::new(FixedTranscriber(TRANSCRIPT)));

    engine.handle_voice(CHAT, vec![0]).await.expect("voice");
    let state = store.load_state(CHAT).await.expect("state");
    let invoice = store
        .load_invoice(CHAT, &state.active_invoice_id.expect("active"))
        .await
        .expect("load")
        .expect("persisted");
    assert_eq!(invoice.items.len(), 2);
    assert!(invoice.supplier.is_empty());
}

#[tokio::test]
async fn open_command_switches_the_active_invoice() {
    let (engine, store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("first");
    let first_id = store.load_state(CHAT).await.expect("state").active_invoice_id.expect("active");
    engine.handle_transcript(CHAT, "Фильтр 2 по 700").await.expect("second");

    let out = engine.handle_command(CHAT, Command::Open(first_id.0.clone())).await.expect("open");
    assert!(reply_text(&out[0]).contains("Антигель"));
    assert_eq!(
        store.load_state(CHAT).await.expect("state").active_invoice_id,
        Some(first_id)
    );
}

#[tokio::test]
async fn open_command_reports_unknown_ids() {
    let (engine, store) = engine();
    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");
    let active = store.load_state(CHAT).await.expect("state").active_invoice_id;

    let out = engine.handle_command(CHAT, Command::Open("NOPE".to_owned())).await.expect("open");
    assert_eq!(reply_text(&out[0]), "Не нашёл такую накладную.");
    assert_eq!(store.load_state(CHAT).await.expect("state").active_invoice_id, active);
}

#[tokio::test]
async fn history_and_search_commands_list_invoices() {
    let (engine, _store) = engine();

    let out = engine.handle_command(CHAT, Command::History).await.expect("history");
    assert_eq!(reply_text(&out[0]), "История пустая.");

    engine.handle_transcript(CHAT, TRANSCRIPT).await.expect("transcript");

    let out = engine.handle_command(CHAT, Command::History).await.expect("history");
    assert!(reply_text(&out[0]).contains("135000 тг"));

    let out = engine
        .handle_command(CHAT, Command::Search("антигель".to_owned()))
        .await
        .expect("search");
    assert!(reply_text(&out[0]).contains("135000 тг"));

    let out =
        engine.handle_command(CHAT, Command::Search("шуруп".to_owned())).await.expect("search");
    assert_eq!(reply_text(&out[0]), "Ничего не найдено.");
}
