use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use facturo_agent::{ConversationEngine, Outbound};
use facturo_store::KvStore;

use crate::api::BotApi;
use crate::keyboard::{link_keyboard, main_menu};
use crate::update::{TelegramEvent, Update};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// `getUpdates` loop: classify each update, run it through the engine, and
/// deliver the outbound effects in order. Consecutive poll failures back
/// off exponentially; a successful poll resets the counter. When retries
/// are exhausted the loop returns instead of crashing the process.
pub struct LongPollRunner<S> {
    api: Arc<dyn BotApi>,
    engine: ConversationEngine<S>,
    retry_policy: RetryPolicy,
}

impl<S> LongPollRunner<S>
where
    S: KvStore,
{
    pub fn new(
        api: Arc<dyn BotApi>,
        engine: ConversationEngine<S>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self { api, engine, retry_policy }
    }

    pub async fn run(&self) -> Result<()> {
        let mut offset = 0_i64;
        let mut failures = 0_u32;

        info!("starting update long-poll loop");
        loop {
            let updates = match self.api.next_updates(offset).await {
                Ok(updates) => {
                    failures = 0;
                    updates
                }
                Err(transport_error) => {
                    warn!(
                        attempt = failures,
                        max_retries = self.retry_policy.max_retries,
                        error = %transport_error,
                        "update poll failed"
                    );
                    if failures >= self.retry_policy.max_retries {
                        warn!(
                            max_retries = self.retry_policy.max_retries,
                            "update poll retries exhausted; stopping loop"
                        );
                        return Ok(());
                    }
                    let delay = self.retry_policy.backoff(failures);
                    failures += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                self.process(&update).await;
            }
        }
    }

    async fn process(&self, update: &Update) {
        let event = TelegramEvent::classify(update);
        debug!(update_id = update.update_id, event = event_name(&event), "processing update");

        let (chat_id, callback_id, outcome) = match event {
            TelegramEvent::Voice { chat_id, file_id } => {
                let audio = match self.api.download_file(&file_id).await {
                    Ok(audio) => audio,
                    Err(transport_error) => {
                        warn!(chat_id, error = %transport_error, "voice download failed");
                        self.deliver(
                            chat_id,
                            None,
                            vec![Outbound::Reply {
                                text: "Не смог скачать голосовое. Попробуй ещё раз.".to_owned(),
                                with_menu: false,
                            }],
                        )
                        .await;
                        return;
                    }
                };
                (chat_id, None, self.engine.handle_voice(chat_id, audio).await)
            }
            TelegramEvent::Command { chat_id, command } => {
                (chat_id, None, self.engine.handle_command(chat_id, command).await)
            }
            TelegramEvent::Text { chat_id, text } => {
                (chat_id, None, self.engine.handle_text(chat_id, &text).await)
            }
            TelegramEvent::Button { chat_id, callback_id, button } => {
                (chat_id, Some(callback_id), self.engine.handle_button(chat_id, button).await)
            }
            TelegramEvent::Unsupported => return,
        };

        match outcome {
            Ok(effects) => self.deliver(chat_id, callback_id.as_deref(), effects).await,
            Err(application_error) => {
                error!(chat_id, error = %application_error, "event handling failed");
                self.deliver(
                    chat_id,
                    callback_id.as_deref(),
                    vec![Outbound::Reply {
                        text: application_error.user_message().to_owned(),
                        with_menu: false,
                    }],
                )
                .await;
            }
        }
    }

    /// Delivery failures are logged and the remaining effects still run, so
    /// one rejected message cannot wedge the conversation.
    async fn deliver(&self, chat_id: i64, callback_id: Option<&str>, effects: Vec<Outbound>) {
        for effect in effects {
            let sent = match effect {
                Outbound::AckButton { text } => match callback_id {
                    Some(callback_id) => {
                        self.api.answer_callback(callback_id, text.as_deref()).await
                    }
                    None => {
                        debug!(chat_id, "dropping button ack without a callback id");
                        Ok(())
                    }
                },
                Outbound::Reply { text, with_menu } => {
                    let keyboard = with_menu.then(main_menu);
                    self.api.send_message(chat_id, &text, keyboard).await
                }
                Outbound::Document { filename, bytes } => {
                    self.api.send_document(chat_id, &filename, bytes).await
                }
                Outbound::LinkButton { text, label, url } => {
                    self.api.send_message(chat_id, &text, Some(link_keyboard(&label, &url))).await
                }
            };
            if let Err(transport_error) = sent {
                warn!(chat_id, error = %transport_error, "outbound delivery failed");
            }
        }
    }
}

fn event_name(event: &TelegramEvent) -> &'static str {
    match event {
        TelegramEvent::Voice { .. } => "voice",
        TelegramEvent::Command { .. } => "command",
        TelegramEvent::Text { .. } => "text",
        TelegramEvent::Button { .. } => "button",
        TelegramEvent::Unsupported => "unsupported",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use facturo_agent::{ConversationEngine, TextDocumentRenderer, Transcriber};
    use facturo_store::{ConversationStore, InMemoryStore};

    use crate::api::{BotApi, TransportError};
    use crate::keyboard::InlineKeyboardMarkup;
    use crate::update::{CallbackQuery, Chat, Message, Update, Voice};

    use super::{LongPollRunner, RetryPolicy};

    struct FixedTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
            Ok(self.0.to_owned())
        }
    }

    #[derive(Default)]
    struct ScriptedState {
        batches: VecDeque<Result<Vec<Update>, TransportError>>,
        offsets: Vec<i64>,
        calls: Vec<String>,
    }

    #[derive(Default)]
    struct ScriptedApi {
        state: Mutex<ScriptedState>,
    }

    impl ScriptedApi {
        fn with_batches(batches: Vec<Result<Vec<Update>, TransportError>>) -> Self {
            Self {
                state: Mutex::new(ScriptedState { batches: batches.into(), ..Default::default() }),
            }
        }

        async fn calls(&self) -> Vec<String> {
            self.state.lock().await.calls.clone()
        }

        async fn offsets(&self) -> Vec<i64> {
            self.state.lock().await.offsets.clone()
        }
    }

    #[async_trait]
    impl BotApi for ScriptedApi {
        async fn next_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
            let mut state = self.state.lock().await;
            state.offsets.push(offset);
            state
                .batches
                .pop_front()
                .unwrap_or(Err(TransportError::Poll("script exhausted".to_owned())))
        }

        async fn send_message(
            &self,
            chat_id: i64,
            text: &str,
            keyboard: Option<InlineKeyboardMarkup>,
        ) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            let menu = if keyboard.is_some() { "+menu" } else { "" };
            state.calls.push(format!("message:{chat_id}{menu}:{text}"));
            Ok(())
        }

        async fn answer_callback(
            &self,
            callback_id: &str,
            text: Option<&str>,
        ) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.calls.push(format!("ack:{callback_id}:{}", text.unwrap_or("")));
            Ok(())
        }

        async fn send_document(
            &self,
            chat_id: i64,
            filename: &str,
            _bytes: Vec<u8>,
        ) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.calls.push(format!("document:{chat_id}:{filename}"));
            Ok(())
        }

        async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
            if file_id == "broken" {
                return Err(TransportError::Download("file gone".to_owned()));
            }
            Ok(vec![0, 1, 2])
        }
    }

    fn runner(api: Arc<ScriptedApi>) -> LongPollRunner<InMemoryStore> {
        let engine = ConversationEngine::new(
            ConversationStore::new(InMemoryStore::default(), 500),
            Arc::new(FixedTranscriber("Антигель 50 штук по 2600, доставка 5000")),
            None,
            Arc::new(TextDocumentRenderer),
            "Asia/Almaty",
        );
        LongPollRunner::new(api, engine, RetryPolicy {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        })
    }

    fn text_update(update_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                chat: Chat { id: 7 },
                text: Some(text.to_owned()),
                voice: None,
            }),
            callback_query: None,
        }
    }

    #[tokio::test]
    async fn advances_the_offset_past_processed_updates() {
        let api = Arc::new(ScriptedApi::with_batches(vec![
            Ok(vec![text_update(10, "/start"), text_update(11, "/history")]),
            Err(TransportError::Poll("down".to_owned())),
        ]));

        runner(api.clone()).run().await.expect("runner stops cleanly");

        assert_eq!(api.offsets().await, vec![0, 12]);
        let calls = api.calls().await;
        assert_eq!(calls.len(), 2);
        assert!(calls[0].contains("/history"));
        assert_eq!(calls[1], "message:7:История пустая.");
    }

    #[tokio::test]
    async fn voice_then_button_acknowledges_before_prompting() {
        let voice = Update {
            update_id: 1,
            message: Some(Message {
                chat: Chat { id: 7 },
                text: None,
                voice: Some(Voice { file_id: "file-1".to_owned() }),
            }),
            callback_query: None,
        };
        let button = Update {
            update_id: 2,
            message: None,
            callback_query: Some(CallbackQuery {
                id: "cb-1".to_owned(),
                data: Some("qty".to_owned()),
                message: Some(Message { chat: Chat { id: 7 }, text: None, voice: None }),
            }),
        };
        let api = Arc::new(ScriptedApi::with_batches(vec![
            Ok(vec![voice, button]),
            Err(TransportError::Poll("down".to_owned())),
        ]));

        runner(api.clone()).run().await.expect("runner stops cleanly");

        let calls = api.calls().await;
        assert_eq!(calls.len(), 3);
        assert!(calls[0].starts_with("message:7+menu:Накладная:"));
        assert_eq!(calls[1], "ack:cb-1:");
        assert_eq!(
            calls[2],
            "message:7:Номер позиции для изменения кол-ва? (например: 1)"
        );
    }

    #[tokio::test]
    async fn voice_download_failure_produces_an_error_reply() {
        let voice = Update {
            update_id: 1,
            message: Some(Message {
                chat: Chat { id: 7 },
                text: None,
                voice: Some(Voice { file_id: "broken".to_owned() }),
            }),
            callback_query: None,
        };
        let api = Arc::new(ScriptedApi::with_batches(vec![
            Ok(vec![voice]),
            Err(TransportError::Poll("down".to_owned())),
        ]));

        runner(api.clone()).run().await.expect("runner stops cleanly");

        assert_eq!(
            api.calls().await,
            vec!["message:7:Не смог скачать голосовое. Попробуй ещё раз.".to_owned()]
        );
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let api = Arc::new(ScriptedApi::with_batches(vec![
            Err(TransportError::Poll("fail-1".to_owned())),
            Err(TransportError::Poll("fail-2".to_owned())),
        ]));
        let engine = ConversationEngine::new(
            ConversationStore::new(InMemoryStore::default(), 500),
            Arc::new(FixedTranscriber("")),
            None,
            Arc::new(TextDocumentRenderer),
            "Asia/Almaty",
        );
        let runner = LongPollRunner::new(api.clone(), engine, RetryPolicy {
            max_retries: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        });

        runner.run().await.expect("runner degrades gracefully");
        assert_eq!(api.offsets().await.len(), 2);
    }
}
