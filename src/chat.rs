//! Chat session context and the streaming question/answer turn.
//!
//! `ChatContext` is the explicitly owned replacement for what the original
//! client kept as ambient module state: it holds the service clients, the
//! durable session identity and the bounded message log, and orchestrates
//! one turn at a time. Exclusive access (`&mut self`) is what serializes
//! turns per session — a second concurrent ask cannot be expressed against
//! the same context.

use std::path::PathBuf;

use anyhow::Result;
use futures_util::StreamExt;

use crate::config::Config;
use crate::history::HistoryClient;
use crate::message::{Message, MessageLog, Role};
use crate::session::SessionStore;
use crate::storage::KvStore;
use crate::transport::{AnswerClient, AskRequest, TransportError};

/// Shown to the user when a turn fails without a usable error message.
pub const FALLBACK_ANSWER: &str = "Sorry, something went wrong. Please try again later.";

/// Storage key for the local transcript snapshot. The backend owns history;
/// the snapshot is only read when the history service is unreachable.
const HISTORY_SNAPSHOT_KEY: &str = "chat_history";

/// Optional product or order reference attached to a turn.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub product_id: Option<String>,
    pub order_id: Option<String>,
}

impl TurnContext {
    pub fn product(id: impl Into<String>) -> Self {
        Self {
            product_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn order(id: impl Into<String>) -> Self {
        Self {
            order_id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Accumulates streamed fragments into the answer text.
///
/// Leading whitespace is stripped exactly once, before the first
/// non-whitespace fragment arrives; from then on every fragment is applied
/// verbatim, whitespace-only ones included. The `started` flag is the single
/// source of truth — it is never re-derived from the accumulated length.
#[derive(Debug, Default)]
struct AnswerAccumulator {
    text: String,
    started: bool,
}

impl AnswerAccumulator {
    /// Applies one fragment, returning the piece that became visible
    /// (`None` for whitespace-only fragments before the answer started).
    fn apply<'a>(&mut self, fragment: &'a str) -> Option<&'a str> {
        let piece = if self.started {
            fragment
        } else {
            let stripped = fragment.trim_start();
            if stripped.is_empty() {
                return None;
            }
            self.started = true;
            stripped
        };
        self.text.push_str(piece);
        Some(piece)
    }

    /// Finalizes the answer, trimming trailing whitespace only.
    fn finish(mut self) -> String {
        self.text.truncate(self.text.trim_end().len());
        self.text
    }
}

/// One client's chat surface: session identity, memory window and the
/// streaming turn pipeline.
pub struct ChatContext {
    config: Config,
    answers: AnswerClient,
    history: HistoryClient,
    sessions: SessionStore,
    store: KvStore,
    log: MessageLog,
}

impl ChatContext {
    /// Builds a context using the default storage location.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_storage_dir(config, crate::paths::storage_dir())
    }

    /// Builds a context with an explicit storage directory.
    pub fn with_storage_dir(config: Config, storage_dir: PathBuf) -> Result<Self> {
        let store = KvStore::open(storage_dir)?;
        let base_url = config.service_base_url.trim_end_matches('/').to_string();
        Ok(Self {
            answers: AnswerClient::new(&base_url),
            history: HistoryClient::new(&base_url),
            sessions: SessionStore::new(store.clone()),
            store,
            log: MessageLog::new(config.history_pairs),
            config,
        })
    }

    /// The user this context speaks for.
    pub fn current_user(&self) -> &str {
        self.config.user_id.as_deref().unwrap_or("anonymous")
    }

    /// The active session id, created on first use.
    pub fn session_id(&mut self) -> String {
        self.sessions.ensure()
    }

    /// The local memory window.
    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    /// Runs one question/answer turn, discarding fragment notifications.
    pub async fn ask(&mut self, question: &str, turn: &TurnContext) -> Result<String> {
        self.ask_with(question, turn, |_| {}).await
    }

    /// Runs one question/answer turn.
    ///
    /// Appends the user message and an empty assistant placeholder, streams
    /// the answer into the placeholder fragment by fragment (notifying
    /// `on_fragment` with each visible piece, in arrival order), and returns
    /// the final answer. On failure the placeholder carries the error's
    /// message (or a fixed apology) and the error propagates; the user
    /// message is never lost.
    pub async fn ask_with<F>(
        &mut self,
        question: &str,
        turn: &TurnContext,
        on_fragment: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let session_id = self.sessions.ensure();
        let user_id = self.current_user().to_string();

        self.log.push(Role::User, question);
        // Track the open entry by id: a trim mid-stream can shift indices
        let placeholder_id = self.log.push(Role::Assistant, "");

        let request = AskRequest {
            question: question.to_string(),
            session_id,
            user_id,
            product_id: turn.product_id.clone(),
            order_id: turn.order_id.clone(),
        };

        let outcome = match self.stream_answer(&request, &placeholder_id, on_fragment).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                let shown = if e.message.trim().is_empty() {
                    FALLBACK_ANSWER.to_string()
                } else {
                    e.message.clone()
                };
                tracing::error!(kind = %e.kind, error = %e, "turn failed");
                if let Some(content) = self.log.content_mut(&placeholder_id) {
                    *content = shown;
                } else {
                    // Placeholder was trimmed away mid-stream; append instead
                    self.log.push(Role::Assistant, shown);
                }
                Err(e.into())
            }
        };
        self.save_snapshot();
        outcome
    }

    /// Writes the current log to the local snapshot. Failures are non-fatal:
    /// the snapshot is a fallback, never the source of truth.
    fn save_snapshot(&self) {
        match serde_json::to_string(self.log.messages()) {
            Ok(json) => {
                if let Err(e) = self.store.set(HISTORY_SNAPSHOT_KEY, &json) {
                    tracing::warn!(error = %e, "transcript snapshot not persisted");
                }
            }
            Err(e) => tracing::warn!(error = %e, "transcript snapshot not serializable"),
        }
    }

    fn load_snapshot(&self) -> Option<Vec<Message>> {
        let json = self.store.get(HISTORY_SNAPSHOT_KEY).ok().flatten()?;
        match serde_json::from_str(&json) {
            Ok(messages) => Some(messages),
            Err(e) => {
                tracing::warn!(error = %e, "stored transcript snapshot is unreadable");
                None
            }
        }
    }

    async fn stream_answer<F>(
        &mut self,
        request: &AskRequest,
        placeholder_id: &str,
        mut on_fragment: F,
    ) -> Result<String, TransportError>
    where
        F: FnMut(&str),
    {
        let mut stream = self.answers.ask_stream(request).await?;
        let mut acc = AnswerAccumulator::default();

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if let Some(piece) = acc.apply(&fragment) {
                on_fragment(piece);
                if let Some(content) = self.log.content_mut(placeholder_id) {
                    content.push_str(piece);
                }
            }
        }

        let answer = acc.finish();
        if let Some(content) = self.log.content_mut(placeholder_id) {
            content.clone_from(&answer);
        }
        Ok(answer)
    }

    /// Replaces the local log with the backend transcript for this session.
    ///
    /// When the backend is unreachable the locally snapshotted transcript
    /// stands in. All-or-nothing either way: with no snapshot the log is
    /// left empty, never partially populated.
    pub async fn load_history(&mut self) -> Result<()> {
        let session_id = self.sessions.ensure();
        match self.history.get(&session_id).await {
            Ok(transcript) => {
                self.log
                    .replace_all(transcript.into_iter().map(|m| (m.role, m.content)));
                self.save_snapshot();
                Ok(())
            }
            Err(e) => {
                if let Some(saved) = self.load_snapshot() {
                    tracing::warn!(error = %e, "history service unavailable, using local snapshot");
                    self.log.restore(saved);
                    return Ok(());
                }
                self.log.clear();
                Err(e)
            }
        }
    }

    /// Clears the conversation: best-effort backend purge, then
    /// unconditional local clear of the log, the snapshot and the session id.
    pub async fn clear(&mut self) {
        let session_id = self.sessions.ensure();
        if let Err(e) = self.history.clear(&session_id).await {
            tracing::warn!(error = %e, "backend history purge failed, local state cleared anyway");
        }
        self.log.clear();
        if let Err(e) = self.store.remove(HISTORY_SNAPSHOT_KEY) {
            tracing::warn!(error = %e, "failed to remove transcript snapshot");
        }
        self.sessions.clear();
    }
}
