use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{Message, MessageRole};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("{0}")]
    NotFound(String),
    #[error("system messages can only be added by seeding or escalation")]
    SystemRoleAppend,
    #[error("failed to write history to '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationOutcome {
    Escalated,
    AlreadyEscalated,
}

/// Short view of an assistant turn for the history listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPreview {
    pub ordinal: usize,
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub preview: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDocument {
    #[serde(default)]
    escalated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    messages: Vec<Message>,
    escalated_at: Option<DateTime<Utc>>,
}

impl HistoryStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            messages: Vec::new(),
            escalated_at: None,
        }
    }

    /// Reads the persisted conversation. A missing or unreadable file yields
    /// an empty store; it never fails.
    pub fn load(path: impl Into<PathBuf>, now: DateTime<Utc>, retention: Option<Duration>) -> Self {
        let path = path.into();
        let mut store = match read_document(&path) {
            Ok(Some(doc)) => Self {
                path,
                messages: doc.messages,
                escalated_at: doc.escalated_at,
            },
            Ok(None) => {
                debug!(path = %path.display(), "no history file yet");
                Self::empty(path)
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "history file unreadable; starting empty"
                );
                Self::empty(path)
            }
        };

        if let Some(window) = retention {
            store.prune(now, window);
        }
        debug!(
            path = %store.path.display(),
            message_count = store.messages.len(),
            escalated = store.is_escalated(),
            "loaded history"
        );
        store
    }

    /// Keeps only messages no older than `window` relative to `now`.
    pub fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        let before = self.messages.len();
        // An answer only survives together with the question it replies to.
        let mut question_kept = true;
        self.messages.retain(|msg| {
            let keep = within_window(now, msg.timestamp, window);
            match msg.role {
                MessageRole::User => {
                    question_kept = keep;
                    keep
                }
                MessageRole::Assistant => keep && question_kept,
                MessageRole::System => keep,
            }
        });
        if let Some(at) = self.escalated_at
            && !within_window(now, at, window)
        {
            self.escalated_at = None;
        }

        let removed = before - self.messages.len();
        if removed > 0 {
            info!(removed, remaining = self.messages.len(), "pruned expired history");
        }
    }

    /// Puts a seeded system prompt at index 0 unless one is already there.
    /// Returns whether it did.
    pub fn ensure_system_message(&mut self, builder: impl FnOnce() -> String) -> bool {
        if self.has_seeded_prompt() {
            return false;
        }
        self.messages.insert(0, Message::system(builder()));
        debug!(message_count = self.messages.len(), "seeded system message");
        true
    }

    // While escalated, a lone system message is the escalation notice.
    fn has_seeded_prompt(&self) -> bool {
        let Some(first) = self.messages.first() else {
            return false;
        };
        if first.role != MessageRole::System {
            return false;
        }
        !self.is_escalated()
            || self
                .messages
                .iter()
                .filter(|msg| msg.role == MessageRole::System)
                .count()
                >= 2
    }

    pub fn append(&mut self, role: MessageRole, content: impl Into<String>) -> Result<(), HistoryError> {
        if role == MessageRole::System {
            return Err(HistoryError::SystemRoleAppend);
        }
        self.messages.push(Message::new(role, content));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.escalated_at = None;
    }

    pub fn last(&self) -> Result<&Message, HistoryError> {
        self.messages
            .last()
            .ok_or_else(|| HistoryError::NotFound("history is empty".to_string()))
    }

    /// The last `n` assistant turns, most recent first (ordinal 0).
    pub fn recent_assistant_turns(&self, n: usize, preview_chars: usize) -> Vec<TurnPreview> {
        self.assistant_indices()
            .take(n)
            .enumerate()
            .map(|(ordinal, index)| {
                let msg = &self.messages[index];
                TurnPreview {
                    ordinal,
                    index,
                    timestamp: msg.timestamp,
                    preview: preview(&msg.content, preview_chars),
                }
            })
            .collect()
    }

    /// Resolves an ordinal from [`Self::recent_assistant_turns`] to the full message.
    pub fn get(&self, ordinal: usize) -> Result<&Message, HistoryError> {
        self.assistant_indices()
            .nth(ordinal)
            .map(|index| &self.messages[index])
            .ok_or_else(|| {
                HistoryError::NotFound(format!("no assistant message with ordinal {ordinal}"))
            })
    }

    pub fn escalate(&mut self, trigger_content: impl Into<String>) -> EscalationOutcome {
        if self.is_escalated() {
            return EscalationOutcome::AlreadyEscalated;
        }
        let msg = Message::system(trigger_content);
        self.escalated_at = Some(msg.timestamp);
        self.messages.push(msg);
        info!("conversation escalated");
        EscalationOutcome::Escalated
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated_at.is_some()
    }

    /// Rewrites the whole history file. The document goes to a sibling
    /// temporary file first and is renamed over the target.
    pub fn persist(&self) -> Result<(), HistoryError> {
        let persist_err = |source: io::Error| HistoryError::Persist {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(persist_err)?;
        }

        let doc = HistoryDocument {
            escalated_at: self.escalated_at,
            messages: self.messages.clone(),
        };
        let json = serde_json::to_vec_pretty(&doc).map_err(|err| persist_err(err.into()))?;

        let tmp_path = tmp_path_for(&self.path);
        fs::write(&tmp_path, json).map_err(persist_err)?;
        fs::rename(&tmp_path, &self.path).map_err(|err| {
            let _ = fs::remove_file(&tmp_path);
            persist_err(err)
        })?;

        debug!(
            path = %self.path.display(),
            message_count = self.messages.len(),
            "persisted history"
        );
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn assistant_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.messages
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, msg)| msg.role == MessageRole::Assistant)
            .map(|(index, _)| index)
    }
}

fn read_document(path: &Path) -> io::Result<Option<HistoryDocument>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    serde_json::from_str(&raw).map(Some).map_err(io::Error::from)
}

// Messages stamped slightly in the future (clock skew) are kept.
fn within_window(now: DateTime<Utc>, timestamp: DateTime<Utc>, window: Duration) -> bool {
    match (now - timestamp).to_std() {
        Ok(age) => age <= window,
        Err(_) => true,
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "history".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn preview(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let head: String = flat.chars().take(max_chars).collect();
    format!("{}...", head.trim_end())
}
