//! Bounded log of recent natural-language turns.
//!
//! The tracker only feeds hints to the translator. Nothing here influences
//! safety or risk decisions, and a slightly stale snapshot is harmless.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use sqlgate_core::{DatabaseId, OperationKind, Timestamp};
use tracing::warn;

use crate::pending::OperationId;

/// Default number of turns kept.
pub const DEFAULT_CAPACITY: usize = 10;

/// Words that suggest a request refers to an earlier turn.
pub const BACK_REFERENCE_INDICATORS: &[&str] = &[
    "same", "previous", "last", "above", "before", "earlier", "that", "those", "this", "these",
    "it", "them",
];

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnStatus {
    /// A read ran and returned rows.
    Executed {
        /// Number of rows returned.
        rows: usize,
    },
    /// A mutation was queued.
    PendingApproval {
        /// Queued operation.
        id: OperationId,
    },
    /// Translation, validation or execution failed.
    Failed {
        /// Error shown to the user.
        reason: String,
    },
}

/// Outcome recorded for a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    /// Classified operation kind, UNKNOWN when translation failed.
    pub operation: OperationKind,
    /// Statement produced, if any.
    pub sql: Option<String>,
    /// How the request ended.
    #[serde(flatten)]
    pub status: TurnStatus,
}

/// One natural-language request and its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// When the request was handled.
    pub timestamp: Timestamp,
    /// The user's words.
    pub natural_language_text: String,
    /// Database the request targeted.
    pub target_database: DatabaseId,
    /// What happened.
    pub result: TurnResult,
}

impl ConversationTurn {
    /// Create a turn stamped now.
    #[must_use]
    pub fn new(
        natural_language_text: impl Into<String>,
        target_database: DatabaseId,
        result: TurnResult,
    ) -> Self {
        Self {
            timestamp: Timestamp::now(),
            natural_language_text: natural_language_text.into(),
            target_database,
            result,
        }
    }
}

/// FIFO ring of recent turns.
#[derive(Debug)]
pub struct ContextTracker {
    turns: Mutex<VecDeque<ConversationTurn>>,
    capacity: usize,
}

impl ContextTracker {
    /// Create a tracker holding at most `capacity` turns. A zero capacity is
    /// raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Maximum number of turns kept.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a turn, evicting the oldest when full.
    pub fn record(&self, turn: ConversationTurn) {
        let mut turns = self.lock();
        while turns.len() >= self.capacity {
            turns.pop_front();
        }
        turns.push_back(turn);
    }

    /// The last `n` turns, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<ConversationTurn> {
        let turns = self.lock();
        let skip = turns.len().saturating_sub(n);
        turns.iter().skip(skip).cloned().collect()
    }

    /// Number of turns held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no turns are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every turn.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Whether `text` contains a back-reference indicator as a whole word.
    ///
    /// ```
    /// use sqlgate_approval::ContextTracker;
    ///
    /// assert!(ContextTracker::has_back_reference("Give THAT employee a raise"));
    /// assert!(!ContextTracker::has_back_reference("list employees with a salary"));
    /// ```
    #[must_use]
    pub fn has_back_reference(text: &str) -> bool {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| {
                let word = word.to_lowercase();
                BACK_REFERENCE_INDICATORS.contains(&word.as_str())
            })
    }

    /// Render the last `n` turns for a translator prompt.
    #[must_use]
    pub fn prompt_context(&self, n: usize) -> String {
        render_turns(&self.recent(n))
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ConversationTurn>> {
        self.turns.lock().unwrap_or_else(|e| {
            warn!("context tracker lock was poisoned, recovering");
            e.into_inner()
        })
    }
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Render turns as `User:`, `SQL:` and `Operation:` lines separated by a
/// blank line.
#[must_use]
pub fn render_turns(turns: &[ConversationTurn]) -> String {
    let mut out = String::new();
    for (index, turn) in turns.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "User: {}", turn.natural_language_text);
        let _ = writeln!(out, "SQL: {}", turn.result.sql.as_deref().unwrap_or("-"));
        let _ = writeln!(out, "Operation: {}", turn.result.operation);
    }
    out
}
