//! Breakpoint registry
//!
//! Placement is idempotent per `(url, line, column)`. A key is reserved
//! synchronously before the creation request goes out, so two handlers that
//! race on the same location never both reach the backend.
//!
//! At shutdown the registry is closed: no new creation starts, and
//! [`BreakpointRegistry::settled`] resolves once every request already sent
//! has been committed or released. Teardown then sees every id the backend
//! handed out.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::cdp::types::BreakpointId;

use super::matcher::{self, MatchCandidate};
use super::DebuggerProtocol;

/// Composite location key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointKey {
    pub url: String,
    pub line: u32,
    pub column: u32,
}

impl From<&MatchCandidate> for BreakpointKey {
    fn from(candidate: &MatchCandidate) -> Self {
        Self {
            url: candidate.url.clone(),
            line: candidate.line,
            column: candidate.column,
        }
    }
}

impl std::fmt::Display for BreakpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.url, self.line, self.column)
    }
}

/// A breakpoint placed by this session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointRecord {
    pub key: BreakpointKey,
    /// Exactly what the backend returned; used again for removal
    pub breakpoint_id: BreakpointId,
    pub pattern: String,
    pub line_text: String,
}

/// Result of offering one candidate to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Created(BreakpointId),
    /// Key already reserved or placed
    Duplicate,
    Failed,
    /// Registry closed for shutdown, nothing was sent
    Closed,
}

/// Outcome of trying to claim a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reservation {
    Granted,
    Taken,
    Closed,
}

#[derive(Debug, Default)]
struct State {
    /// Keys with a creation request in flight
    reserved: HashSet<BreakpointKey>,
    records: BTreeMap<BreakpointKey, BreakpointRecord>,
    closed: bool,
}

/// Registry of every breakpoint the session placed
#[derive(Debug)]
pub struct BreakpointRegistry {
    state: Mutex<State>,
    /// Number of reserved keys, published for [`Self::settled`]
    in_flight: watch::Sender<usize>,
}

impl Default for BreakpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            state: Mutex::new(State::default()),
            in_flight,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the state lock held
    fn publish(&self, state: &State) {
        self.in_flight.send_replace(state.reserved.len());
    }

    fn try_reserve(&self, key: &BreakpointKey) -> Reservation {
        let mut state = self.state();
        if state.closed {
            return Reservation::Closed;
        }
        if state.records.contains_key(key) || state.reserved.contains(key) {
            return Reservation::Taken;
        }
        state.reserved.insert(key.clone());
        self.publish(&state);
        Reservation::Granted
    }

    /// Claim a key; false if it is reserved, already placed, or the registry is closed
    pub fn reserve(&self, key: &BreakpointKey) -> bool {
        self.try_reserve(key) == Reservation::Granted
    }

    /// Turn a reservation into a record
    pub fn commit(&self, record: BreakpointRecord) {
        let mut state = self.state();
        state.reserved.remove(&record.key);
        state.records.insert(record.key.clone(), record);
        self.publish(&state);
    }

    /// Give up a reservation after a failed creation
    pub fn release(&self, key: &BreakpointKey) {
        let mut state = self.state();
        state.reserved.remove(key);
        self.publish(&state);
    }

    /// Refuse every later reservation
    pub fn close(&self) {
        self.state().closed = true;
    }

    /// Creation requests sent but not yet answered
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until no creation request is outstanding
    pub async fn settled(&self) {
        let mut in_flight = self.in_flight.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting
        let _ = in_flight.wait_for(|count| *count == 0).await;
    }

    /// Offer a candidate: dedup, create, record
    pub async fn place<P: DebuggerProtocol + ?Sized>(
        &self,
        protocol: &P,
        candidate: &MatchCandidate,
    ) -> Placement {
        let key = BreakpointKey::from(candidate);
        match self.try_reserve(&key) {
            Reservation::Granted => {}
            Reservation::Taken => {
                tracing::trace!(%key, pattern = %candidate.pattern, "Breakpoint already present");
                return Placement::Duplicate;
            }
            Reservation::Closed => {
                tracing::debug!(%key, "Registry closed, skipping breakpoint");
                return Placement::Closed;
            }
        }

        match protocol
            .set_breakpoint_by_url(&key.url, key.line, key.column)
            .await
        {
            Ok(breakpoint_id) => {
                tracing::info!(
                    url = %key.url,
                    line = key.line,
                    column = key.column,
                    breakpoint_id = %breakpoint_id,
                    pattern = %candidate.pattern,
                    code = %matcher::excerpt(&candidate.line_text, key.column),
                    "New breakpoint set"
                );
                self.commit(BreakpointRecord {
                    key,
                    breakpoint_id: breakpoint_id.clone(),
                    pattern: candidate.pattern.clone(),
                    line_text: candidate.line_text.clone(),
                });
                Placement::Created(breakpoint_id)
            }
            Err(e) => {
                self.release(&key);
                if e.is_already_exists() {
                    tracing::debug!(%key, "Backend already has a breakpoint here");
                } else {
                    tracing::warn!(%key, error = %e, "Failed to set breakpoint");
                }
                Placement::Failed
            }
        }
    }

    /// Copy of all placed records, ordered by key
    pub fn records(&self) -> Vec<BreakpointRecord> {
        self.state().records.values().cloned().collect()
    }

    /// Remove and return every placed record
    pub fn take_all(&self) -> Vec<BreakpointRecord> {
        std::mem::take(&mut self.state().records)
            .into_values()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
