//! Per-key in-flight fetch tracking.
//!
//! Guarantees at most one underlying fetch per query key: the first reader
//! of a missing entry becomes the leader and spawns the fetch, later readers
//! join its completion channel. An optimistic write supersedes the flight,
//! aborting the task so a stale response can never land after a newer write.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::infra::error::RemoteError;

use super::keys::QueryKey;

/// Terminal state of an in-flight fetch, observed by every participant.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Pending,
    /// The fetch stored its result before the flight was retired.
    Completed,
    /// The fetch failed; all participants share one error.
    Failed(Arc<RemoteError>),
    /// An optimistic write retired the flight first.
    Superseded,
}

impl FetchOutcome {
    pub fn is_settled(&self) -> bool {
        !matches!(self, FetchOutcome::Pending)
    }
}

struct Flight {
    generation: u64,
    outcome: watch::Sender<FetchOutcome>,
    abort: AbortHandle,
}

/// How a reader participates in a flight.
pub enum FlightRole {
    /// This reader registered the flight and its task is now running.
    Led {
        generation: u64,
        outcome: watch::Receiver<FetchOutcome>,
    },
    /// Another reader's fetch is already in flight.
    Joined(watch::Receiver<FetchOutcome>),
}

impl FlightRole {
    pub fn into_outcome(self) -> watch::Receiver<FetchOutcome> {
        match self {
            FlightRole::Led { outcome, .. } => outcome,
            FlightRole::Joined(outcome) => outcome,
        }
    }
}

/// Registry of in-flight fetches, one slot per query key.
pub struct FlightGate {
    flights: DashMap<QueryKey, Flight>,
    generations: AtomicU64,
}

impl FlightGate {
    pub fn new() -> Self {
        Self {
            flights: DashMap::new(),
            generations: AtomicU64::new(0),
        }
    }

    /// Join the flight for `key`, or lead a new one.
    ///
    /// `spawn` is invoked only for the leader, while the key's slot is held,
    /// and must return the abort handle of the spawned fetch task. The task
    /// settles the flight through [`FlightGate::finish`] or
    /// [`FlightGate::fail`] with the generation it was handed.
    pub fn lead_or_join<F>(&self, key: &QueryKey, spawn: F) -> FlightRole
    where
        F: FnOnce(u64) -> AbortHandle,
    {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(occupied) => FlightRole::Joined(occupied.get().outcome.subscribe()),
            Entry::Vacant(vacant) => {
                let generation = self.generations.fetch_add(1, Ordering::SeqCst);
                let (sender, receiver) = watch::channel(FetchOutcome::Pending);
                let abort = spawn(generation);
                vacant.insert(Flight {
                    generation,
                    outcome: sender,
                    abort,
                });
                FlightRole::Led {
                    generation,
                    outcome: receiver,
                }
            }
        }
    }

    /// Commit a fetch result.
    ///
    /// `commit` runs while the key's slot is held, so a supersede observed
    /// here is final: a retired flight can never write. Returns false when
    /// the flight was already retired and the result must be discarded.
    pub fn finish(&self, key: &QueryKey, generation: u64, commit: impl FnOnce()) -> bool {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(occupied) if occupied.get().generation == generation => {
                commit();
                let flight = occupied.remove();
                let _ = flight.outcome.send(FetchOutcome::Completed);
                true
            }
            _ => false,
        }
    }

    /// Report a fetch failure to every participant.
    pub fn fail(&self, key: &QueryKey, generation: u64, error: Arc<RemoteError>) -> bool {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(occupied) if occupied.get().generation == generation => {
                let flight = occupied.remove();
                let _ = flight.outcome.send(FetchOutcome::Failed(error));
                true
            }
            _ => false,
        }
    }

    /// Run a write that supersedes any flight for `key`, retiring it.
    ///
    /// `commit` runs while the key's slot is held, so it is ordered against
    /// [`FlightGate::finish`]: either the fetch committed first and the
    /// write lands over its result, or the flight is retired and the fetch
    /// can never write. Participants observe `Superseded` only after the
    /// write, and re-read the store to find it. Returns true when a flight
    /// was aborted.
    pub fn retire(&self, key: &QueryKey, commit: impl FnOnce()) -> bool {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                commit();
                let flight = occupied.remove();
                flight.abort.abort();
                let _ = flight.outcome.send(FetchOutcome::Superseded);
                true
            }
            Entry::Vacant(_) => {
                commit();
                false
            }
        }
    }

    /// Number of keys with a fetch in flight.
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

impl Default for FlightGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn parked_task() -> AbortHandle {
        tokio::spawn(std::future::pending::<()>()).abort_handle()
    }

    #[tokio::test]
    async fn second_reader_joins_existing_flight() {
        let gate = FlightGate::new();
        let key = QueryKey::User(Uuid::nil());

        let first = gate.lead_or_join(&key, |_| parked_task());
        assert!(matches!(first, FlightRole::Led { .. }));
        assert_eq!(gate.len(), 1);

        let second = gate.lead_or_join(&key, |_| panic!("joiner must not spawn"));
        assert!(matches!(second, FlightRole::Joined(_)));
        assert_eq!(gate.len(), 1);
    }

    #[tokio::test]
    async fn finish_settles_participants_and_retires_flight() {
        let gate = FlightGate::new();
        let key = QueryKey::User(Uuid::nil());

        let FlightRole::Led {
            generation,
            mut outcome,
        } = gate.lead_or_join(&key, |_| parked_task())
        else {
            panic!("expected to lead");
        };

        let mut committed = false;
        assert!(gate.finish(&key, generation, || committed = true));
        assert!(committed);
        assert!(gate.is_empty());

        let settled = outcome
            .wait_for(FetchOutcome::is_settled)
            .await
            .expect("flight settled")
            .clone();
        assert!(matches!(settled, FetchOutcome::Completed));
    }

    #[tokio::test]
    async fn stale_generation_cannot_commit() {
        let gate = FlightGate::new();
        let key = QueryKey::User(Uuid::nil());

        let FlightRole::Led { generation, .. } = gate.lead_or_join(&key, |_| parked_task()) else {
            panic!("expected to lead");
        };

        assert!(gate.retire(&key, || ()));
        assert!(gate.is_empty());

        // The aborted task's commit must be refused.
        let mut committed = false;
        assert!(!gate.finish(&key, generation, || committed = true));
        assert!(!committed);
    }

    #[tokio::test]
    async fn retire_notifies_participants_after_its_write() {
        let gate = FlightGate::new();
        let key = QueryKey::Feed(Uuid::nil());

        let mut outcome = gate.lead_or_join(&key, |_| parked_task()).into_outcome();
        let mut written = false;
        assert!(gate.retire(&key, || written = true));
        assert!(written);

        let settled = outcome
            .wait_for(FetchOutcome::is_settled)
            .await
            .expect("flight settled")
            .clone();
        assert!(matches!(settled, FetchOutcome::Superseded));
    }

    #[tokio::test]
    async fn retire_without_flight_still_commits() {
        let gate = FlightGate::new();
        let mut written = false;
        assert!(!gate.retire(&QueryKey::Feed(Uuid::nil()), || written = true));
        assert!(written);
    }
}
