//! Coalescing of overlapping rebuild requests.
//!
//! Fetching runs outside the core, so a new load can be requested while the
//! previous one is still in flight. [`RebuildScheduler`] keeps at most one
//! rebuild running and at most one waiting; a request that arrives while
//! another is waiting replaces it. When a rebuild finishes after a newer
//! request was made, its result must be discarded so stale data never
//! overwrites fresh data.

use tracing::{debug, trace};

/// Handle for a started rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildTicket {
    generation: u64,
    query_id: String,
}

impl RebuildTicket {
    #[must_use]
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildRequest {
    /// Nothing was running; start this rebuild now.
    Start(RebuildTicket),
    /// A rebuild is running; this one will be handed out on completion.
    Deferred,
}

/// Outcome of finishing a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Whether the finished rebuild's result should be applied.
    pub apply: bool,
    /// The deferred rebuild to start next, if any.
    pub next: Option<RebuildTicket>,
}

#[derive(Debug, Default)]
pub struct RebuildScheduler {
    generation: u64,
    in_flight: Option<RebuildTicket>,
    pending: Option<RebuildTicket>,
}

impl RebuildScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, query_id: &str) -> RebuildRequest {
        self.generation += 1;
        let ticket = RebuildTicket {
            generation: self.generation,
            query_id: query_id.to_string(),
        };

        if self.in_flight.is_some() {
            if let Some(replaced) = self.pending.replace(ticket) {
                trace!(query_id = %replaced.query_id, "Coalesced pending rebuild");
            }
            debug!(query_id, "Rebuild deferred");
            return RebuildRequest::Deferred;
        }

        self.in_flight = Some(ticket.clone());
        RebuildRequest::Start(ticket)
    }

    /// Finish the rebuild for `ticket`.
    ///
    /// A ticket that is not the one in flight is stale: its result is not
    /// applied and the scheduler state is unchanged.
    pub fn complete(&mut self, ticket: &RebuildTicket) -> Completion {
        if self.in_flight.as_ref() != Some(ticket) {
            return Completion {
                apply: false,
                next: None,
            };
        }

        let apply = ticket.generation == self.generation;
        if !apply {
            debug!(
                query_id = %ticket.query_id,
                "Discarding superseded rebuild result"
            );
        }

        self.in_flight = self.pending.take();
        Completion {
            apply,
            next: self.in_flight.clone(),
        }
    }

    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn pending_query(&self) -> Option<&str> {
        self.pending.as_ref().map(RebuildTicket::query_id)
    }
}
