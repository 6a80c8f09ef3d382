use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Poll timer fired, or the session was just registered.
    Tick,
    /// A status fetch resolved with a schema-valid snapshot.
    StatusFetched {
        job: crate::Job,
        received_at: Instant,
    },
    /// A status fetch resolved without a usable snapshot.
    FetchFailed(crate::FetchFailure),
    /// User stopped tracking the job.
    Removed,
}
