use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Issue exactly one status request for the session's job.
    FetchStatus,
    /// Deliver `Msg::Tick` after the configured poll interval.
    ScheduleTick,
    /// Newly recorded job state for observers.
    Publish(crate::Job),
    /// Non-fatal failure on this tick; the last-known-good state is unchanged.
    ReportTransient(crate::FetchFailure),
    /// The job reached a terminal stage. Emitted once per session.
    Finished {
        job: crate::Job,
        duration: Duration,
    },
}
