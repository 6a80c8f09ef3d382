use crate::{apply_status, Effect, FetchFailure, Msg, PollSession};

/// Pure update function: applies a message to a poll session and returns any effects.
///
/// Only `Tick` can produce `Effect::FetchStatus`, and only while no fetch is
/// outstanding, so a session never has two requests in flight. Once the session
/// is cancelled or finished every message is a no-op.
pub fn update(mut session: PollSession, msg: Msg) -> (PollSession, Vec<Effect>) {
    if session.is_closed() {
        return (session, Vec::new());
    }

    let effects = match msg {
        Msg::Tick => {
            if session.is_in_flight() {
                return (session, Vec::new());
            }
            session.begin_fetch();
            vec![Effect::FetchStatus]
        }
        Msg::StatusFetched { job, received_at } => {
            session.end_fetch();
            if &job.id != session.job_id() {
                let failure = FetchFailure::contract(format!(
                    "status for {} returned job {}",
                    session.job_id(),
                    job.id
                ));
                session.store_failure(failure.clone());
                return (
                    session,
                    vec![Effect::ReportTransient(failure), Effect::ScheduleTick],
                );
            }

            let next = apply_status(session.job(), job);
            session.store(next.clone());
            let mut effects = vec![Effect::Publish(next.clone())];
            if next.is_terminal() {
                session.finish();
                let duration = received_at.saturating_duration_since(session.started_at());
                effects.push(Effect::Finished {
                    job: next,
                    duration,
                });
            } else {
                effects.push(Effect::ScheduleTick);
            }
            effects
        }
        Msg::FetchFailed(failure) => {
            session.end_fetch();
            session.store_failure(failure.clone());
            vec![Effect::ReportTransient(failure), Effect::ScheduleTick]
        }
        Msg::Removed => {
            session.cancel();
            Vec::new()
        }
    };

    (session, effects)
}
