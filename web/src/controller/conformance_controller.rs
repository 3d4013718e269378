use crate::extractors::signals::ReadSignals;
use crate::response::managed;
use crate::Result;
use axum::extract::State;
use axum::response::Response;
use log::*;
use service::AppState;
use sse::batch::{self, Batch};
use sse::SessionOptions;

/// GET|POST run the operation batch carried in the signals
///
/// This is the endpoint SDK test suites drive: every entry in `events` is
/// sent in order and the stream closes once the batch is done.
pub async fn run(
    State(app_state): State<AppState>,
    ReadSignals(snapshot): ReadSignals,
) -> Result<Response> {
    let batch = Batch::from_snapshot(&snapshot)?;
    debug!("Running a batch of {} events", batch.events.len());

    Ok(managed(
        app_state.sse_manager(),
        SessionOptions::default(),
        move |session| {
            Box::pin(async move {
                let sent = batch::run_batch(session, &batch);
                trace!("Sent {sent} of {} batch events", batch.events.len());
                Ok(())
            })
        },
    ))
}
