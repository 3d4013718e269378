use crate::extractors::datastar_request::DatastarRequest;
use crate::extractors::signals::ReadSignals;
use crate::response::managed;
use crate::Result;
use axum::extract::State;
use axum::response::Response;
use log::*;
use service::AppState;
use sse::message::PatchSignals;
use sse::SessionOptions;

/// GET|POST echo the client's signals back as a patch-signals event
pub async fn echo(
    State(app_state): State<AppState>,
    DatastarRequest(from_runtime): DatastarRequest,
    ReadSignals(snapshot): ReadSignals,
) -> Result<Response> {
    if !from_runtime {
        debug!("Signals echo requested without the datastar-request marker");
    }

    let values = snapshot.into_result()?;
    trace!("Echoing {} signals", values.len());

    Ok(managed(
        app_state.sse_manager(),
        SessionOptions::default(),
        move |session| {
            Box::pin(async move {
                session.patch_signals(PatchSignals::new(values));
                Ok(())
            })
        },
    ))
}
