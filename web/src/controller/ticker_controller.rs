use crate::response::unmanaged;
use axum::extract::State;
use axum::response::Response;
use log::*;
use service::AppState;
use sse::message::PatchSignals;
use std::time::Duration;

const TICK: Duration = Duration::from_secs(1);

/// GET stream an ever-increasing `ticks` signal until the client goes away
pub async fn ticks(State(app_state): State<AppState>) -> Response {
    let (mut session, mut disconnected, response) = unmanaged(app_state.sse_manager());

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK);
        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                _ = &mut disconnected => {
                    debug!("Ticker client for session {} disconnected", session.id().as_str());
                    break;
                }
                _ = interval.tick() => {
                    session.patch_signals(PatchSignals::new(serde_json::json!({ "ticks": ticks })));
                    ticks += 1;
                }
            }
        }
        session.close();
    });

    response
}
