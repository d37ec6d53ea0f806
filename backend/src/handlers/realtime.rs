//! Server-sent change events

use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::realtime::{change_stream, ChangeFilter, ChangeMessage};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ChangesQuery {
    /// Comma separated table names; all watched tables when absent
    pub tables: Option<String>,
}

/// Stream `change` events for the caller's rows. A `resync` event means
/// events were dropped and the client should re-fetch.
pub async fn stream_changes(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ChangesQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let filter = ChangeFilter::new(current_user.0.user_id, query.tables.as_deref())?;
    tracing::debug!(user_id = %current_user.0.user_id, "Change stream opened");

    let events = change_stream(state.changes.subscribe(), filter).map(|message| match message {
        ChangeMessage::Change(change) => Event::default().event("change").json_data(&change),
        ChangeMessage::Resync { missed } => {
            Ok(Event::default().event("resync").data(missed.to_string()))
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
