//! `WebSocket` relay of a single rocket's flight.
//!
//! Clients connect to `GET /ws/rockets/{id}` and receive every `launched`,
//! `updated` and `crashed` envelope for that rocket as a JSON text frame,
//! byte-for-byte as published. Ownership is checked before the upgrade, so
//! a rejected client gets an ordinary HTTP error.
//!
//! The bus subscription is live only: envelopes published before the
//! connection was opened are not replayed.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use rocketman_engine::bus::LiveSubscription;
use rocketman_types::{RocketId, Topic};
use tracing::{debug, warn};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Upgrade to a `WebSocket` streaming the rocket's flight events.
///
/// # Route
///
/// `GET /ws/rockets/{id}`
pub async fn ws_rocket(
    AuthUser(owner): AuthUser,
    Path(id): Path<RocketId>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // Also rejects IDs that are not a single routable segment, so the
    // pattern below can never widen into a wildcard.
    state.service.get_rocket(&id, &owner).await?;
    let subscription = state
        .context()
        .bus
        .subscribe_live(&Topic::all_for(&id))
        .await?;
    Ok(ws.on_upgrade(move |socket| relay(socket, subscription, id)))
}

/// Forward relayed envelopes until either side goes away.
async fn relay(mut socket: WebSocket, mut subscription: LiveSubscription, id: RocketId) {
    debug!(rocket_id = %id, "WebSocket client connected");

    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else {
                    debug!(rocket_id = %id, "event bus closed, shutting down WebSocket");
                    break;
                };
                let relayed = Topic::parse(&event.subject).is_some_and(|topic| topic.kind.is_relayed());
                if !relayed {
                    continue;
                }
                let text = match String::from_utf8(event.payload) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(rocket_id = %id, subject = %event.subject, error = %e, "dropping non-UTF-8 envelope");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    debug!(rocket_id = %id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(rocket_id = %id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(rocket_id = %id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(rocket_id = %id, error = %e, "WebSocket receive error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if let Err(e) = subscription.unsubscribe().await {
        warn!(rocket_id = %id, error = %e, "failed to unsubscribe relay");
    }
}
