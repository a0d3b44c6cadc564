use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use fleetnav_core::{BotId, Location};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info_span, warn, Instrument};

use super::protocol::{Inbound, Reply};
use super::ChannelRegistry;
use crate::fleet::Fleet;
use crate::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state.channel, state.fleet))
}

/// Serves one connection until the client goes away.
///
/// A single writer task owns the socket's sink; replies and pushed commands both
/// go through this connection's queue so they never interleave mid-frame.
/// Location reports are acknowledged at once and applied by one worker per
/// connection, so a later report never lands before an earlier one.
pub async fn run_session(socket: WebSocket, registry: ChannelRegistry, fleet: Fleet) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // location reports are applied one at a time, in arrival order
    let (reports_tx, mut reports_rx) = mpsc::unbounded_channel::<(BotId, Location)>();
    let reporter = {
        let fleet = fleet.clone();
        tokio::spawn(
            async move {
                while let Some((bot, location)) = reports_rx.recv().await {
                    if let Err(e) = fleet.report_location(bot, location).await {
                        warn!(bot_id = bot, error = %e, "location report rejected");
                    }
                }
            }
            .instrument(info_span!("channel_locations")),
        )
    };

    // (identity, serial) once the client has registered
    let mut bound: Option<(String, u64)> = None;

    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "channel read failed");
                break;
            }
        };

        let reply = match Inbound::parse(&text) {
            Inbound::Register(identity) => {
                if let Some((old, serial)) = bound.take() {
                    registry.unregister(&old, serial);
                }
                let serial = registry.register(&identity, tx.clone());
                bound = Some((identity.clone(), serial));
                Reply::Welcome(Some(identity))
            }
            Inbound::Location { bot, location } => {
                if reports_tx.send((bot, location)).is_err() {
                    break;
                }
                Reply::LocationAccepted
            }
            Inbound::Join => Reply::Welcome(None),
            Inbound::Unknown => {
                debug!(line = %text, "unrecognized channel message");
                Reply::Unrecognized
            }
        };
        if tx.send(reply.to_string()).is_err() {
            break;
        }
    }

    if let Some((identity, serial)) = bound {
        registry.unregister(&identity, serial);
    }
    writer.abort();
    // pending reports still get applied after the client leaves
    drop(reports_tx);
    if let Err(e) = reporter.await {
        warn!(error = %e, "location worker failed");
    }
}
