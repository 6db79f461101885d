//! `/ws/events` viewer sessions.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::http::state::RelayState;

/// GET /ws/events
pub async fn ws_events_handler(ws: WebSocketUpgrade, State(state): State<RelayState>) -> Response {
    ws.on_upgrade(move |socket| viewer_session(socket, state))
}

async fn viewer_session(socket: WebSocket, state: RelayState) {
    let (id, outbound) = state.registry.register(state.session_buffer).await;
    let viewers = state.registry.len().await;
    tracing::info!(session = %id, viewers = viewers, "viewer connected");

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(forward_outbound(outbound, sink));
    let mut reader = tokio::spawn(drain_inbound(stream));

    // Whichever side finishes first ends the session.
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    state.registry.unregister(&id).await;
    tracing::info!(session = %id, "viewer disconnected");
}

async fn forward_outbound(
    mut outbound: mpsc::Receiver<String>,
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
) {
    while let Some(text) = outbound.recv().await {
        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Client messages are keepalives and are discarded.
async fn drain_inbound(mut stream: futures::stream::SplitStream<WebSocket>) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::routes::relay_router;
    use incidentops_core::api::SessionRegistry;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message as ClientMessage;

    async fn serve_relay(registry: Arc<SessionRegistry>) -> String {
        let state = RelayState {
            registry,
            session_buffer: 16,
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, relay_router(state)).await });
        format!("ws://{addr}/ws/events")
    }

    async fn wait_for_sessions(registry: &SessionRegistry, want: usize) {
        for _ in 0..200 {
            if registry.len().await == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {want} sessions");
    }

    #[tokio::test]
    async fn test_viewer_session_lifecycle() {
        let registry = Arc::new(SessionRegistry::new());
        let url = serve_relay(registry.clone()).await;

        let (mut client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        wait_for_sessions(&registry, 1).await;

        // keepalive text from the browser is neither echoed nor fatal
        client
            .send(ClientMessage::Text("ping".into()))
            .await
            .unwrap();
        let payload = r#"{"type":"log","step":1}"#;
        let report = registry.broadcast(payload).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 0);

        let received = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received, ClientMessage::Text(payload.into()));
        assert_eq!(registry.len().await, 1);

        client.close(None).await.unwrap();
        wait_for_sessions(&registry, 0).await;
    }

    #[tokio::test]
    async fn test_dropped_connection_is_unregistered() {
        let registry = Arc::new(SessionRegistry::new());
        let url = serve_relay(registry.clone()).await;

        let (first, _) = tokio_tungstenite::connect_async(url.clone()).await.unwrap();
        let (mut second, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        wait_for_sessions(&registry, 2).await;

        drop(first);
        wait_for_sessions(&registry, 1).await;

        registry.broadcast("still here").await;
        let received = tokio::time::timeout(Duration::from_secs(5), second.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received, ClientMessage::Text("still here".into()));
    }
}
