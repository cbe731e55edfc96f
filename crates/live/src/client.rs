use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio_tungstenite::tungstenite::Message;

use crate::types::{ClientEvent, ServerMessage};

const LIVE_WS_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
const CHANNEL_CAPACITY: usize = 1024;

pub type ClientTx = tokio::sync::mpsc::Sender<ClientEvent>;
type ServerTx = tokio::sync::broadcast::Sender<ServerMessage>;
pub type ServerRx = tokio::sync::broadcast::Receiver<ServerMessage>;

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("failed to connect to live API: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("live session is no longer running")]
    SessionClosed,
}

/// A connected live session.
///
/// Outbound events go through an mpsc channel drained by the send task;
/// inbound messages fan out on a broadcast channel. Dropping the client
/// closes the outbound channel, which ends the send task and with it the
/// socket's write half.
pub struct LiveClient {
    c_tx: ClientTx,
    s_tx: ServerTx,
    send_handle: tokio::task::JoinHandle<()>,
    recv_handle: tokio::task::JoinHandle<()>,
}

impl LiveClient {
    pub async fn connect(api_key: &SecretString) -> Result<Self, LiveError> {
        let url = format!("{}?key={}", LIVE_WS_URL, api_key.expose_secret());
        let (ws_stream, _) = tokio_tungstenite::connect_async(url).await?;
        tracing::info!("connected to live API");

        let (mut write, mut read) = ws_stream.split();
        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<ClientEvent>(CHANNEL_CAPACITY);
        let (s_tx, _) = tokio::sync::broadcast::channel::<ServerMessage>(CHANNEL_CAPACITY);

        let send_handle = tokio::spawn(async move {
            while let Some(event) = c_rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                            break;
                        }
                    }
                    Err(e) => tracing::error!("failed to serialize event: {}", e),
                }
            }
        });

        let server_tx = s_tx.clone();
        let recv_handle = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        break;
                    }
                };
                match message {
                    // The live API sends JSON as both text and binary frames.
                    Message::Text(text) => dispatch(&server_tx, text.as_bytes()),
                    Message::Binary(bin) => dispatch(&server_tx, &bin),
                    Message::Close(reason) => {
                        tracing::info!("live connection closed: {:?}", reason);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self {
            c_tx,
            s_tx,
            send_handle,
            recv_handle,
        })
    }

    /// A fresh subscription to server messages. Only messages arriving after
    /// the call are observed.
    pub fn server_events(&self) -> ServerRx {
        self.s_tx.subscribe()
    }

    pub async fn send(&self, event: ClientEvent) -> Result<(), LiveError> {
        self.c_tx
            .send(event)
            .await
            .map_err(|_| LiveError::SessionClosed)
    }

    pub async fn send_setup(&self, model: &str, system_instruction: &str) -> Result<(), LiveError> {
        self.send(ClientEvent::setup(model, system_instruction)).await
    }

    pub async fn send_audio_chunk(&self, base64_pcm: String) -> Result<(), LiveError> {
        self.send(ClientEvent::audio_chunk(base64_pcm)).await
    }

    pub async fn send_text(&self, text: &str) -> Result<(), LiveError> {
        self.send(ClientEvent::user_text(text)).await
    }

    pub async fn send_tool_response(
        &self,
        id: Option<String>,
        name: &str,
        response: serde_json::Value,
    ) -> Result<(), LiveError> {
        self.send(ClientEvent::tool_response(id, name, response))
            .await
    }
}

impl Drop for LiveClient {
    fn drop(&mut self) {
        self.send_handle.abort();
        self.recv_handle.abort();
    }
}

fn dispatch(server_tx: &ServerTx, payload: &[u8]) {
    match serde_json::from_slice::<ServerMessage>(payload) {
        Ok(message) => {
            // Err here only means no subscriber is currently listening.
            let _ = server_tx.send(message);
        }
        Err(e) => tracing::error!("failed to deserialize server message: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a real key: GEMINI_API_KEY=... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn setup_handshake_against_real_api() {
        let api_key = SecretString::from(
            std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set"),
        );
        let client = LiveClient::connect(&api_key).await.expect("connect");
        let mut events = client.server_events();
        client
            .send_setup("models/gemini-2.0-flash-exp", "You are a test probe.")
            .await
            .expect("send setup");

        let deadline = tokio::time::Duration::from_secs(10);
        let message = tokio::time::timeout(deadline, events.recv())
            .await
            .expect("no server message within deadline")
            .expect("server channel closed");
        assert!(message.setup_complete.is_some());
    }
}
