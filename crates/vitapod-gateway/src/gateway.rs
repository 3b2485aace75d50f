//! **Client gateway** — the shared hub behind every WebSocket and HTTP client.
//!
//! Keeps the latest state snapshot for late joiners, fans outbound frames to
//! all subscribers, and maps inbound client messages onto the session's
//! action queue. Button actions become the same canonical phrases a user
//! would say, so the session loop never knows which input path was used.

use serde::Deserialize;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use vitapod_core::{ActionSender, ResetSignal, SnapshotSink, StateSnapshot};
use vitapod_voice::RemotePlayback;

/// Canonical phrase for each UI button.
const ACTION_TEXT: &[(&str, &str)] = &[
    ("start", "Start Self-Screening"),
    ("confirm", "yes"),
    ("accept", "yes"),
    ("ready", "ready"),
    ("continue", "continue"),
    ("skip", "skip"),
    ("retry", "retry"),
    ("exit", "no"),
    ("finish", "done"),
];

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Action {
        action: String,
        #[serde(default)]
        data: serde_json::Value,
    },
    TtsStatus {
        status: String,
        /// Utterance id echoed back from the tts frame being reported on.
        #[serde(default)]
        utterance: Option<u64>,
    },
}

pub struct ClientGateway {
    latest: RwLock<StateSnapshot>,
    clients: broadcast::Sender<String>,
    actions: ActionSender,
    reset: ResetSignal,
    /// Present when the display client voices utterances itself.
    remote: Option<Arc<RemotePlayback>>,
}

impl ClientGateway {
    pub fn new(
        clients: broadcast::Sender<String>,
        actions: ActionSender,
        reset: ResetSignal,
        remote: Option<Arc<RemotePlayback>>,
    ) -> Self {
        Self {
            latest: RwLock::new(StateSnapshot {
                page_id: 1,
                data: serde_json::json!({}),
            }),
            clients,
            actions,
            reset,
            remote,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.clients.subscribe()
    }

    /// State frame for a client that just connected.
    pub fn latest_frame(&self) -> String {
        self.latest.read().expect("snapshot lock poisoned").to_frame()
    }

    /// Dispatch one inbound client frame.
    pub fn handle_client_text(&self, text: &str) {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(error = %err, frame = text, "unparseable client frame");
                return;
            }
        };
        match message {
            ClientMessage::Action { action, data } => self.handle_action(&action, &data),
            ClientMessage::TtsStatus { status, utterance } => {
                if let Some(remote) = &self.remote {
                    remote.playback_status(status == "start", utterance);
                } else {
                    tracing::debug!(status, "tts_status without remote playback");
                }
            }
        }
    }

    fn handle_action(&self, action: &str, data: &serde_json::Value) {
        if action == "reset" {
            tracing::info!("reset requested by client");
            self.reset.set();
            return;
        }
        let text = if action == "answer" {
            match data.get("answer").and_then(|v| v.as_str()) {
                Some(answer) => answer.to_string(),
                None => {
                    tracing::debug!("answer action without answer text");
                    return;
                }
            }
        } else {
            ACTION_TEXT
                .iter()
                .find(|(name, _)| *name == action)
                .map(|(_, phrase)| phrase.to_string())
                // unknown actions pass through verbatim for forward compat
                .unwrap_or_else(|| action.to_string())
        };
        if self.actions.send(text).is_err() {
            tracing::error!("session loop gone, dropping action");
        }
    }
}

impl SnapshotSink for ClientGateway {
    fn publish(&self, snapshot: StateSnapshot) {
        let frame = snapshot.to_frame();
        *self.latest.write().expect("snapshot lock poisoned") = snapshot;
        // no subscribers is normal before the first client connects
        let _ = self.clients.send(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;
    use vitapod_core::{build_snapshot, Session, Stage};
    use vitapod_voice::PlaybackBackend;

    fn gateway() -> (Arc<ClientGateway>, mpsc::UnboundedReceiver<String>, ResetSignal) {
        let (clients, _) = broadcast::channel(16);
        let (actions, actions_rx) = mpsc::unbounded_channel();
        let reset = ResetSignal::new();
        let gateway = Arc::new(ClientGateway::new(clients, actions, reset.clone(), None));
        (gateway, actions_rx, reset)
    }

    #[tokio::test]
    async fn buttons_map_to_canonical_phrases() {
        let (gateway, mut actions, _reset) = gateway();
        gateway.handle_client_text(r#"{"type":"action","action":"start"}"#);
        gateway.handle_client_text(r#"{"type":"action","action":"exit"}"#);
        gateway.handle_client_text(r#"{"type":"action","action":"finish"}"#);
        assert_eq!(actions.recv().await.unwrap(), "Start Self-Screening");
        assert_eq!(actions.recv().await.unwrap(), "no");
        assert_eq!(actions.recv().await.unwrap(), "done");
    }

    #[tokio::test]
    async fn answers_pass_through_verbatim() {
        let (gateway, mut actions, _reset) = gateway();
        gateway.handle_client_text(
            r#"{"type":"action","action":"answer","data":{"answer":"A few times a day"}}"#,
        );
        assert_eq!(actions.recv().await.unwrap(), "A few times a day");
    }

    #[tokio::test]
    async fn reset_sets_the_signal_without_queueing() {
        let (gateway, mut actions, reset) = gateway();
        gateway.handle_client_text(r#"{"type":"action","action":"reset"}"#);
        assert!(reset.is_set());
        assert!(actions.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_actions_pass_through() {
        let (gateway, mut actions, _reset) = gateway();
        gateway.handle_client_text(r#"{"type":"action","action":"help"}"#);
        assert_eq!(actions.recv().await.unwrap(), "help");
    }

    #[tokio::test]
    async fn tts_status_stop_routes_to_remote_playback() {
        let (clients, mut rx) = broadcast::channel(16);
        let (actions, _actions_rx) = mpsc::unbounded_channel();
        let remote = Arc::new(RemotePlayback::new(clients.clone()));
        let gateway = Arc::new(ClientGateway::new(
            clients,
            actions,
            ResetSignal::new(),
            Some(Arc::clone(&remote)),
        ));

        let speaker = Arc::clone(&remote);
        let worker = tokio::spawn(async move {
            speaker
                .play("an utterance the client voices for several seconds")
                .await
        });
        let frame: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        let id = frame["utterance"].as_u64().unwrap();

        gateway.handle_client_text(&format!(
            r#"{{"type":"tts_status","status":"stop","utterance":{}}}"#,
            id
        ));
        tokio::time::timeout(std::time::Duration::from_secs(1), worker)
            .await
            .expect("stop should end the utterance")
            .unwrap()
            .unwrap();
    }

    #[test]
    fn garbage_frames_are_ignored() {
        let (gateway, _actions, reset) = gateway();
        gateway.handle_client_text("not json");
        gateway.handle_client_text(r#"{"type":"mystery"}"#);
        assert!(!reset.is_set());
    }

    #[tokio::test]
    async fn publish_updates_late_joiners_and_all_subscribers() {
        let (gateway, _actions, _reset) = gateway();
        let mut sub_a = gateway.subscribe();
        let mut sub_b = gateway.subscribe();

        let mut session = Session::new();
        session.enter(Stage::Welcome, "hello".to_string());
        gateway.publish(build_snapshot(&session));

        let frame_a: serde_json::Value =
            serde_json::from_str(&sub_a.recv().await.unwrap()).unwrap();
        let frame_b: serde_json::Value =
            serde_json::from_str(&sub_b.recv().await.unwrap()).unwrap();
        assert_eq!(frame_a, frame_b);
        assert_eq!(frame_a["type"], "state");
        assert_eq!(frame_a["page_id"], 2);

        // a client connecting now sees the same page
        let late: serde_json::Value = serde_json::from_str(&gateway.latest_frame()).unwrap();
        assert_eq!(late["page_id"], 2);
        assert_eq!(late["data"]["message"], json!("hello"));

        // one client going away never interrupts the others
        drop(sub_b);
        session.enter(Stage::Q1, "next".to_string());
        gateway.publish(build_snapshot(&session));
        let frame: serde_json::Value = serde_json::from_str(&sub_a.recv().await.unwrap()).unwrap();
        assert_eq!(frame["page_id"], 3);
    }
}
