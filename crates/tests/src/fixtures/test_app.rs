use std::net::SocketAddr;
use std::time::Duration;

use bson::oid::ObjectId;
use fieldchat_api::{build_router, state::AppState};
use fieldchat_client::{ClientConfig, Connection, ParticipantKind};
use fieldchat_config::Settings;
use serde_json::Value;
use tokio::net::TcpListener;

/// How long any test waits for a frame that should arrive.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a test waits to be reasonably sure a frame will not arrive.
pub const SILENCE: Duration = Duration::from_millis(300);

pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub state: AppState,
}

/// A resolved room and the participants it was created for.
pub struct SeededRoom {
    pub room_id: String,
    pub client_id: String,
    pub technician_id: String,
    pub intervention_id: String,
}

impl TestApp {
    /// Serves the full router on an ephemeral port with the in-memory store.
    pub async fn spawn() -> Self {
        Self::spawn_with(Settings::default()).await
    }

    pub async fn spawn_with(settings: Settings) -> Self {
        let state = AppState::from_settings(settings)
            .await
            .expect("app state");
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: reqwest::Client::new(),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_endpoint(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path))
    }

    pub async fn resolve_room(
        &self,
        client_id: &str,
        technician_id: &str,
        intervention_id: &str,
    ) -> Value {
        let resp = self
            .post("/api/room/resolve")
            .json(&serde_json::json!({
                "client_id": client_id,
                "technician_id": technician_id,
                "intervention_id": intervention_id,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200, "resolve failed");
        resp.json().await.unwrap()
    }

    /// Resolves a room for three fresh ids.
    pub async fn seed_room(&self) -> SeededRoom {
        let client_id = ObjectId::new().to_hex();
        let technician_id = ObjectId::new().to_hex();
        let intervention_id = ObjectId::new().to_hex();
        let room = self
            .resolve_room(&client_id, &technician_id, &intervention_id)
            .await;
        SeededRoom {
            room_id: room["id"].as_str().unwrap().to_string(),
            client_id,
            technician_id,
            intervention_id,
        }
    }

    /// Connects through the connector crate and joins `room_id`.
    pub async fn join_as(
        &self,
        participant_id: &str,
        kind: ParticipantKind,
        room_id: &str,
    ) -> Connection {
        let conn = self.connect_as(participant_id, kind).await;
        conn.join_room(room_id).await.unwrap();
        conn
    }

    pub async fn connect_as(&self, participant_id: &str, kind: ParticipantKind) -> Connection {
        let config = ClientConfig::new(participant_id, kind)
            .with_connect_timeout(DELIVERY_TIMEOUT)
            .with_request_timeout(DELIVERY_TIMEOUT);
        fieldchat_client::connect(&self.ws_endpoint(), config)
            .await
            .unwrap()
    }

    pub async fn history(&self, room_id: &str) -> Value {
        let resp = self
            .get(&format!("/api/room/{room_id}/message"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        resp.json().await.unwrap()
    }
}
