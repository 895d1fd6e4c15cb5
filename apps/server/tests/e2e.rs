use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;

use parlor_chats::{RoomRegistry, StreamHandler};
use parlor_config::AppConfig;
use parlor_gateway::{create_router, GatewayState};
use parlor_orchestrator::{CompletionError, TextCompletion};
use parlor_runtime::BackendServices;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const AI: &str = "GEMINI";

struct EchoCompletion;

#[async_trait]
impl TextCompletion for EchoCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        Ok(format!("you said: {prompt}"))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

struct TestServer {
    address: SocketAddr,
    router: Router,
    registry: RoomRegistry,
    services: BackendServices,
    _db_dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let db_dir = TempDir::new().expect("create temp dir");
        let db_path = db_dir.path().join("parlor-test.db");

        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", db_path.to_string_lossy());
        config.database.max_connections = 5;
        config.assistant.enabled = false;

        let services = BackendServices::initialise(&config)
            .await
            .expect("initialise backend services");

        let registry = RoomRegistry::new();
        let handler = StreamHandler::new(registry.clone(), Arc::clone(&services.store))
            .with_assistant(Arc::new(EchoCompletion), AI);
        let state = GatewayState::new(handler, services.jwt.clone(), config.history.clone());
        let router = create_router(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let address = listener.local_addr().expect("local address");
        let app = router.clone();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server runs");
        });

        Self {
            address,
            router,
            registry,
            services,
            _db_dir: db_dir,
        }
    }

    fn token(&self, subject: &str) -> String {
        self.services.jwt.issue_token(subject).expect("issue token")
    }

    async fn connect(&self, room: &str, token: Option<&str>) -> Client {
        let url = match token {
            Some(token) => format!("ws://{}/v1/ws/{room}?token={token}", self.address),
            None => format!("ws://{}/v1/ws/{room}", self.address),
        };
        let (client, _) = connect_async(url).await.expect("websocket connects");
        client
    }

    async fn wait_for_members(&self, room: &str, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.registry.members(room).await.len() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("membership settles");
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request builds");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).expect("JSON body"))
    }
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("frame within timeout")
            .expect("stream open")
            .expect("frame reads");
        match message {
            WsMessage::Text(text) => return serde_json::from_str(&text).expect("JSON frame"),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn message_is_relayed_and_answered_by_assistant() {
    let server = TestServer::start().await;
    let alice_token = server.token("alice");
    let bob_token = server.token("bob");

    let mut alice = server.connect("lobby", Some(&alice_token)).await;
    let mut bob = server.connect("lobby", Some(&bob_token)).await;
    server.wait_for_members("lobby", 2).await;

    alice
        .send(WsMessage::Text(r#"{"content":"hi"}"#.to_string()))
        .await
        .expect("send message");

    let relayed = next_json(&mut bob).await;
    assert_eq!(relayed["room_id"], "lobby");
    assert_eq!(relayed["sender_id"], "alice");
    assert_eq!(relayed["content"], "hi");

    let echoed = next_json(&mut alice).await;
    assert_eq!(echoed["id"], relayed["id"]);

    let typing = next_json(&mut bob).await;
    assert_eq!(typing["type"], "typing_indicator");
    assert_eq!(typing["is_typing"], true);
    assert_eq!(typing["user_id"], AI);

    let reply = next_json(&mut bob).await;
    assert_eq!(reply["sender_id"], AI);
    assert_eq!(reply["content"], "you said: hi");
    assert_ne!(reply["id"], relayed["id"]);

    let stopped = next_json(&mut bob).await;
    assert_eq!(stopped["is_typing"], false);

    let (status, history) = server.get("/v1/rooms/lobby/messages", &bob_token).await;
    assert_eq!(status, StatusCode::OK);
    let senders: Vec<_> = history["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .map(|m| m["sender_id"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(senders, vec!["alice".to_string(), AI.to_string()]);

    alice.close(None).await.expect("close alice");
    server.wait_for_members("lobby", 1).await;
    bob.close(None).await.expect("close bob");
    server.wait_for_members("lobby", 0).await;
    assert!(server.registry.rooms().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn upgrade_without_valid_token_is_rejected() {
    let server = TestServer::start().await;
    let token = server.token("bob");
    let _bob = server.connect("lobby", Some(&token)).await;
    server.wait_for_members("lobby", 1).await;

    let urls = [
        format!("ws://{}/v1/ws/lobby", server.address),
        format!("ws://{}/v1/ws/lobby?token=not-a-jwt", server.address),
    ];
    for url in urls {
        match connect_async(url.as_str()).await {
            Err(WsError::Http(response)) => {
                assert_eq!(response.status().as_u16(), 401, "{url}");
            }
            Ok(_) => panic!("upgrade without identity succeeded for {url}"),
            Err(other) => panic!("unexpected error for {url}: {other}"),
        }
    }

    assert_eq!(server.registry.members("lobby").await.len(), 1);
    assert_eq!(server.registry.rooms().await, vec!["lobby".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn rooms_are_isolated() {
    let server = TestServer::start().await;
    let token = server.token("carol");

    let mut red = server.connect("red", Some(&token)).await;
    let mut blue = server.connect("blue", Some(&token)).await;
    server.wait_for_members("red", 1).await;
    server.wait_for_members("blue", 1).await;

    red.send(WsMessage::Text("only red".to_string()))
        .await
        .expect("send message");

    let relayed = next_json(&mut red).await;
    assert_eq!(relayed["content"], "only red");

    let nothing = tokio::time::timeout(Duration::from_millis(300), blue.next()).await;
    assert!(nothing.is_err(), "blue room must not receive red traffic");
}
