// tests/realtime_tests.rs

use comment_board::{config::Config, fanout::CommentsHub, routes, state::AppState};
use futures_util::{SinkExt, StreamExt};
use sqlx::sqlite::SqlitePoolOptions;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper function to spawn the app on a random port for testing.
/// Returns the bare address (e.g., "127.0.0.1:12345") so callers can
/// build both http:// and ws:// URLs from it.
async fn spawn_app() -> String {
    // 1. Create an in-memory pool. The single connection keeps the database
    //    alive for the whole test; a second connection would see an empty one.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory sqlite");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        client_url: "http://localhost:3000".to_string(),
        port: 0,
    };

    let state = AppState {
        pool,
        config,
        hub: CommentsHub::new(16),
    };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Registers a fresh user and returns (token, user id).
async fn register_user(client: &reqwest::Client, address: &str) -> (String, i64) {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = client
        .post(&format!("http://{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "password123"
        }))
        .send()
        .await
        .expect("Register failed");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    let token = body["token"].as_str().expect("Token not found").to_string();
    let id = body["data"]["user"]["id"].as_i64().expect("User id not found");

    (token, id)
}

/// Creates a comment over HTTP and returns its id.
async fn create_comment(client: &reqwest::Client, address: &str, token: &str, text: &str) -> i64 {
    let response = client
        .post(&format!("http://{}/api/comments", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "text": text }))
        .send()
        .await
        .expect("Create comment failed");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    body["data"]["comment"]["id"].as_i64().unwrap()
}

/// Opens a websocket connection, optionally authenticating via query token.
async fn connect_ws(address: &str, token: Option<&str>) -> WsStream {
    let url = match token {
        Some(token) => format!("ws://{}/ws?token={}", address, token),
        None => format!("ws://{}/ws", address),
    };

    let (socket, _) = connect_async(&url)
        .await
        .expect("Failed to open websocket connection");
    socket
}

/// Subscribes to the comments feed.
async fn join_comments(socket: &mut WsStream) {
    let frame = serde_json::json!({ "type": "join:comments" }).to_string();
    socket
        .send(Message::Text(frame))
        .await
        .expect("Failed to send join frame");
    // Give the server a moment to process the subscription
    tokio::time::sleep(Duration::from_millis(150)).await;
}

/// Waits for the next text frame and parses it as JSON.
async fn next_event(socket: &mut WsStream) -> serde_json::Value {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("Timed out waiting for a websocket event")
            .expect("Socket closed while waiting for an event")
            .expect("Websocket error");

        if let Message::Text(payload) = frame {
            return serde_json::from_str(&payload).expect("Event was not valid JSON");
        }
    }
}

/// Asserts that no frame arrives within half a second.
async fn assert_silent(socket: &mut WsStream) {
    let result = timeout(Duration::from_millis(500), socket.next()).await;
    assert!(result.is_err(), "Expected no websocket traffic");
}

#[tokio::test]
async fn joined_subscriber_receives_new_comments() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register_user(&client, &address).await;
    let mut socket = connect_ws(&address, Some(&token)).await;
    join_comments(&mut socket).await;

    // Act
    create_comment(&client, &address, &token, "broadcast me").await;

    // Assert
    let event = next_event(&mut socket).await;
    assert_eq!(event["type"], "comment:new");
    assert_eq!(event["payload"]["text"], "broadcast me");
    assert!(event["payload"]["author"]["username"].as_str().is_some());
    assert_eq!(event["payload"]["likes"], serde_json::json!([]));
}

#[tokio::test]
async fn subscriber_without_join_receives_nothing() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register_user(&client, &address).await;
    let mut socket = connect_ws(&address, Some(&token)).await;

    // Act: no join frame was sent
    create_comment(&client, &address, &token, "unseen").await;

    // Assert
    assert_silent(&mut socket).await;
}

#[tokio::test]
async fn leave_stops_the_feed() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register_user(&client, &address).await;
    let mut socket = connect_ws(&address, Some(&token)).await;
    join_comments(&mut socket).await;

    // 1. While joined, events flow
    create_comment(&client, &address, &token, "first").await;
    let event = next_event(&mut socket).await;
    assert_eq!(event["type"], "comment:new");

    // 2. Leave the feed
    let frame = serde_json::json!({ "type": "leave:comments" }).to_string();
    socket
        .send(Message::Text(frame))
        .await
        .expect("Failed to send leave frame");
    tokio::time::sleep(Duration::from_millis(150)).await;

    // 3. New comments no longer reach this socket
    create_comment(&client, &address, &token, "second").await;
    assert_silent(&mut socket).await;
}

#[tokio::test]
async fn reaction_toggles_broadcast_updates() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (author_token, _) = register_user(&client, &address).await;
    let (reactor_token, reactor_id) = register_user(&client, &address).await;
    let comment_id = create_comment(&client, &address, &author_token, "rate me").await;

    let mut socket = connect_ws(&address, Some(&reactor_token)).await;
    join_comments(&mut socket).await;

    // 1. A like broadcasts the refreshed comment
    client
        .post(&format!(
            "http://{}/api/comments/{}/like",
            address, comment_id
        ))
        .header("Authorization", format!("Bearer {}", reactor_token))
        .send()
        .await
        .expect("Failed to execute request");

    let event = next_event(&mut socket).await;
    assert_eq!(event["type"], "comment:update");
    assert_eq!(event["payload"]["id"], comment_id);
    assert_eq!(event["payload"]["likes"], serde_json::json!([reactor_id]));
    assert_eq!(event["payload"]["likeCount"], 1);

    // 2. Switching to a dislike broadcasts the swap
    client
        .post(&format!(
            "http://{}/api/comments/{}/dislike",
            address, comment_id
        ))
        .header("Authorization", format!("Bearer {}", reactor_token))
        .send()
        .await
        .expect("Failed to execute request");

    let event = next_event(&mut socket).await;
    assert_eq!(event["type"], "comment:update");
    assert_eq!(event["payload"]["likes"], serde_json::json!([]));
    assert_eq!(
        event["payload"]["dislikes"],
        serde_json::json!([reactor_id])
    );
}

#[tokio::test]
async fn delete_event_carries_the_comment_id() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register_user(&client, &address).await;
    let mut socket = connect_ws(&address, Some(&token)).await;
    join_comments(&mut socket).await;

    // 1. Create, consuming the comment:new event
    let comment_id = create_comment(&client, &address, &token, "short lived").await;
    let event = next_event(&mut socket).await;
    assert_eq!(event["type"], "comment:new");

    // 2. Delete
    let response = client
        .delete(&format!("http://{}/api/comments/{}", address, comment_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    // 3. The delete event carries the bare id
    let event = next_event(&mut socket).await;
    assert_eq!(event["type"], "comment:delete");
    assert_eq!(event["payload"], comment_id);
}

#[tokio::test]
async fn invalid_token_still_connects_as_guest() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register_user(&client, &address).await;

    // Act: a garbage token downgrades to a guest connection instead of failing
    let mut socket = connect_ws(&address, Some("definitely-not-a-jwt")).await;
    join_comments(&mut socket).await;
    create_comment(&client, &address, &token, "visible to guests").await;

    // Assert
    let event = next_event(&mut socket).await;
    assert_eq!(event["type"], "comment:new");
    assert_eq!(event["payload"]["text"], "visible to guests");
}

#[tokio::test]
async fn anonymous_connection_receives_events() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register_user(&client, &address).await;

    // Act: no token at all
    let mut socket = connect_ws(&address, None).await;
    join_comments(&mut socket).await;
    create_comment(&client, &address, &token, "public feed").await;

    // Assert
    let event = next_event(&mut socket).await;
    assert_eq!(event["type"], "comment:new");
}
