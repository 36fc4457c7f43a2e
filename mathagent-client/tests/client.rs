use serde_json::json;
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use mathagent_client::{ChatClient, ClientError, MemoryTokenStore, Role, Session, TokenStore};

struct NoAuthorization;

impl Match for NoAuthorization {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

fn client_with_token(server: &MockServer, token: Option<&str>) -> ChatClient {
    let session = Session::in_memory();
    session.set_token(token).unwrap();
    ChatClient::builder()
        .base_url(server.uri())
        .session(session)
        .build()
        .unwrap()
}

fn user_body() -> serde_json::Value {
    json!({
        "id": 1,
        "email": "ada@example.com",
        "name": "Ada",
        "avatar_url": null,
        "provider": "google",
        "created_at": "2024-05-01T10:00:00.123456"
    })
}

fn assistant_message(id: i64, content: &str) -> serde_json::Value {
    json!({
        "id": id,
        "role": "assistant",
        "content": content,
        "has_graph": false,
        "graph_path": null,
        "created_at": "2024-05-01T10:00:01"
    })
}

#[tokio::test]
async fn current_user_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("Authorization", "Bearer tok-123"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_token(&server, Some("tok-123"));
    let user = client.current_user().await.unwrap();
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.provider, "google");
    assert!(user.avatar_url.is_none());
}

#[tokio::test]
async fn every_authenticated_operation_attaches_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("Authorization", "Bearer tok-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": assistant_message(2, "4"),
            "conversation_id": 42
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat/history"))
        .and(header("Authorization", "Bearer tok-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat/42"))
        .and(header("Authorization", "Bearer tok-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "title": "2+2",
            "created_at": "2024-05-01T10:00:00",
            "updated_at": "2024-05-01T10:00:01",
            "messages": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/chat/42"))
        .and(header("Authorization", "Bearer tok-abc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Conversation deleted"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/42/graph"))
        .and(header("Authorization", "Bearer tok-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "graph_base64": "iVBORw0KGgo=",
            "graph_path": "outputs/graph_42.png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_token(&server, Some("tok-abc"));
    client.send_message("2+2", None).await.unwrap();
    client.list_conversations().await.unwrap();
    client.get_conversation(42).await.unwrap();
    client.delete_conversation(42).await.unwrap();
    let graph = client.generate_graph(42).await.unwrap();
    assert_eq!(graph.graph_base64, "iVBORw0KGgo=");
}

#[tokio::test]
async fn health_check_omits_header_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .and(NoAuthorization)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_token(&server, None);
    let health = client.health().await.unwrap();
    assert_eq!(health.status, "healthy");
}

#[tokio::test]
async fn missing_token_fails_without_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_with_token(&server, None);
    assert!(matches!(
        client.current_user().await,
        Err(ClientError::Unauthorized)
    ));
    assert!(matches!(
        client.send_message("hi", None).await,
        Err(ClientError::Unauthorized)
    ));
    assert!(matches!(
        client.list_conversations().await,
        Err(ClientError::Unauthorized)
    ));
    assert!(matches!(
        client.get_conversation(1).await,
        Err(ClientError::Unauthorized)
    ));
    assert!(matches!(
        client.delete_conversation(1).await,
        Err(ClientError::Unauthorized)
    ));
    assert!(matches!(
        client.generate_graph(1).await,
        Err(ClientError::Unauthorized)
    ));
}

#[tokio::test]
async fn unauthorized_response_clears_session_and_storage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/history"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid or expired token"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_token("expired");
    let session = Session::new(store.clone());
    let client = ChatClient::builder()
        .base_url(server.uri())
        .session(session.clone())
        .build()
        .unwrap();

    let err = client.list_conversations().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!session.is_authenticated());
    assert_eq!(store.load().unwrap(), None);

    // The session is gone, so the retry never reaches the server.
    assert!(client.list_conversations().await.unwrap_err().is_unauthorized());
}

#[tokio::test]
async fn send_message_body_omits_missing_conversation_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({"content": "2+2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": assistant_message(11, "2 + 2 = 4"),
            "conversation_id": 42,
            "should_offer_graph": false,
            "graph_base64": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({"content": "and 3+3?", "conversation_id": 42})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": assistant_message(13, "6"),
            "conversation_id": 42,
            "should_offer_graph": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_token(&server, Some("tok"));
    let first = client.send_message("2+2", None).await.unwrap();
    assert_eq!(first.conversation_id, 42);
    assert_eq!(first.message.role, Role::Assistant);

    let second = client.send_message("and 3+3?", Some(42)).await.unwrap();
    assert!(second.should_offer_graph);
}

#[tokio::test]
async fn server_error_detail_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/999"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "Conversation not found"})),
        )
        .mount(&server)
        .await;

    let client = client_with_token(&server, Some("tok"));
    let err = client.get_conversation(999).await.unwrap_err();
    match &err {
        ClientError::RequestFailed { status, message } => {
            assert_eq!(*status, 404);
            assert_eq!(message, "Conversation not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn unreadable_error_body_uses_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/history"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let client = client_with_token(&server, Some("tok"));
    let err = client.list_conversations().await.unwrap_err();
    assert!(err.is_request_failure());
    assert_eq!(err.user_message(), "Request failed");
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn deleting_missing_conversation_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/chat/5"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "Conversation not found"})),
        )
        .mount(&server)
        .await;

    let client = client_with_token(&server, Some("tok"));
    let err = client.delete_conversation(5).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn undecodable_success_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "not-a-number"})))
        .mount(&server)
        .await;

    let client = client_with_token(&server, Some("tok"));
    let err = client.current_user().await.unwrap_err();
    assert!(matches!(err, ClientError::Malformed(_)));
}

#[tokio::test]
async fn unreachable_backend_is_transport_failure() {
    // Bind then release a port so nothing is listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let session = Session::in_memory();
    session.set_token(Some("tok")).unwrap();
    let client = ChatClient::builder()
        .base_url(uri)
        .session(session)
        .build()
        .unwrap();

    let err = client.list_conversations().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert!(err.is_request_failure());
}

#[tokio::test]
async fn graph_urls_resolve_against_base() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 8,
            "title": "plot y = x^2",
            "created_at": "2024-05-01T10:00:00",
            "updated_at": "2024-05-01T10:00:05",
            "messages": [
                {
                    "id": 1, "role": "user", "content": "plot y = x^2",
                    "has_graph": false, "graph_path": null,
                    "created_at": "2024-05-01T10:00:00"
                },
                {
                    "id": 2, "role": "assistant", "content": "Here is the parabola.",
                    "has_graph": true, "graph_path": "/graph/plot_8.png",
                    "created_at": "2024-05-01T10:00:03"
                },
                {
                    "id": 3, "role": "assistant", "content": "Hosted copy.",
                    "has_graph": true,
                    "graph_path": "https://storage.example.com/plot_8.png",
                    "created_at": "2024-05-01T10:00:05"
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_with_token(&server, Some("tok"));
    let conversation = client.get_conversation(8).await.unwrap();
    let urls: Vec<Option<String>> = conversation
        .messages
        .iter()
        .map(|message| client.graph_url(message))
        .collect();

    assert_eq!(urls[0], None);
    assert_eq!(
        urls[1].as_deref(),
        Some(format!("{}/graph/plot_8.png", server.uri()).as_str())
    );
    assert_eq!(
        urls[2].as_deref(),
        Some("https://storage.example.com/plot_8.png")
    );
}
