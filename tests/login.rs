use std::net::TcpListener;

use serde_json::json;
use streamable::{AuthErrorKind, Error, Step, StreamableClient};
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> StreamableClient {
    StreamableClient::new(Url::parse(&server.uri()).unwrap())
}

async fn mount_check_error(server: &MockServer, code: &str, message: &str) {
    Mock::given(method("POST"))
        .and(path("/check"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": code, "message": message})),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_returns_session_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/check"))
        .and(body_json(json!({"username": "bob", "password": "hunter2"})))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "session=xyz; Path=/; HttpOnly")
                .append_header("set-cookie", "user_name=bob; Path=/")
                .set_body_json(json!({"user_name": "bob"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = client_for(&server).login("bob", "hunter2").await.unwrap();

    let url = Url::parse(&server.uri()).unwrap().join("videos/abc123").unwrap();
    let cookies = session.cookie_header(&url).unwrap();
    assert!(cookies.contains("session=xyz"));
    assert!(cookies.contains("user_name=bob"));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    let client = StreamableClient::new(Url::parse(&format!("http://{}", address)).unwrap());

    let err = client.login("bob", "hunter2").await.unwrap_err();

    assert!(matches!(err, Error::Network { step: Step::Login, .. }));
    assert!(err.auth_kind().is_none());
}

#[tokio::test]
async fn unknown_user_is_user_not_found() {
    let server = MockServer::start().await;
    mount_check_error(&server, "UserDoesNotExist", "User does not exist").await;

    let err = client_for(&server)
        .login("nobody", "secret")
        .await
        .unwrap_err();

    assert_eq!(err.auth_kind(), Some(&AuthErrorKind::UserNotFound));
    assert_eq!(err.to_string(), "User does not exist");
}

#[tokio::test]
async fn wrong_password_is_incorrect_password() {
    let server = MockServer::start().await;
    mount_check_error(&server, "AuthError", "Password is incorrect").await;

    let err = client_for(&server).login("bob", "wrong").await.unwrap_err();

    assert_eq!(err.auth_kind(), Some(&AuthErrorKind::IncorrectPassword));
}

#[tokio::test]
async fn other_auth_codes_are_generic() {
    let server = MockServer::start().await;
    mount_check_error(&server, "AccountSuspended", "Account suspended").await;

    let err = client_for(&server).login("bob", "hunter2").await.unwrap_err();

    assert_eq!(
        err.auth_kind(),
        Some(&AuthErrorKind::Other("AccountSuspended".to_string()))
    );
}

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/check"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).login("bob", "hunter2").await.unwrap_err();

    match err {
        Error::Transport { step, status, body } => {
            assert_eq!(step, Step::Login);
            assert_eq!(status.as_u16(), 502);
            assert_eq!(body, "bad gateway");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/check"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).login("bob", "hunter2").await.unwrap_err();

    assert!(matches!(err, Error::Decode { step: Step::Login, .. }));
    assert!(err.auth_kind().is_none());
}
