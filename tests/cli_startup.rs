use std::process::Output;

use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const GOOD_TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw0";
const WALLET: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

async fn run_binary(server: &MockServer, token: &str, chat_id: &str) -> Output {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_eth-wallet-notifier"))
        .arg("run")
        .current_dir(std::env::temp_dir())
        .env_clear()
        .env("TELEGRAM_BOT_TOKEN", token)
        .env("TELEGRAM_CHAT_ID", chat_id)
        .env("TELEGRAM_API_URL", server.uri())
        .env("ETHEREUM_RPC_URL", server.uri())
        .env("ETHEREUM_WALLETS", WALLET)
        .env("RUST_LOG", "error")
        .output()
        .await
        .unwrap()
}

async fn catch_all() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": "0x1"
        })))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn malformed_token_fails_before_polling() {
    let server = catch_all().await;

    let output = run_binary(&server, "not-a-token", "-100123").await;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("TELEGRAM_BOT_TOKEN"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_chat_id_fails_before_polling() {
    let server = catch_all().await;

    let output = run_binary(&server, GOOD_TOKEN, "my chat").await;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("TELEGRAM_CHAT_ID"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn failing_initial_rpc_connection_exits_non_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32603, "message": "internal error" }
        })))
        .mount(&server)
        .await;

    let output = run_binary(&server, GOOD_TOKEN, "-100123").await;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("initial RPC connection failed"));
}
