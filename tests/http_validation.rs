//! Validation client against an in-process license server.

mod common;

use chrono::{TimeZone, Utc};
use common::{refused_url, MockServer, Reply};
use std::time::{Duration, Instant};
use ticketwarden::crypto::signing::{verify, PayloadValue};
use ticketwarden::{LicenseConfig, TicketwardenError, ValidationClient};

fn config(url: &str) -> LicenseConfig {
    let mut config = LicenseConfig::new("TW-TEST-KEY", url, "123456789");
    config.bot_version = "2.0.0".to_string();
    config
}

fn issued_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn sends_signed_request_in_wire_format() {
    let server = MockServer::start(Reply::json(200, r#"{"valid":true,"tier":"pro"}"#)).await;
    let client = ValidationClient::new(&config(&server.url)).unwrap();

    client.validate_online(issued_at()).await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/validate");
    assert!(request
        .header("content-type")
        .is_some_and(|v| v.starts_with("application/json")));
    assert!(request
        .header("user-agent")
        .is_some_and(|v| v.starts_with("ticketwarden/") && v.ends_with("bot/2.0.0")));

    let body = request.json();
    let object = body.as_object().unwrap();
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        ["bot_version", "guild_id", "license_key", "signature", "timestamp"]
    );
    assert_eq!(body["license_key"], "TW-TEST-KEY");
    assert_eq!(body["guild_id"], "123456789");
    assert_eq!(body["bot_version"], "2.0.0");
    assert_eq!(body["timestamp"], 1_736_942_400);
    assert_eq!(
        body["signature"],
        "6dd134b54827634347f2ed5952226024c4b09b1bcf2b0d3c384f9a6f65fa3209"
    );

    let payload = [
        ("license_key", PayloadValue::from("TW-TEST-KEY")),
        ("guild_id", PayloadValue::from("123456789")),
        ("bot_version", PayloadValue::from("2.0.0")),
        ("timestamp", PayloadValue::from(1_736_942_400i64)),
    ];
    assert!(verify(
        &payload,
        "TW-TEST-KEY",
        body["signature"].as_str().unwrap()
    ));
}

#[tokio::test]
async fn trailing_slash_in_server_url() {
    let server = MockServer::start(Reply::json(200, r#"{"valid":true}"#)).await;
    let client = ValidationClient::new(&config(&format!("{}/", server.url))).unwrap();

    client.validate_online(issued_at()).await.unwrap();
    assert_eq!(server.requests()[0].path, "/api/validate");
}

#[tokio::test]
async fn parses_valid_response() {
    let server = MockServer::start(Reply::json(
        200,
        r#"{"valid":true,"tier":"pro","expires_at":"2026-01-15T00:00:00Z",
            "features":{"api_access":true,"max_tickets":1000},
            "customer_info":{"name":"Example"}}"#,
    ))
    .await;
    let client = ValidationClient::new(&config(&server.url)).unwrap();

    let response = client.validate_online(issued_at()).await.unwrap();

    assert!(response.valid);
    assert_eq!(response.tier.as_deref(), Some("pro"));
    assert_eq!(
        response.expires_at,
        Some(Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap())
    );
    assert_eq!(response.features["max_tickets"].as_limit(), Some(1000));
    assert_eq!(response.features["api_access"].as_flag(), Some(true));
    assert!(response.customer_info.is_some());
}

#[tokio::test]
async fn invalid_license_carries_server_message() {
    let server = MockServer::start(Reply::json(
        200,
        r#"{"valid":false,"message":"License suspended"}"#,
    ))
    .await;
    let client = ValidationClient::new(&config(&server.url)).unwrap();

    let result = client.validate_online(issued_at()).await;
    assert!(matches!(
        result,
        Err(TicketwardenError::LicenseInvalid { message }) if message == "License suspended"
    ));
}

#[tokio::test]
async fn invalid_license_without_message() {
    let server = MockServer::start(Reply::json(200, r#"{"valid":false}"#)).await;
    let client = ValidationClient::new(&config(&server.url)).unwrap();

    let result = client.validate_online(issued_at()).await;
    assert!(matches!(
        result,
        Err(TicketwardenError::LicenseInvalid { message }) if message == "Unknown error"
    ));
}

#[tokio::test]
async fn server_error_status() {
    let server = MockServer::start(Reply::json(500, r#"{"error":"boom"}"#)).await;
    let client = ValidationClient::new(&config(&server.url)).unwrap();

    let result = client.validate_online(issued_at()).await;
    assert!(matches!(
        result,
        Err(TicketwardenError::ServerError { status: 500 })
    ));
}

#[tokio::test]
async fn malformed_success_body_is_protocol_error() {
    let server = MockServer::start(Reply::json(200, "<html>maintenance</html>")).await;
    let client = ValidationClient::new(&config(&server.url)).unwrap();

    let result = client.validate_online(issued_at()).await;
    assert!(matches!(result, Err(TicketwardenError::ProtocolError(_))));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server =
        MockServer::start(Reply::json(200, r#"{"valid":true}"#).delayed(Duration::from_secs(3)))
            .await;
    let mut config = config(&server.url);
    config.license_server.timeout = 1;
    let client = ValidationClient::new(&config).unwrap();

    let started = Instant::now();
    let result = client.validate_online(issued_at()).await;

    assert!(matches!(result, Err(TicketwardenError::Timeout)));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    let client = ValidationClient::new(&config(&refused_url().await)).unwrap();

    let result = client.validate_online(issued_at()).await;
    assert!(matches!(result, Err(TicketwardenError::NetworkError(_))));
}

#[tokio::test]
async fn empty_key_makes_no_connection() {
    let server = MockServer::start(Reply::json(200, r#"{"valid":true}"#)).await;
    let mut config = config(&server.url);
    config.license_key = String::new();
    let client = ValidationClient::new(&config).unwrap();

    let result = client.validate_online(issued_at()).await;

    assert!(matches!(result, Err(TicketwardenError::ConfigError(_))));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn placeholder_key_makes_no_connection() {
    let server = MockServer::start(Reply::json(200, r#"{"valid":true}"#)).await;
    let mut config = config(&server.url);
    config.license_key = "YOUR_LICENSE_KEY_HERE".to_string();
    let client = ValidationClient::new(&config).unwrap();

    let result = client.validate_online(issued_at()).await;

    assert!(matches!(result, Err(TicketwardenError::ConfigError(_))));
    assert!(server.requests().is_empty());
}
