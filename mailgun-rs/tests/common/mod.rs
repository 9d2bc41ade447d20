//! Local stand-in for the provider REST API

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use mailgun_rs::config::{Config, DomainKeyConfig};
use parking_lot::Mutex;
use serde_json::json;

/// One `messages.mime` upload as the provider saw it
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub domain: String,
    pub authorization: String,
    pub to: String,
    pub message: Vec<u8>,
    pub message_file_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub uploads: Vec<Upload>,
    pub domain_queries: Vec<HashMap<String, String>>,
}

pub type Recorder = Arc<Mutex<Recorded>>;

pub fn basic(user: &str, key: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", user, key)))
}

async fn messages_mime(
    State(recorder): State<Recorder>,
    Path(domain): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut upload = Upload {
        domain: domain.clone(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        ..Upload::default()
    };

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.unwrap();
        match name.as_str() {
            "to" => upload.to = String::from_utf8_lossy(&data).into_owned(),
            "message" => {
                upload.message = data.to_vec();
                upload.message_file_name = file_name;
            }
            _ => {}
        }
    }

    let count = {
        let mut recorded = recorder.lock();
        recorded.uploads.push(upload);
        recorded.uploads.len()
    };

    match domain.as_str() {
        "forbidden.io" => (StatusCode::UNAUTHORIZED, "Forbidden".to_string()).into_response(),
        "noid.io" => Json(json!({ "message": "Queued. Thank you." })).into_response(),
        _ => Json(json!({
            "id": format!("<stub-{}@{}>", count, domain),
            "message": "Queued. Thank you."
        }))
        .into_response(),
    }
}

async fn domains(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    recorder.lock().domain_queries.push(query);

    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == basic("api", "account-key"))
        .unwrap_or(false);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "Forbidden".to_string()).into_response();
    }

    Json(json!({
        "total_count": 2,
        "items": [
            {"created_at": "Tue, 14 Feb 2023 18:36:12 GMT", "id": "1", "name": "mailiomail.com",
             "state": "active", "web_prefix": "email", "type": "custom"},
            {"created_at": "Wed, 15 Feb 2023 10:00:00 GMT", "id": "2", "name": "mmmm.io",
             "state": "active", "web_prefix": "email", "type": "custom"}
        ]
    }))
    .into_response()
}

/// Start the stub on an ephemeral port
pub async fn start_provider() -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/v3/:domain/messages.mime", post(messages_mime))
        .route("/v4/domains", get(domains))
        .with_state(recorder.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, recorder)
}

/// Config pointing at the stub with keys for the test domains
pub fn config_for(addr: SocketAddr) -> Config {
    let mut config = Config::default();
    config.mailgun.base_url = format!("http://{}/v3", addr);
    config.mailgun.domains_url = format!("http://{}/v4/domains", addr);
    config.mailgun.api_key = "account-key".to_string();
    config.mailgun.webhook_signing_key = "webhook-signing-key".to_string();
    config.mailgun.domain_keys = ["mailiomail.com", "forbidden.io", "noid.io"]
        .iter()
        .map(|domain| DomainKeyConfig {
            domain: domain.to_string(),
            api_key: format!("key-{}", domain),
        })
        .collect();
    config
}
