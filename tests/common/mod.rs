#![allow(dead_code)]

use axum::{
    Router,
    http::{HeaderMap, Method},
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("captured body was not JSON")
    }
}

#[derive(Clone, Default)]
pub struct CaptureState {
    pub reqs: Arc<Mutex<Vec<Captured>>>,
}

impl CaptureState {
    pub fn push(&self, method: Method, path: &str, headers: HeaderMap, body: &[u8]) {
        self.reqs.lock().unwrap().push(Captured {
            method,
            path: path.to_string(),
            headers,
            body: body.to_vec(),
        });
    }

    pub fn all(&self) -> Vec<Captured> {
        self.reqs.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.reqs.lock().unwrap().len()
    }
}

pub async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{addr}")).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

/// Unsigned JWT carrying the account claim and an expiry `exp_offset_secs` from now.
pub fn make_jwt(account_id: &str, exp_offset_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = json!({
        "exp": chrono::Utc::now().timestamp() + exp_offset_secs,
        "https://api.openai.com/auth": { "chatgpt_account_id": account_id },
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

/// Credential record in the layout the Codex CLI writes.
pub fn write_auth_file(dir: &Path, access_token: &str, refresh_token: Option<&str>) -> PathBuf {
    let mut tokens = json!({ "access_token": access_token, "id_token": "id-0" });
    if let Some(refresh_token) = refresh_token {
        tokens["refresh_token"] = Value::String(refresh_token.to_string());
    }
    let record = json!({
        "OPENAI_API_KEY": null,
        "tokens": tokens,
        "last_refresh": "2025-01-01T00:00:00Z",
    });
    let path = dir.join("auth.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&record).expect("serialize record"))
        .expect("write auth file");
    path
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).expect("read file")).expect("parse json")
}
