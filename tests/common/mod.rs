#![allow(dead_code)]

use async_trait::async_trait;
use httpmock::MockServer;
use reqwest::Client;
use seo_batch::core::Sleeper;
use seo_batch::Settings;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-key";

type Hook = Box<dyn FnOnce() + Send>;

/// Records every requested wait instead of sleeping, and runs queued hooks
/// between attempts so a test can change what the server answers next.
#[derive(Default)]
pub struct ScriptedSleeper {
    waits: Mutex<Vec<Duration>>,
    hooks: Mutex<VecDeque<Hook>>,
}

impl ScriptedSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_next_sleep(&self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.lock().unwrap().push_back(Box::new(hook));
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for ScriptedSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
        let hook = self.hooks.lock().unwrap().pop_front();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// A server that outlives the test, so mocks can be swapped from sleeper hooks.
pub fn leaked_server() -> &'static MockServer {
    Box::leak(Box::new(MockServer::start()))
}

pub fn test_settings(server: &MockServer) -> Settings {
    settings_for(&server.url("/api"))
}

pub fn settings_for(base_url: &str) -> Settings {
    let mut settings = Settings::default();
    settings.api.base_url = base_url.to_string();
    settings.api.api_key = Some(API_KEY.to_string());
    settings.api.request_timeout = Duration::from_secs(1);
    settings.content.request_timeout = Duration::from_secs(1);
    settings
}

pub fn api_client(settings: &Settings) -> Client {
    Client::builder()
        .timeout(settings.api.request_timeout)
        .build()
        .unwrap()
}

pub fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|&s| Duration::from_secs(s)).collect()
}

/// Answers every request with a 200 whose body never completes, so the
/// per-attempt timeout fires while the client reads it. Returns the base URL.
pub async fn stalled_body_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"guide",
                    )
                    .await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });
    format!("http://{}", addr)
}
