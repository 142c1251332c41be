use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use sea_orm::DbErr;
use serde_json::Value;
use tempfile::TempDir;

use common::storage::FilesystemBlobStore;
use common::{ShardAssigner, ShardLabel};
use upload_server::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, RateLimitConfig, ServerConfig, ShardConfig,
    StorageConfig,
};
use upload_server::entity::{api_key, file};
use upload_server::records::{NewFile, RecordStore};
use upload_server::state::AppState;
use upload_server::utils::clock::SystemClock;

pub const TEST_SALT: &str = "integration-salt";

pub mod routes {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/api/upload";
    pub const HEALTH_SLASH: &str = "/api/upload/";
    pub const SINGLE: &str = "/api/upload/single";
    pub const BULK: &str = "/api/upload/bulk";
    pub const OPENAPI: &str = "/api-docs/openapi.json";
}

pub mod fixtures {
    pub const PDF: &[u8] = b"%PDF-1.4\n1 0 obj << >> endobj\ntrailer << >>\n%%EOF\n";
    pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    pub const JPEG: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0";
}

/// In-memory record store with failure injection and call counters.
#[derive(Default)]
pub struct MemoryRecordStore {
    keys: Mutex<HashMap<String, i32>>,
    files: Mutex<Vec<file::Model>>,
    next_id: AtomicI32,
    fail_writes: AtomicBool,
    pub key_lookups: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn insert_key(&self, key: &str, user_id: i32) {
        self.keys.lock().unwrap().insert(key.to_string(), user_id);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn files(&self) -> Vec<file::Model> {
        self.files.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> usize {
        self.key_lookups.load(Ordering::SeqCst)
    }

    fn to_model(&self, new_file: NewFile) -> file::Model {
        file::Model {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            original_name: new_file.original_name,
            file_name: new_file.file_name,
            size: new_file.size,
            mime_type: new_file.mime_type,
            app_key: new_file.app_key,
            url: new_file.url,
            created_by_id: new_file.created_by_id,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_api_key(&self, key: &str) -> Result<Option<api_key::Model>, DbErr> {
        self.key_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.lock().unwrap().get(key).map(|&user_id| api_key::Model {
            id: user_id,
            key: key.to_string(),
            user_id,
            created_at: Utc::now(),
        }))
    }

    async fn create_file(&self, new_file: NewFile) -> Result<file::Model, DbErr> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("injected write failure".into()));
        }
        let model = self.to_model(new_file);
        self.files.lock().unwrap().push(model.clone());
        Ok(model)
    }

    async fn create_files(&self, new_files: Vec<NewFile>) -> Result<Vec<file::Model>, DbErr> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("injected transaction failure".into()));
        }
        let models: Vec<_> = new_files.into_iter().map(|f| self.to_model(f)).collect();
        self.files.lock().unwrap().extend(models.iter().cloned());
        Ok(models)
    }
}

/// A running test server.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub records: Arc<MemoryRecordStore>,
    storage: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    pub headers: reqwest::header::HeaderMap,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            headers,
            text,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

/// A file part for a multipart upload.
pub struct UploadPart {
    pub field: &'static str,
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl UploadPart {
    pub fn new(field: &'static str, file_name: &str, mime: &'static str, bytes: &[u8]) -> Self {
        Self {
            field,
            file_name: file_name.to_string(),
            mime,
            bytes: bytes.to_vec(),
        }
    }

    pub fn pdf(field: &'static str, file_name: &str) -> Self {
        Self::new(field, file_name, "application/pdf", fixtures::PDF)
    }
}

fn test_config(storage_root: &Path) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors: CorsConfig {
                allow_origins: vec!["*".to_string()],
                max_age: 3600,
            },
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
        },
        shard: ShardConfig {
            salt: TEST_SALT.to_string(),
        },
        storage: StorageConfig {
            root: storage_root.to_path_buf(),
            ..Default::default()
        },
        auth: AuthConfig::default(),
        rate_limit: RateLimitConfig::default(),
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn a server after letting the caller adjust the configuration.
    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let storage = TempDir::new().expect("Failed to create storage dir");
        let mut config = test_config(storage.path());
        configure(&mut config);

        let records = Arc::new(MemoryRecordStore::default());
        let blob_store =
            FilesystemBlobStore::new(config.storage.root.clone(), config.storage.max_file_size)
                .await
                .expect("Failed to create blob store");

        let state = AppState::new(
            config,
            records.clone(),
            Arc::new(blob_store),
            Arc::new(SystemClock),
        );
        let app = upload_server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            records,
            storage,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    /// POST a multipart form, with the API key header when `api_key` is given.
    pub async fn upload(
        &self,
        path: &str,
        api_key: Option<&str>,
        parts: Vec<UploadPart>,
    ) -> TestResponse {
        let mut form = Form::new().text("note", "ignored form value");
        for part in parts {
            let file_part = Part::bytes(part.bytes)
                .file_name(part.file_name)
                .mime_str(part.mime)
                .expect("Failed to set MIME type");
            form = form.part(part.field, file_part);
        }

        let mut req = self.client.post(self.url(path)).multipart(form);
        if let Some(key) = api_key {
            req = req.header("X-API-Key", key);
        }
        let res = req.send().await.expect("Failed to send multipart upload");

        TestResponse::from_response(res).await
    }

    /// Register an API key for `user_id` and return it.
    pub fn create_api_key(&self, key: &str, user_id: i32) -> String {
        self.records.insert_key(key, user_id);
        key.to_string()
    }

    pub fn shard_for(&self, api_key: &str, user_id: i32) -> ShardLabel {
        ShardAssigner::new(TEST_SALT).assign(api_key, user_id)
    }

    pub fn storage_root(&self) -> &Path {
        self.storage.path()
    }

    /// Every blob currently on disk, excluding in-flight temp files.
    pub fn stored_blobs(&self) -> Vec<PathBuf> {
        let mut blobs = Vec::new();
        for shard in std::fs::read_dir(self.storage_root()).unwrap().flatten() {
            if shard.file_name() == ".tmp" || !shard.path().is_dir() {
                continue;
            }
            for blob in std::fs::read_dir(shard.path()).unwrap().flatten() {
                blobs.push(blob.path());
            }
        }
        blobs
    }
}
