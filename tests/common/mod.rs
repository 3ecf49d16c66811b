//! Shared test infrastructure for texel integration tests.
//!
//! Provides a scripted HTTP client for the remote driver and helpers for
//! local directory trees.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use texel::http::{Accept, FormData, HttpClient, HttpResponse};
use texel::{BitbucketDriver, DirectoryDriver, DirectoryGrant, FileCodec, ManualClock, Settings};

/// Base url the fake API is reachable under.
pub const API_BASE: &str = "http://api.test";

pub fn codec() -> Arc<FileCodec> {
    Arc::new(FileCodec::with_default_locales().expect("Failed to build codec"))
}

/// HTTP client answering from a route table keyed by url path.
///
/// Unknown paths answer 404. Every request is recorded.
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<HashMap<String, HttpResponse>>,
    gets: Mutex<Vec<String>>,
    posts: Mutex<Vec<(String, FormData)>>,
    post_status: Mutex<Option<u16>>,
}

impl FakeHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `path` with a status and body.
    pub fn route(&self, path: &str, status: u16, body: impl Into<String>) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), HttpResponse::new(status, body));
    }

    /// Answer `path` with 200 and a JSON body.
    pub fn json(&self, path: &str, body: serde_json::Value) {
        self.route(path, 200, body.to_string());
    }

    /// Status returned for POST requests, 201 by default.
    pub fn fail_posts(&self, status: u16) {
        *self.post_status.lock().unwrap() = Some(status);
    }

    /// Paths of all GET requests so far.
    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    /// Number of GET requests for a path.
    pub fn get_count(&self, path: &str) -> usize {
        self.gets().iter().filter(|p| p.as_str() == path).count()
    }

    /// All POST requests so far.
    pub fn posts(&self) -> Vec<(String, FormData)> {
        self.posts.lock().unwrap().clone()
    }

    fn path_of(url: &str) -> String {
        let without_query = url.split_once('?').map(|(base, _)| base).unwrap_or(url);
        without_query
            .strip_prefix(API_BASE)
            .unwrap_or(without_query)
            .trim_start_matches('/')
            .to_string()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get(&self, url: &str, _accept: Accept) -> eyre::Result<HttpResponse> {
        let path = Self::path_of(url);
        self.gets.lock().unwrap().push(path.clone());
        let response = self.routes.lock().unwrap().get(&path).cloned();
        Ok(response.unwrap_or_else(|| HttpResponse::new(404, "")))
    }

    async fn post_form(&self, url: &str, form: FormData) -> eyre::Result<HttpResponse> {
        self.posts.lock().unwrap().push((Self::path_of(url), form));
        let status = self.post_status.lock().unwrap().unwrap_or(201);
        Ok(HttpResponse::new(status, ""))
    }
}

/// JSON of a branch ref.
pub fn branch_ref(repository: &str, name: &str, hash: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "target": {
            "hash": hash,
            "repository": {"full_name": repository},
        },
    })
}

/// A remote driver wired to a fake API.
pub struct RemoteEnv {
    pub http: Arc<FakeHttp>,
    pub clock: Arc<ManualClock>,
    pub driver: BitbucketDriver,
}

impl RemoteEnv {
    pub fn new() -> Self {
        let http = FakeHttp::new();
        let clock = Arc::new(ManualClock::new());
        let settings = Settings {
            api_base_url: API_BASE.to_string(),
            ..Settings::default()
        };
        let driver = BitbucketDriver::with_client("secret", &settings, codec(), http.clone(), clock.clone());
        Self { http, clock, driver }
    }

    /// Repository `team/app` with mainline `main` at `m1` and branch `feature` at `f1`.
    pub fn with_repository() -> Self {
        let env = Self::new();
        let http = &env.http;

        http.json("repositories/team/app/refs/branches/main", branch_ref("team/app", "main", "m1"));
        http.json("repositories/team/app/refs/branches/feature", branch_ref("team/app", "feature", "f1"));
        http.json(
            "repositories/team/app/branching-model",
            serde_json::json!({"development": {"branch": branch_ref("team/app", "main", "m1")}}),
        );
        env
    }
}

/// A temporary directory with a directory driver on top.
pub struct DirEnv {
    pub temp_dir: TempDir,
    pub driver: DirectoryDriver,
}

impl DirEnv {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let grant = DirectoryGrant::new("app", temp_dir.path());
        let driver = DirectoryDriver::new(grant, &settings, codec()).expect("Failed to create driver");
        Self { temp_dir, driver }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a file relative to the root, creating directories.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create dirs");
        fs::write(path, content).expect("Failed to write file");
    }

    /// Read a file relative to the root.
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel)).expect("Failed to read file")
    }
}

/// Sort texels by identity for order independent comparisons.
pub fn sorted(mut texels: Vec<texel::Texel>) -> Vec<texel::Texel> {
    texels.sort_by_key(texel::Texel::id);
    texels
}
