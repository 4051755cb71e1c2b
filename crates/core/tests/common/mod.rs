//! Shared fixtures for integration tests: in-process fake platforms and
//! throwaway git repositories.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::http::HeaderMap;
use axum::Router;

use activity_importer_core::config::MirrorConfig;

/// One request seen by a fake platform.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn page(&self) -> u32 {
        self.query
            .get("page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(1)
    }
}

/// Thread-safe request log shared between handlers and assertions.
#[derive(Debug, Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<Recorded>>>);

impl RequestLog {
    pub fn record(&self, path: &str, query: &HashMap<String, String>, headers: &HeaderMap) {
        self.0.lock().unwrap().push(Recorded {
            path: path.to_string(),
            query: query.clone(),
            headers: headers.clone(),
        });
    }

    pub fn all(&self) -> Vec<Recorded> {
        self.0.lock().unwrap().clone()
    }

    pub fn matching(&self, path: &str) -> Vec<Recorded> {
        self.all().into_iter().filter(|r| r.path == path).collect()
    }
}

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{}", addr)
}

/// Bare repository standing in for the origin remote.
pub fn init_bare_origin(dir: &Path) -> PathBuf {
    let path = dir.join("origin.git");
    let mut opts = git2::RepositoryInitOptions::new();
    opts.bare(true).initial_head("main");
    git2::Repository::init_opts(&path, &opts).expect("failed to init bare origin");
    path
}

/// Bare origin whose HEAD is `branch`, holding one empty commit `message`
/// on that branch.
pub fn init_seeded_origin(dir: &Path, branch: &str, message: &str) -> PathBuf {
    let path = dir.join("seeded.git");
    let mut opts = git2::RepositoryInitOptions::new();
    opts.bare(true).initial_head(branch);
    let repo = git2::Repository::init_opts(&path, &opts).expect("failed to init bare origin");
    let tree_oid = repo.treebuilder(None).unwrap().write().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let sig = git2::Signature::now("seed", "seed@example.com").unwrap();
    repo.commit(
        Some(&format!("refs/heads/{}", branch)),
        &sig,
        &sig,
        message,
        &tree,
        &[],
    )
    .expect("failed to seed origin");
    path
}

pub fn mirror_config(repo_dir: &Path, origin: &Path) -> MirrorConfig {
    MirrorConfig {
        repo_dir: repo_dir.to_path_buf(),
        branch: "main".into(),
        origin_url: origin.display().to_string(),
        origin_token: String::new(),
        committer_name: "octo".into(),
        committer_email: "octo@example.com".into(),
    }
}

/// Messages of every commit on `branch` in `repo_path`, newest first.
pub fn branch_messages(repo_path: &Path, branch: &str) -> Vec<String> {
    let repo = git2::Repository::open(repo_path).expect("open repository");
    let reference = match repo.find_reference(&format!("refs/heads/{}", branch)) {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };
    let mut walk = repo.revwalk().unwrap();
    walk.push(reference.target().unwrap()).unwrap();
    walk.map(|oid| {
        let commit = repo.find_commit(oid.unwrap()).unwrap();
        commit.message().unwrap_or("").to_string()
    })
    .collect()
}
