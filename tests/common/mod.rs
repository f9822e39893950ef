//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use minirest::config::{MinirestConfig, ProjectConfig};
use minirest::lifecycle::{startup, Shutdown};
use minirest::table::{read_table, RouteTable};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(50);

/// A scratch project tree.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> MinirestConfig {
        MinirestConfig {
            project: ProjectConfig {
                root: self.root().to_path_buf(),
                ..ProjectConfig::default()
            },
            ..MinirestConfig::default()
        }
    }

    /// Write a file under `src/`.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.source(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Delete a file under `src/`.
    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.source(relative)).unwrap();
    }

    pub fn source(&self, relative: &str) -> PathBuf {
        self.root().join("src").join(relative)
    }

    pub fn artifact(&self, relative: &str) -> PathBuf {
        self.root().join(".minirest").join(relative)
    }

    pub fn table(&self) -> RouteTable {
        read_table(&self.artifact("routes.json")).unwrap()
    }
}

/// A server running in the background.
pub struct Running {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(WAIT, self.task).await;
    }
}

async fn listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start `dev` mode on an ephemeral port.
pub async fn start_dev(config: MinirestConfig) -> Running {
    let (listener, addr) = listener().await;
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();

    let task = tokio::spawn(async move {
        startup::run_dev(&config, listener, handle).await.unwrap();
    });
    Running { addr, shutdown, task }
}

/// Start `serve` mode on an ephemeral port.
pub async fn start_serve(config: MinirestConfig) -> Running {
    let (listener, addr) = listener().await;
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();

    let task = tokio::spawn(async move {
        startup::run_serve(&config, listener, handle).await.unwrap();
    });
    Running { addr, shutdown, task }
}

/// Poll `method url` until the response has `status` and `body`.
pub async fn wait_for(method: reqwest::Method, url: &str, status: u16, body: &str) {
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + WAIT;
    let mut last = None;

    while tokio::time::Instant::now() < deadline {
        if let Ok(response) = client.request(method.clone(), url).send().await {
            let got = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            if got == status && text == body {
                return;
            }
            last = Some((got, text));
        }
        tokio::time::sleep(POLL).await;
    }
    panic!("{method} {url}: expected {status} {body:?}, last response {last:?}");
}

/// Poll until `check` holds for the persisted table.
pub async fn wait_for_table(project: &Project, check: impl Fn(&RouteTable) -> bool) -> RouteTable {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if let Ok(table) = read_table(&project.artifact("routes.json")) {
            if check(&table) {
                return table;
            }
        }
        tokio::time::sleep(POLL).await;
    }
    panic!("route table never reached the expected state");
}
