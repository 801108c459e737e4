//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use probe_server::lifecycle::Shutdown;
use probe_server::observability::MemoryAccessLog;
use probe_server::{ProbeConfig, ProbeRegistry, ProbeServer};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A probe server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Arc<Shutdown>,
    pub access_log: Arc<MemoryAccessLog>,
    pub handle: JoinHandle<Result<(), probe_server::http::ServerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait until the access log holds `count` records or a second passes.
    #[allow(dead_code)]
    pub async fn wait_for_requests(&self, count: usize) {
        for _ in 0..100 {
            if self.access_log.requests().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Start a server over `registry` with an in-memory access log.
pub async fn start_server(config: ProbeConfig, registry: ProbeRegistry) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());
    let access_log = Arc::new(MemoryAccessLog::new());

    let server = ProbeServer::new(config, Arc::new(registry), shutdown.clone())
        .with_access_log(access_log.clone());
    let handle = tokio::spawn(server.run(listener));

    TestServer {
        addr,
        shutdown,
        access_log,
        handle,
    }
}

/// Client without connection pooling or proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
