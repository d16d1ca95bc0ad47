//! Shared utilities for integration tests.

use std::fs;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;

use flate2::read::ZlibDecoder;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use vein::config::ServerConfig;
use vein::http::{HttpServer, ServerHandle};
use vein::lifecycle::Shutdown;
use vein::routing::RouterBuilder;

/// A running server over a temporary public root.
pub struct TestSite {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    _handle: ServerHandle,
    _root: TempDir,
}

impl TestSite {
    pub fn url(&self, target: &str) -> String {
        format!("http://{}{}", self.addr, target)
    }
}

impl Drop for TestSite {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Write the standard fixture files under `root`.
pub fn populate(root: &Path) {
    fs::write(root.join("index.html"), "<h1>static home</h1>").unwrap();
    fs::write(root.join("app.js"), "console.log('hi');").unwrap();
    fs::write(root.join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
    fs::write(root.join("_draft.html"), "<p>draft</p>").unwrap();
}

/// Start `workers` workers serving the routes configured by `routes`.
pub fn start_site<F>(workers: usize, routes: F) -> TestSite
where
    F: FnOnce(RouterBuilder) -> RouterBuilder,
{
    let root = tempfile::tempdir().unwrap();
    let public = root.path().join("public");
    fs::create_dir(&public).unwrap();
    populate(&public);
    fs::write(root.path().join("secret.txt"), "top secret").unwrap();

    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.workers = workers;
    config.site.public_root = public.clone();

    let listener = vein::net::bind(&config.listener).unwrap();
    let router = routes(RouterBuilder::new(&public)).build();
    let shutdown = Shutdown::new();
    let handle = HttpServer::new(config, router).spawn(listener, &shutdown).unwrap();

    TestSite {
        addr: handle.local_addr(),
        shutdown,
        _handle: handle,
        _root: root,
    }
}

/// Inflate a zlib-wrapped deflate body.
pub fn inflate(bytes: &[u8]) -> String {
    let mut out = String::new();
    ZlibDecoder::new(bytes).read_to_string(&mut out).unwrap();
    out
}

/// Send `request_line` verbatim and return the raw response.
///
/// Used where an HTTP client would normalize the target first.
pub async fn raw_request(addr: SocketAddr, request_line: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("{request_line}\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}
