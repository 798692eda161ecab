use shieldwaf::config::{Config, WafOptions};
use shieldwaf::{TracingReporter, WafEngine, WafProxy};
use pingora::proxy::http_proxy_service;
use pingora::server::Server;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Backend that answers every request with `200 Hello`.
pub async fn spawn_mock_backend() -> u16 {
    spawn_counting_backend().await.0
}

/// Mock backend that also counts accepted connections.
pub async fn spawn_counting_backend() -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            if let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 65536];
                    let _ = socket.read(&mut buf).await;
                    let response = "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHello";
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        }
    });

    (port, hits)
}

pub fn create_test_config(backend_port: u16, waf: WafOptions) -> Arc<Config> {
    Arc::new(Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        backend_url: format!("http://127.0.0.1:{backend_port}"),
        waf,
        rules_path: None,
        webhook_url: None,
        webhook_token: None,
        log_format: "pretty".to_string(),
    })
}

pub async fn spawn_proxy(config: Arc<Config>) -> (u16, std::thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut conf_clone = (*config).clone();
    conf_clone.listen_addr = format!("127.0.0.1:{port}").parse().unwrap();
    let config = Arc::new(conf_clone);

    let handle = std::thread::spawn(move || {
        let engine = WafEngine::new(&config.waf, Arc::new(TracingReporter)).unwrap();
        let proxy = WafProxy::new(config.clone(), Arc::new(engine));

        let server_conf = Arc::new(pingora::server::configuration::ServerConf::default());
        let mut service = http_proxy_service(&server_conf, proxy);
        service.add_tcp(&config.listen_addr.to_string());

        let mut server = Server::new(None).unwrap();
        server.bootstrap();
        server.add_service(service);
        server.run_forever();
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    (port, handle)
}

/// Backend plus proxy; returns the proxy port.
pub async fn start(waf: WafOptions) -> u16 {
    let backend_port = spawn_mock_backend().await;
    let config = create_test_config(backend_port, waf);
    let (proxy_port, _) = spawn_proxy(config).await;
    proxy_port
}

/// Like [`start`], also returning the backend's connection counter.
pub async fn start_counting(waf: WafOptions) -> (u16, Arc<AtomicUsize>) {
    let (backend_port, hits) = spawn_counting_backend().await;
    let config = create_test_config(backend_port, waf);
    let (proxy_port, _) = spawn_proxy(config).await;
    (proxy_port, hits)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
