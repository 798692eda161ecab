use crate::common::{client, start};
use shieldwaf::WafOptions;
use shieldwaf::config::WafMode;

#[tokio::test]
async fn test_clean_request_forwarded() {
    let port = start(WafOptions::default()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/products/42"))
        .header("User-Agent", "Mozilla/5.0 (X11; Linux x86_64)")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Hello");
}

#[tokio::test]
async fn test_waf_block_in_path() {
    let port = start(WafOptions::default()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/items/1'%20OR%20'1'='1"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["statusCode"], 400);
    assert_eq!(json["message"], "Bad Request");
}

#[tokio::test]
async fn test_waf_block_bad_bot() {
    let port = start(WafOptions::default()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/"))
        .header("User-Agent", "sqlmap/1.7.2#stable (https://sqlmap.org)")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_waf_block_in_header() {
    let port = start(WafOptions::default()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/"))
        .header("X-Custom", "<script>alert(1)</script>")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_query_not_scanned_by_default() {
    let port = start(WafOptions::default()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/search?q=%3Cscript%3E"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_query_scanned_when_enabled() {
    let options = WafOptions {
        scan_query: true,
        ..WafOptions::default()
    };
    let port = start(options).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/search?q=%3Cscript%3E"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_monitor_mode_forwards() {
    let options = WafOptions {
        mode: WafMode::Monitor,
        ..WafOptions::default()
    };
    let port = start(options).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/../../etc/passwd"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("x-waf-flagged").and_then(|v| v.to_str().ok()),
        Some("1")
    );
}
