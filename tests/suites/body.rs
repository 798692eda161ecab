use crate::common::{client, start, start_counting};
use shieldwaf::WafOptions;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_clean_json_forwarded() {
    let port = start(WafOptions::default()).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/api/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"name":"Ada","roles":["admin","editor"],"age":36}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Hello");
}

#[tokio::test]
async fn test_nosql_operator_blocked() {
    let port = start(WafOptions::default()).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/login"))
        .header("Content-Type", "application/json")
        .body(r#"{"username":"admin","password":{"$ne":null}}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_form_body_blocked() {
    let port = start(WafOptions::default()).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/comments"))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body("author=eve&comment=%3Cscript%3Ealert(1)%3C%2Fscript%3E")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_multipart_file_content_ignored() {
    let port = start(WafOptions::default()).await;

    let body = concat!(
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
        "holiday photo\r\n",
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"photo\"; filename=\"a.svg\"\r\n",
        "Content-Type: image/svg+xml\r\n\r\n",
        "<svg onload=alert(1)></svg>\r\n",
        "--XBOUNDARY--\r\n"
    );
    let resp = client()
        .post(format!("http://127.0.0.1:{port}/upload"))
        .header("Content-Type", "multipart/form-data; boundary=XBOUNDARY")
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_multipart_field_blocked() {
    let port = start(WafOptions::default()).await;

    let body = concat!(
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"path\"\r\n\r\n",
        "../../etc/passwd\r\n",
        "--XBOUNDARY--\r\n"
    );
    let resp = client()
        .post(format!("http://127.0.0.1:{port}/upload"))
        .header("Content-Type", "multipart/form-data; boundary=XBOUNDARY")
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let options = WafOptions {
        body_max_size: 64,
        ..WafOptions::default()
    };
    let port = start(options).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/api"))
        .header("Content-Type", "text/plain")
        .body("a".repeat(256))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 413);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["statusCode"], 413);
}

#[tokio::test]
async fn test_unparsed_content_type_forwarded() {
    let port = start(WafOptions::default()).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/api"))
        .header("Content-Type", "application/octet-stream")
        .body("<script>alert(1)</script>")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_bad_header_on_json_post_never_reaches_backend() {
    let (port, hits) = start_counting(WafOptions::default()).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/api/users"))
        .header("Content-Type", "application/json")
        .header("User-Agent", "sqlmap/1.7.2#stable (https://sqlmap.org)")
        .body(r#"{"name":"Ada"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["message"], "Bad Request");
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/api/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"name":"Ada"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(hits.load(Ordering::SeqCst) >= 1);
}
