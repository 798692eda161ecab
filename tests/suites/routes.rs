use crate::common::{client, start};
use shieldwaf::WafOptions;

fn options(routes: &str) -> WafOptions {
    WafOptions::from_json(&format!(r#"{{"ignoreRoutes": {routes}}}"#)).unwrap()
}

#[tokio::test]
async fn test_disabled_route_passes_everything() {
    let port = start(options(r#"{"/webhooks/**": false}"#)).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/webhooks/stripe"))
        .header("Content-Type", "application/json")
        .header("User-Agent", "sqlmap/1.7")
        .body(r#"{"html":"<script>alert(1)</script>"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/other"))
        .header("User-Agent", "sqlmap/1.7")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_route_ignores_single_module() {
    let port = start(options(r#"{"/cms/:page": {"ignoreModules": ["xss"]}}"#)).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/cms/home"))
        .header("Content-Type", "application/json")
        .body(r#"{"content":"<iframe src=\"/embed\"></iframe>"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/cms/home"))
        .header("Content-Type", "application/json")
        .body(r#"{"content":"' OR '1'='1"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_method_scoped_rule() {
    let port = start(options(r#"{"/import": {"ignoreModules": "xss", "method": "POST"}}"#)).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/import"))
        .header("Content-Type", "text/plain")
        .body("<script>legacy()</script>")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/import"))
        .header("X-Note", "<script>legacy()</script>")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
