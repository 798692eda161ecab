//! `ShieldWAF` - request-inspection firewall in front of an HTTP backend.
//!
//! Copyright (C) 2026 Maverick
//! SPDX-License-Identifier: AGPL-3.0-only
//!
//! Initializes the application runtime, loads configuration, sets up logging,
//! and launches the proxy service.

use shieldwaf::{CompositeReporter, Config, TracingReporter, WafEngine, WafProxy, WebhookReporter};

use pingora::proxy::http_proxy_service;
use pingora::server::Server;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(non_blocking);

    if log_format.eq_ignore_ascii_case("pretty") {
        subscriber.init();
    } else {
        subscriber.json().init();
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let webhook = WebhookReporter::new(&config);
    let reporter = CompositeReporter::new().with(TracingReporter).with(webhook);
    let waf_engine = match WafEngine::new(&config.waf, Arc::new(reporter)) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!(error = %e, "Failed to build WAF rules");
            return ExitCode::FAILURE;
        }
    };

    info!(
        listen_addr = %config.listen_addr,
        backend_url = %config.backend_url,
        waf_mode = ?config.waf.mode,
        ignored_modules = ?config.waf.ignore_modules,
        ignored_routes = config.waf.ignore_routes.len(),
        rules_path = ?config.rules_path,
        log_format = %config.log_format,
        "Server initialized"
    );

    let mut server = match Server::new(None) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to create Pingora server");
            return ExitCode::FAILURE;
        }
    };
    server.bootstrap();

    let proxy = WafProxy::new(config.clone(), waf_engine);
    let mut proxy_service = http_proxy_service(&server.configuration, proxy);
    proxy_service.add_tcp(&config.listen_addr.to_string());
    server.add_service(proxy_service);

    server.run_forever();
}
