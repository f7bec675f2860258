use std::collections::HashMap;
use std::sync::Arc;

use dentalsite::auth::MemoryAuthProvider;
use dentalsite::common::http::DEFAULT_CSP;
use dentalsite::common::{Method, Request, Response, ResponseBuilder, StatusCode};
use dentalsite::config::SiteConfig;
use dentalsite::content::MemoryStore;
use dentalsite::error::Error;
use dentalsite::routes::{build_app, AppState};

fn assert_default_security_headers(headers: &HashMap<String, String>) {
    assert_eq!(headers.get("X-Content-Type-Options").map(|s| s.as_str()), Some("nosniff"));
    assert_eq!(headers.get("X-Frame-Options").map(|s| s.as_str()), Some("DENY"));
    assert_eq!(headers.get("Referrer-Policy").map(|s| s.as_str()), Some("strict-origin-when-cross-origin"));
    assert_eq!(headers.get("Content-Security-Policy").map(|s| s.as_str()), Some(DEFAULT_CSP));
}

#[test]
fn response_has_default_security_headers() {
    assert_default_security_headers(&Response::ok().headers);
    assert_default_security_headers(&Response::with_status(StatusCode::Created).headers);
    assert_default_security_headers(&ResponseBuilder::new(200).build().headers);
}

#[test]
fn error_responses_keep_security_headers() {
    assert_default_security_headers(&Response::from_error(&Error::NotFound("post".to_string())).headers);
    assert_default_security_headers(&Response::from_error(&Error::RateLimited(3)).headers);
    assert_default_security_headers(&Response::from_error(&Error::Redirect("/login".to_string())).headers);
}

#[test]
fn response_builder_allows_overrides() {
    let res = ResponseBuilder::with_status(StatusCode::Ok)
        .header("X-Frame-Options", "SAMEORIGIN")
        .build();
    assert_eq!(res.headers.get("X-Frame-Options").map(|s| s.as_str()), Some("SAMEORIGIN"));
    // 他の既定は維持
    assert_eq!(res.headers.get("X-Content-Type-Options").map(|s| s.as_str()), Some("nosniff"));
}

#[tokio::test]
async fn site_pages_carry_security_headers() {
    let state = Arc::new(AppState::new(
        SiteConfig::default(),
        Arc::new(MemoryStore::seeded()),
        Arc::new(MemoryAuthProvider::new()),
    )
    .unwrap());
    let app = build_app(state);

    for path in ["/", "/blog", "/login", "/admin", "/does-not-exist", "/api/health"] {
        let res = app.dispatch(Request::new(Method::GET, path.to_string())).await;
        assert_default_security_headers(&res.headers);
    }
}
