use super::*;
use crate::common::{Handler, Method, Request, Response};
use crate::error::Error;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct AppointmentRequest {
    patient: String,
    slot: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Ack {
    message: String,
}

fn health(_req: Request) -> Result<Ack, Error> {
    Ok(Ack { message: "ok".to_string() })
}

async fn show_post(req: Request) -> Result<Ack, Error> {
    let slug = req.param(0).unwrap_or("missing").to_string();
    Ok(Ack { message: format!("post:{}", slug) })
}

async fn request_appointment(_req: Request, body: AppointmentRequest) -> Result<Ack, Error> {
    Ok(Ack { message: format!("{} at {}", body.patient, body.slot) })
}

async fn delete_service(req: Request) -> Result<Redirect, Error> {
    let id = req.param(0).unwrap_or_default();
    Ok(Redirect::to(format!("/admin/services?deleted={}", id)))
}

fn body_json<T: for<'de> Deserialize<'de>>(res: Response) -> T {
    let body_str = String::from_utf8(res.body.unwrap()).unwrap();
    serde_json::from_str(&body_str).unwrap()
}

#[tokio::test]
async fn test_get_handler_matches() {
    let handler = get("/api/health", health);

    assert!(handler.matches("/api/health", &Method::GET));
    assert!(!handler.matches("/api/health", &Method::POST));
    assert!(!handler.matches("/api/health/extra", &Method::GET));
}

#[tokio::test]
async fn test_get_handler_execution() {
    let handler = get("/api/health", health);
    let res = handler.handle(Request::new(Method::GET, "/api/health".to_string())).await.unwrap();

    assert_eq!(res.status, 200);
    assert_eq!(res.headers.get("Content-Type"), Some(&"application/json".to_string()));
    let ack: Ack = body_json(res);
    assert_eq!(ack.message, "ok");
}

#[tokio::test]
async fn test_path_params_are_captured() {
    let handler = async_get(r"^/blog/([a-z0-9-]+)$", show_post);

    assert!(handler.matches("/blog/whitening-myths", &Method::GET));
    assert!(!handler.matches("/blog/Bad_Slug", &Method::GET));

    let res = handler
        .handle(Request::new(Method::GET, "/blog/whitening-myths".to_string()))
        .await
        .unwrap();
    let ack: Ack = body_json(res);
    assert_eq!(ack.message, "post:whitening-myths");
}

#[tokio::test]
async fn test_async_post_json_body() {
    let handler = async_post("/api/appointments", request_appointment);
    let body = serde_json::to_vec(&AppointmentRequest {
        patient: "Kim".to_string(),
        slot: "09:30".to_string(),
    })
    .unwrap();
    let req = Request::new(Method::POST, "/api/appointments".to_string())
        .with_header("Content-Type", "application/json; charset=utf-8")
        .with_body(body);

    let ack: Ack = body_json(handler.handle(req).await.unwrap());
    assert_eq!(ack.message, "Kim at 09:30");
}

#[tokio::test]
async fn test_async_post_form_body() {
    let handler = async_post("/api/appointments", request_appointment);
    let req = Request::new(Method::POST, "/api/appointments".to_string())
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_body(b"patient=Lee+Park&slot=14%3A00".to_vec());

    let ack: Ack = body_json(handler.handle(req).await.unwrap());
    assert_eq!(ack.message, "Lee Park at 14:00");
}

#[tokio::test]
async fn test_async_post_missing_body() {
    let handler = async_post("/api/appointments", request_appointment);
    let result = handler
        .handle(Request::new(Method::POST, "/api/appointments".to_string()))
        .await;

    match result {
        Err(Error::InvalidRequestBody(_)) => {}
        other => panic!("Expected InvalidRequestBody error, got {:?}", other.map(|r| r.status)),
    }
}

#[tokio::test]
async fn test_body_requires_supported_content_type() {
    let handler = async_post("/api/appointments", request_appointment);

    let no_ct = Request::new(Method::POST, "/api/appointments".to_string())
        .with_body(b"patient=a&slot=b".to_vec());
    assert!(matches!(handler.handle(no_ct).await, Err(Error::InvalidRequestBody(_))));

    let text = Request::new(Method::POST, "/api/appointments".to_string())
        .with_header("Content-Type", "text/plain")
        .with_body(b"patient=a&slot=b".to_vec());
    assert!(matches!(handler.handle(text).await, Err(Error::InvalidRequestBody(_))));
}

#[tokio::test]
async fn test_action_ignores_body_and_redirects() {
    let handler = async_action(r"^/admin/services/([0-9]+)/delete$", delete_service);
    // ボディは読まないので、Content-Typeが無くてもエラーにならない
    let req = Request::new(Method::POST, "/admin/services/7/delete".to_string())
        .with_body(b"garbage".to_vec());

    let res = handler.handle(req).await.unwrap();
    assert_eq!(res.status, 303);
    assert_eq!(res.headers.get("Location"), Some(&"/admin/services?deleted=7".to_string()));
}

#[tokio::test]
async fn test_post_optional_body() {
    let handler = async_post_optional("/api/revalidate", |_req: Request, body: Option<AppointmentRequest>| async move {
        Ok::<_, Error>(Ack { message: format!("{}", body.is_some()) })
    });

    let empty = Request::new(Method::POST, "/api/revalidate".to_string());
    let ack: Ack = body_json(handler.handle(empty).await.unwrap());
    assert_eq!(ack.message, "false");
}

#[tokio::test]
async fn test_sync_post_handler() {
    let handler = post("/echo", |_req, body: AppointmentRequest| {
        Ok(Ack { message: body.patient })
    });
    let req = Request::new(Method::POST, "/echo".to_string())
        .with_header("content-type", "application/json")
        .with_body(br#"{"patient":"Ito","slot":"10:00"}"#.to_vec());

    let ack: Ack = body_json(handler.handle(req).await.unwrap());
    assert_eq!(ack.message, "Ito");
}

#[tokio::test]
async fn test_custom_response_passthrough() {
    let handler = get("/robots.txt", |_req| Ok(Response::ok().text("User-agent: *")));
    let res = handler.handle(Request::new(Method::GET, "/robots.txt".to_string())).await.unwrap();

    assert_eq!(res.status, 200);
    assert_eq!(res.headers.get("Content-Type"), Some(&"text/plain; charset=utf-8".to_string()));
    assert_eq!(res.body_text(), "User-agent: *");
}
