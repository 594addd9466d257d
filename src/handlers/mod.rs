//! Dashboard HTTP handlers

pub mod explain;
pub mod health;

use actix_web::HttpResponse;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Dashboard page
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}
