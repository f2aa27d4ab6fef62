use actix_web::HttpResponse;

/// GET /health_check
///
/// Liveness only: answers without touching the token store or identity provider.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
