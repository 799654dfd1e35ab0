//! HTTP handlers and route configuration.

mod admin;
mod blog;
mod health;
mod markdown;
mod polls;
mod views;

#[cfg(test)]
mod tests;

use actix_web::{HttpRequest, HttpResponse, web};

use quill_shared::ErrorResponse;

use crate::middleware::error::AppError;
use crate::middleware::rate_limit::RateLimitMiddleware;
use crate::observability::RequestId;

/// Configure all application routes.
///
/// Every path ends in a slash; the app normalizes incoming paths to match.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::PathConfig::default()
            .error_handler(|err, _| AppError::NotFound(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::FormConfig::default()
            .error_handler(|err, _| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::BadRequest(err.to_string()).into()),
    )
    .route("/health/", web::get().to(health::health_check))
    .service(
        web::scope("/blog")
            .route("/", web::get().to(blog::post_list))
            .route("/search/", web::get().to(blog::post_search))
            .route("/sidebar/", web::get().to(blog::sidebar))
            .route("/tag/{tag_slug}/", web::get().to(blog::post_list_by_tag))
            .route(
                "/{year}/{month}/{day}/{slug}/",
                web::get().to(blog::post_detail),
            )
            // Write endpoints are throttled per client
            .service(
                web::resource("/{post_id}/comment/")
                    .route(web::post().to(blog::post_comment))
                    .default_service(web::to(method_not_allowed))
                    .wrap(RateLimitMiddleware),
            )
            .service(
                web::resource("/{post_id}/share/")
                    .route(web::get().to(blog::post_share_form))
                    .route(web::post().to(blog::post_share))
                    .default_service(web::to(method_not_allowed))
                    .wrap(RateLimitMiddleware),
            ),
    )
    .service(
        web::scope("/polls")
            .route("/", web::get().to(polls::index))
            .route("/{question_id}/", web::get().to(polls::detail))
            .route("/{question_id}/results/", web::get().to(polls::results))
            .service(
                web::resource("/{question_id}/vote/")
                    .route(web::post().to(polls::vote))
                    .default_service(web::to(method_not_allowed))
                    .wrap(RateLimitMiddleware),
            ),
    )
    .service(
        web::scope("/admin")
            .service(
                web::resource("/login/")
                    .route(web::post().to(admin::login))
                    .default_service(web::to(method_not_allowed))
                    .wrap(RateLimitMiddleware),
            )
            .service(
                web::resource("/posts/")
                    .route(web::get().to(admin::list_posts))
                    .route(web::post().to(admin::create_post))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/posts/{post_id}/")
                    .route(web::put().to(admin::update_post))
                    .default_service(web::to(method_not_allowed)),
            )
            .route("/comments/", web::get().to(admin::list_comments))
            .service(
                web::resource("/comments/{comment_id}/")
                    .route(web::patch().to(admin::moderate_comment))
                    .default_service(web::to(method_not_allowed)),
            )
            .route("/questions/", web::post().to(admin::create_question)),
    );
}

async fn method_not_allowed(request_id: RequestId) -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .json(ErrorResponse::method_not_allowed().with_request_id(request_id.as_str()))
}

/// Fallback for unmatched paths.
pub async fn not_found(req: HttpRequest, request_id: RequestId) -> HttpResponse {
    HttpResponse::NotFound().json(
        ErrorResponse::not_found(format!("No route for {}", req.path()))
            .with_request_id(request_id.as_str()),
    )
}
