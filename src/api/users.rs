use actix_web::{http::header, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use super::failure;
use crate::{
    database::MongoDB,
    services::user_service::{self, Pagination},
    utils::DateRangeQuery,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UsersListQuery {
    /// 1-based page (default 1)
    pub page: Option<String>,
    /// Page size, 1..=100 (default 10)
    pub limit: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Case-insensitive substring of the user id
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserSearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ResultsExportQuery {
    pub exam_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePlanRequest {
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUsageRequest {
    /// Number or numeric string
    #[schema(value_type = Option<i64>)]
    pub exams_this_period: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkIntegrationRequest {
    pub integration_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartnerTokenRequest {
    /// Blank or null clears the token
    #[schema(value_type = Option<String>)]
    pub integrat_partner_token: Option<Value>,
}

#[utoipa::path(
    get,
    path = "/api/lucida/users",
    tag = "Users",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Users with weekly count and plan breakdowns"),
        (status = 400, description = "Invalid date"),
        (status = 500, description = "Database error")
    )
)]
pub async fn get_users(query: web::Query<DateRangeQuery>, db: web::Data<MongoDB>) -> HttpResponse {
    log::info!("👥 GET /lucida/users - from: {:?}, to: {:?}", query.from, query.to);

    let range = match query.parse() {
        Ok(range) => range,
        Err(e) => return failure(e, "Failed to fetch users"),
    };

    match user_service::users_overview(&db, range, Utc::now()).await {
        Ok(response) => {
            log::info!("✅ Users fetched: {} (weekly {})", response.count, response.weekly_count);
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch users"),
    }
}

#[utoipa::path(
    get,
    path = "/api/lucida/users/list",
    tag = "Users",
    params(UsersListQuery),
    responses(
        (status = 200, description = "Paginated user list"),
        (status = 400, description = "Invalid date"),
        (status = 500, description = "Database error")
    )
)]
pub async fn list_users(query: web::Query<UsersListQuery>, db: web::Data<MongoDB>) -> HttpResponse {
    let query = query.into_inner();
    let pagination = Pagination::new(
        query.page.as_deref().and_then(|p| p.trim().parse().ok()),
        query.limit.as_deref().and_then(|l| l.trim().parse().ok()),
    );

    log::info!(
        "👥 GET /lucida/users/list - page {} limit {} id {:?}",
        pagination.page,
        pagination.limit,
        query.id
    );

    let range = match (DateRangeQuery { from: query.from, to: query.to }).parse() {
        Ok(range) => range,
        Err(e) => return failure(e, "Failed to fetch user list"),
    };

    match user_service::users_list(&db, range, query.id.as_deref(), pagination).await {
        Ok(response) => {
            log::info!(
                "✅ User list page {}/{} ({} users total)",
                response.pagination.current_page,
                response.pagination.total_pages,
                response.pagination.total_users
            );
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch user list"),
    }
}

#[utoipa::path(
    get,
    path = "/api/lucida/users/search",
    tag = "Users",
    params(UserSearchQuery),
    responses(
        (status = 200, description = "User with exams and results, or data: null"),
        (status = 400, description = "Missing q"),
        (status = 500, description = "Database error")
    )
)]
pub async fn search_user(query: web::Query<UserSearchQuery>, db: web::Data<MongoDB>) -> HttpResponse {
    let q = query.q.as_deref().unwrap_or_default();
    log::info!("🔍 GET /lucida/users/search - q: {}", q);

    match user_service::search_user(&db, q, Utc::now()).await {
        Ok(response) => {
            match &response.data {
                Some(data) => log::info!(
                    "✅ User found: {} ({} exams, {} results)",
                    data.user.id,
                    data.counts.exams,
                    data.counts.results
                ),
                None => log::info!("🔍 No user matches '{}'", q),
            }
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to search user"),
    }
}

#[utoipa::path(
    patch,
    path = "/api/lucida/users/{id}/plan",
    tag = "Users",
    request_body = UpdatePlanRequest,
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Plan updated"),
        (status = 400, description = "Invalid plan"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_plan(
    path: web::Path<String>,
    body: web::Json<UpdatePlanRequest>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("📝 PATCH /lucida/users/{}/plan - {:?}", user_id, body.plan);

    match user_service::update_plan(&db, &user_id, body.plan.as_deref()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(e, "Failed to update user plan"),
    }
}

#[utoipa::path(
    patch,
    path = "/api/lucida/users/{id}/usage",
    tag = "Users",
    request_body = UpdateUsageRequest,
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Usage updated"),
        (status = 400, description = "Missing or invalid examsThisPeriod"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_usage(
    path: web::Path<String>,
    body: web::Json<UpdateUsageRequest>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("📝 PATCH /lucida/users/{}/usage - {:?}", user_id, body.exams_this_period);

    match user_service::update_usage(&db, &user_id, body.exams_this_period.as_ref()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(e, "Failed to update user usage"),
    }
}

#[utoipa::path(
    patch,
    path = "/api/lucida/users/{id}/integration",
    tag = "Users",
    request_body = LinkIntegrationRequest,
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User linked to the integration"),
        (status = 400, description = "Missing integrationId"),
        (status = 404, description = "Unknown user or integration")
    )
)]
pub async fn link_integration(
    path: web::Path<String>,
    body: web::Json<LinkIntegrationRequest>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("🔗 PATCH /lucida/users/{}/integration - {:?}", user_id, body.integration_id);

    match user_service::link_integration(&db, &user_id, body.integration_id.as_deref()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(e, "Failed to update user integration"),
    }
}

#[utoipa::path(
    delete,
    path = "/api/lucida/users/{id}/integration",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Integration removed"),
        (status = 404, description = "User not found")
    )
)]
pub async fn unlink_integration(path: web::Path<String>, db: web::Data<MongoDB>) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("🔗 DELETE /lucida/users/{}/integration", user_id);

    match user_service::unlink_integration(&db, &user_id).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(e, "Failed to remove user integration"),
    }
}

#[utoipa::path(
    patch,
    path = "/api/lucida/users/{id}/integrat-partner-token",
    tag = "Users",
    request_body = PartnerTokenRequest,
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Token updated or cleared"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_partner_token(
    path: web::Path<String>,
    body: web::Json<PartnerTokenRequest>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("🔑 PATCH /lucida/users/{}/integrat-partner-token", user_id);

    match user_service::update_partner_token(&db, &user_id, body.integrat_partner_token.as_ref()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(e, "Failed to update integrat partner token"),
    }
}

#[utoipa::path(
    get,
    path = "/api/lucida/users/{id}/results.csv",
    tag = "Users",
    params(("id" = String, Path, description = "User id"), ResultsExportQuery),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv"),
        (status = 404, description = "User not found")
    )
)]
pub async fn export_results(
    path: web::Path<String>,
    query: web::Query<ResultsExportQuery>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("📄 GET /lucida/users/{}/results.csv - exam: {:?}", user_id, query.exam_id);

    match user_service::export_user_results(&db, &user_id, query.exam_id.as_deref()).await {
        Ok(export) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ))
            .body(export.csv),
        Err(e) => failure(e, "Failed to export results"),
    }
}
