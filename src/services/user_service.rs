use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ReturnDocument;
use serde::Serialize;
use serde_json::Value;

use super::{collect_documents, exam_service, result_service};
use crate::{
    database::{MongoDB, INTEGRATIONS, USERS},
    models::{
        bson_as_i64, Exam, ExamResponse, ExamResultResponse, User, UserPlan, UserResponse,
        UsageResponse,
    },
    utils::{from_bson_datetime, to_bson_datetime, to_iso_string, AppError, DateRange},
};

/// Window used to estimate `examsThisPeriod` when the user has no stored value
const USAGE_FALLBACK_DAYS: i64 = 30;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE: i64 = 1_000_000;

// ==================== RESPONSE MODELS ====================

/// Counters per plan shown on the dashboard cards. Other plans are ignored.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanBreakdown {
    pub trial: i64,
    pub monthly: i64,
    #[serde(rename = "semi-annual")]
    pub semi_annual: i64,
    pub annual: i64,
    pub custom: i64,
}

impl PlanBreakdown {
    fn slot(&mut self, plan: UserPlan) -> Option<&mut i64> {
        match plan {
            UserPlan::Trial => Some(&mut self.trial),
            UserPlan::Monthly => Some(&mut self.monthly),
            UserPlan::SemiAnnual => Some(&mut self.semi_annual),
            UserPlan::Annual => Some(&mut self.annual),
            UserPlan::Custom => Some(&mut self.custom),
            _ => None,
        }
    }

    /// Reads the `{ _id: plan, count }` documents of a `$group` stage.
    pub fn from_groups(groups: &[Document]) -> Self {
        let mut breakdown = PlanBreakdown::default();

        for group in groups {
            let plan = match group.get_str("_id").ok().and_then(|p| p.parse::<UserPlan>().ok()) {
                Some(plan) => plan,
                None => continue,
            };
            let count = group.get("count").and_then(bson_as_i64).unwrap_or(0);

            if let Some(slot) = breakdown.slot(plan) {
                *slot = count;
            }
        }

        breakdown
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersOverviewResponse {
    pub success: bool,
    pub data: Vec<UserResponse>,
    pub count: usize,
    pub weekly_count: u64,
    pub subscription_breakdown: PlanBreakdown,
    pub weekly_subscription_breakdown: PlanBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Page is kept within 1..=MAX_PAGE, limit within 1..=100.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Pagination {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit).max(0) as u64
    }

    pub fn info(&self, total_users: u64) -> PaginationInfo {
        let total = total_users as i64;
        let total_pages = (total + self.limit - 1) / self.limit;

        PaginationInfo {
            current_page: self.page,
            total_pages,
            total_users: total,
            limit: self.limit,
            has_next_page: self.page < total_pages,
            has_prev_page: self.page > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_users: i64,
    pub limit: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Serialize)]
pub struct UserListItem {
    #[serde(flatten)]
    pub user: UserResponse,
    pub clerk_id: String,
}

impl From<User> for UserListItem {
    fn from(user: User) -> Self {
        let id = user.id.clone();
        let mut response = UserResponse::from(user);

        // Older accounts use the e-mail address as their id
        response.email = Some(id.clone());
        response.display_name = Some(local_part(&id).to_string());

        UserListItem {
            user: response,
            clerk_id: id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsersListResponse {
    pub success: bool,
    pub data: Vec<UserListItem>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Serialize)]
pub struct SearchCounts {
    pub exams: usize,
    pub results: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    pub query: String,
    pub searched_at: String,
    pub is_exact_match: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchData {
    pub user: UserResponse,
    pub exams: Vec<ExamResponse>,
    pub results: Vec<ExamResultResponse>,
    pub counts: SearchCounts,
    pub search_metadata: SearchMetadata,
}

#[derive(Debug, Serialize)]
pub struct UserSearchResponse {
    pub success: bool,
    pub data: Option<UserSearchData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserUpdateData {
    pub user: UserResponse,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserUpdateResponse {
    pub success: bool,
    pub data: UserUpdateData,
}

impl UserUpdateResponse {
    fn new(user: User, message: String) -> Self {
        UserUpdateResponse {
            success: true,
            data: UserUpdateData {
                user: UserResponse::from(user),
                message,
            },
        }
    }
}

/// CSV body plus the file name offered to the browser
#[derive(Debug)]
pub struct ResultsExport {
    pub filename: String,
    pub csv: String,
}

// ==================== PURE HELPERS ====================

fn local_part(id: &str) -> &str {
    id.split('@').next().unwrap_or(id)
}

/// `(email, displayName)` as shown on the search page.
pub fn resolve_identity(user: &User) -> (String, String) {
    let email = user.email.clone().unwrap_or_else(|| user.id.clone());

    let display_name = match &user.username {
        Some(username) => username.clone(),
        None if email.contains('@') => local_part(&email).to_string(),
        None => user.id.clone(),
    };

    (email, display_name)
}

/// Whether `query` equals the id, e-mail or username, ignoring case.
pub fn is_exact_match(user: &User, query: &str) -> bool {
    let query = query.to_lowercase();

    std::iter::once(Some(user.id.as_str()))
        .chain([user.email.as_deref(), user.username.as_deref()])
        .flatten()
        .filter(|value| !value.is_empty())
        .any(|value| value.to_lowercase() == query)
}

fn case_insensitive(pattern: String) -> Bson {
    Bson::RegularExpression(mongodb::bson::Regex {
        pattern,
        options: "i".to_string(),
    })
}

fn identity_filter(pattern: String) -> Document {
    let regex = case_insensitive(pattern);
    doc! {
        "$or": [
            { "id": regex.clone() },
            { "email": regex.clone() },
            { "username": regex },
        ]
    }
}

fn list_filter(range: &DateRange, id_filter: Option<&str>) -> Document {
    let mut filter = range.created_at_filter();

    if let Some(id) = id_filter.map(str::trim).filter(|id| !id.is_empty()) {
        filter.insert("id", case_insensitive(regex::escape(id)));
    }

    filter
}

/// Leading integer of a string, like JavaScript's `parseInt`.
fn leading_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());

    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Validates the `examsThisPeriod` body field.
pub fn parse_exams_this_period(raw: Option<&Value>) -> Result<i64, AppError> {
    let value = match raw {
        None | Some(Value::Null) => {
            return Err(AppError::InvalidRequest("examsThisPeriod is required".to_string()))
        }
        Some(value) => value,
    };

    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => leading_integer(s),
        _ => None,
    };

    match parsed {
        Some(n) if n >= 0 => Ok(n),
        _ => Err(AppError::InvalidRequest(
            "examsThisPeriod must be a valid non-negative number".to_string(),
        )),
    }
}

/// Trimmed partner token; blank and null both clear the field.
pub fn normalize_partner_token(raw: Option<&Value>) -> Option<String> {
    let text = match raw {
        None | Some(Value::Null) => return None,
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn count_recent_exams(exams: &[Exam], now: DateTime<Utc>) -> i64 {
    let since = now - Duration::days(USAGE_FALLBACK_DAYS);
    exams
        .iter()
        .filter_map(|exam| exam.created_at.and_then(from_bson_datetime))
        .filter(|created| *created >= since)
        .count() as i64
}

// ==================== SERVICE FUNCTIONS ====================

async fn plan_breakdown(db: &MongoDB, filter: Document) -> Result<PlanBreakdown, AppError> {
    let pipeline = vec![
        doc! { "$match": filter },
        doc! { "$group": { "_id": "$subscription.plan", "count": { "$sum": 1 } } },
    ];

    let cursor = db.collection::<Document>(USERS).aggregate(pipeline).await?;
    let groups = collect_documents(cursor, "plan group").await?;
    Ok(PlanBreakdown::from_groups(&groups))
}

/// GET /api/lucida/users
pub async fn users_overview(
    db: &MongoDB,
    range: DateRange,
    now: DateTime<Utc>,
) -> Result<UsersOverviewResponse, AppError> {
    let collection = db.collection::<User>(USERS);
    let filter = range.created_at_filter();
    let weekly_filter = range.weekly_filter(now);

    let cursor = collection.find(filter.clone()).sort(doc! { "createdAt": -1 }).await?;
    let users = collect_documents(cursor, "user").await?;

    let (weekly_count, subscription_breakdown, weekly_subscription_breakdown) = futures::try_join!(
        async { Ok::<_, AppError>(collection.count_documents(weekly_filter.clone()).await?) },
        plan_breakdown(db, filter),
        plan_breakdown(db, weekly_filter.clone()),
    )?;

    let data: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();

    Ok(UsersOverviewResponse {
        success: true,
        count: data.len(),
        data,
        weekly_count,
        subscription_breakdown,
        weekly_subscription_breakdown,
    })
}

/// GET /api/lucida/users/list
pub async fn users_list(
    db: &MongoDB,
    range: DateRange,
    id_filter: Option<&str>,
    pagination: Pagination,
) -> Result<UsersListResponse, AppError> {
    let collection = db.collection::<User>(USERS);
    let filter = list_filter(&range, id_filter);

    let total_users = collection.count_documents(filter.clone()).await?;

    let cursor = collection
        .find(filter)
        .sort(doc! { "createdAt": -1 })
        .skip(pagination.skip())
        .limit(pagination.limit)
        .await?;
    let users = collect_documents(cursor, "user").await?;

    Ok(UsersListResponse {
        success: true,
        data: users.into_iter().map(UserListItem::from).collect(),
        pagination: pagination.info(total_users),
    })
}

async fn find_user_by_identity(db: &MongoDB, query: &str) -> Result<Option<User>, AppError> {
    let collection = db.collection::<User>(USERS);
    let escaped = regex::escape(query);

    let exact = collection
        .find_one(identity_filter(format!("^{}$", escaped)))
        .await?;
    if exact.is_some() {
        return Ok(exact);
    }

    Ok(collection.find_one(identity_filter(escaped)).await?)
}

/// GET /api/lucida/users/search
pub async fn search_user(
    db: &MongoDB,
    query: &str,
    now: DateTime<Utc>,
) -> Result<UserSearchResponse, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::InvalidRequest(
            "Search query parameter 'q' is required".to_string(),
        ));
    }

    let user = match find_user_by_identity(db, query).await? {
        Some(user) => user,
        None => {
            return Ok(UserSearchResponse {
                success: true,
                data: None,
                message: Some("No user found matching the search query".to_string()),
            })
        }
    };

    let exams = exam_service::exams_for_user(db, &user.id).await?;
    let exam_ids: Vec<String> = exams.iter().map(Exam::id_hex).collect();
    let results = result_service::results_for_exams(db, &exam_ids).await?;

    let is_exact = is_exact_match(&user, query);
    let (email, display_name) = resolve_identity(&user);
    let exams_this_period = user
        .stored_exams_this_period()
        .unwrap_or_else(|| count_recent_exams(&exams, now));
    let reset_date = user
        .usage
        .as_ref()
        .and_then(|usage| usage.exams_this_period_reset_date);

    let mut user_response = UserResponse::from(user);
    user_response.email = Some(email);
    user_response.display_name = Some(display_name);
    user_response.usage = Some(UsageResponse {
        exams_this_period: Some(exams_this_period),
        exams_this_period_reset_date: crate::utils::bson_to_iso(reset_date),
    });

    Ok(UserSearchResponse {
        success: true,
        data: Some(UserSearchData {
            user: user_response,
            counts: SearchCounts {
                exams: exams.len(),
                results: results.len(),
            },
            exams: exams.into_iter().map(ExamResponse::from).collect(),
            results: results.into_iter().map(ExamResultResponse::from).collect(),
            search_metadata: SearchMetadata {
                query: query.to_string(),
                searched_at: to_iso_string(now),
                is_exact_match: is_exact,
            },
        }),
        message: None,
    })
}

/// `$set` on the user with the given `id`, stamping `updatedAt`.
async fn set_user_fields(db: &MongoDB, user_id: &str, mut fields: Document) -> Result<User, AppError> {
    fields.insert("updatedAt", to_bson_datetime(Utc::now()));

    db.collection::<User>(USERS)
        .find_one_and_update(doc! { "id": user_id }, doc! { "$set": fields })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// PATCH /api/lucida/users/{id}/plan
pub async fn update_plan(
    db: &MongoDB,
    user_id: &str,
    plan: Option<&str>,
) -> Result<UserUpdateResponse, AppError> {
    let plan = plan
        .unwrap_or_default()
        .parse::<UserPlan>()
        .map_err(AppError::InvalidRequest)?;

    let user = set_user_fields(db, user_id, doc! { "subscription.plan": plan.as_str() }).await?;
    log::info!("📝 User {} moved to plan {}", user_id, plan);

    Ok(UserUpdateResponse::new(
        user,
        format!("User plan updated to {} successfully", plan),
    ))
}

/// PATCH /api/lucida/users/{id}/usage
pub async fn update_usage(
    db: &MongoDB,
    user_id: &str,
    exams_this_period: Option<&Value>,
) -> Result<UserUpdateResponse, AppError> {
    let usage = parse_exams_this_period(exams_this_period)?;

    let user = set_user_fields(db, user_id, doc! { "usage.examsThisPeriod": usage }).await?;
    log::info!("📝 User {} usage set to {} exams", user_id, usage);

    Ok(UserUpdateResponse::new(
        user,
        format!("User usage updated to {} exams successfully", usage),
    ))
}

/// PATCH /api/lucida/users/{id}/integration
pub async fn link_integration(
    db: &MongoDB,
    user_id: &str,
    integration_id: Option<&str>,
) -> Result<UserUpdateResponse, AppError> {
    let integration_id = integration_id.unwrap_or_default().trim();
    if integration_id.is_empty() {
        return Err(AppError::InvalidRequest("integrationId is required".to_string()));
    }

    let exists = db
        .collection::<Document>(INTEGRATIONS)
        .count_documents(doc! { "integrationId": integration_id })
        .limit(1)
        .await?
        > 0;
    if !exists {
        return Err(AppError::NotFound(
            "Integration not found for the provided integrationId".to_string(),
        ));
    }

    let user = set_user_fields(db, user_id, doc! { "integrationId": integration_id }).await?;
    log::info!("🔗 User {} linked to integration {}", user_id, integration_id);

    Ok(UserUpdateResponse::new(
        user,
        "User integration updated successfully".to_string(),
    ))
}

/// DELETE /api/lucida/users/{id}/integration
pub async fn unlink_integration(db: &MongoDB, user_id: &str) -> Result<UserUpdateResponse, AppError> {
    let user = set_user_fields(db, user_id, doc! { "integrationId": Bson::Null }).await?;
    log::info!("🔗 User {} unlinked from integration", user_id);

    Ok(UserUpdateResponse::new(
        user,
        "User integration removed successfully".to_string(),
    ))
}

/// PATCH /api/lucida/users/{id}/integrat-partner-token
pub async fn update_partner_token(
    db: &MongoDB,
    user_id: &str,
    token: Option<&Value>,
) -> Result<UserUpdateResponse, AppError> {
    let token = normalize_partner_token(token);
    let value = token.clone().map(Bson::String).unwrap_or(Bson::Null);

    let user = set_user_fields(db, user_id, doc! { "integratPartnerToken": value }).await?;
    log::info!(
        "🔑 Partner token for user {} {}",
        user_id,
        if token.is_some() { "updated" } else { "cleared" }
    );

    Ok(UserUpdateResponse::new(
        user,
        "Integrat partner token updated successfully".to_string(),
    ))
}

/// GET /api/lucida/users/{id}/results.csv
pub async fn export_user_results(
    db: &MongoDB,
    user_id: &str,
    exam_id: Option<&str>,
) -> Result<ResultsExport, AppError> {
    let user = db
        .collection::<User>(USERS)
        .find_one(doc! { "id": user_id })
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let exam_id = exam_id.map(str::trim).filter(|id| !id.is_empty());

    let exam_ids: Vec<String> = exam_service::exams_for_user(db, &user.id)
        .await?
        .iter()
        .map(Exam::id_hex)
        .filter(|id| exam_id.map_or(true, |wanted| wanted == id.as_str()))
        .collect();

    let results = result_service::results_for_exams(db, &exam_ids).await?;
    log::info!("📄 Exporting {} results for user {}", results.len(), user_id);

    let mut filename = format!("resultados_{}", result_service::sanitize_filename_part(&user.id));
    if let Some(exam_id) = exam_id {
        filename.push('_');
        filename.push_str(&result_service::sanitize_filename_part(exam_id));
    }
    filename.push_str(".csv");

    Ok(ResultsExport {
        filename,
        csv: result_service::results_to_csv(&results)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mongodb::bson;
    use serde_json::json;

    fn user(document: Document) -> User {
        bson::from_document(document).unwrap()
    }

    #[test]
    fn test_breakdown_ignores_unknown_plans() {
        let groups = vec![
            doc! { "_id": "trial", "count": 4 },
            doc! { "_id": "semi-annual", "count": 2_i64 },
            doc! { "_id": "free", "count": 9 },
            doc! { "_id": Bson::Null, "count": 3 },
            doc! { "_id": "gold", "count": 1 },
        ];

        let breakdown = PlanBreakdown::from_groups(&groups);
        assert_eq!(
            breakdown,
            PlanBreakdown { trial: 4, monthly: 0, semi_annual: 2, annual: 0, custom: 0 }
        );

        let json = serde_json::to_value(breakdown).unwrap();
        assert_eq!(json["semi-annual"], 2);
        assert_eq!(json.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_pagination_clamps_and_computes_pages() {
        let pagination = Pagination::new(Some(0), Some(500));
        assert_eq!(pagination, Pagination { page: 1, limit: 100 });

        let pagination = Pagination::new(Some(3), None);
        assert_eq!(pagination.skip(), 20);

        let info = pagination.info(25);
        assert_eq!(info.total_pages, 3);
        assert!(!info.has_next_page);
        assert!(info.has_prev_page);

        let info = Pagination::new(None, Some(-4)).info(0);
        assert_eq!(info.limit, 1);
        assert_eq!(info.total_pages, 0);
        assert!(!info.has_next_page);
        assert!(!info.has_prev_page);
    }

    #[test]
    fn test_pagination_huge_page_does_not_overflow() {
        let pagination = Pagination::new(Some(i64::MAX), Some(100));
        assert_eq!(pagination.page, MAX_PAGE);
        assert_eq!(pagination.skip(), ((MAX_PAGE - 1) * 100) as u64);

        let info = pagination.info(5);
        assert!(!info.has_next_page);
        assert!(info.has_prev_page);
    }

    #[test]
    fn test_list_filter_escapes_regex() {
        let filter = list_filter(&DateRange::default(), Some(" a.b+c@x.com "));
        match filter.get("id") {
            Some(Bson::RegularExpression(regex)) => {
                assert_eq!(regex.pattern, r"a\.b\+c@x\.com");
                assert_eq!(regex.options, "i");
            }
            other => panic!("unexpected id filter: {:?}", other),
        }

        assert!(list_filter(&DateRange::default(), Some("  ")).is_empty());
    }

    #[test]
    fn test_list_item_derives_display_fields_from_id() {
        let item = UserListItem::from(user(doc! { "id": "maria.souza@escola.com" }));
        let json = serde_json::to_value(item).unwrap();

        assert_eq!(json["email"], "maria.souza@escola.com");
        assert_eq!(json["displayName"], "maria.souza");
        assert_eq!(json["clerk_id"], "maria.souza@escola.com");
    }

    #[test]
    fn test_resolve_identity_fallbacks() {
        let named = user(doc! { "id": "user_1", "email": "ana@x.com", "username": "aninha" });
        assert_eq!(resolve_identity(&named), ("ana@x.com".into(), "aninha".into()));

        let email_only = user(doc! { "id": "user_2", "email": "bia@x.com" });
        assert_eq!(resolve_identity(&email_only), ("bia@x.com".into(), "bia".into()));

        let bare = user(doc! { "id": "user_3" });
        assert_eq!(resolve_identity(&bare), ("user_3".into(), "user_3".into()));
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let found = user(doc! { "id": "user_1", "email": "Ana@X.com" });
        assert!(is_exact_match(&found, "ana@x.com"));
        assert!(is_exact_match(&found, "USER_1"));
        assert!(!is_exact_match(&found, "ana"));
    }

    #[test]
    fn test_parse_exams_this_period() {
        assert_eq!(parse_exams_this_period(Some(&json!(5))).unwrap(), 5);
        assert_eq!(parse_exams_this_period(Some(&json!(5.9))).unwrap(), 5);
        assert_eq!(parse_exams_this_period(Some(&json!("12"))).unwrap(), 12);
        assert_eq!(parse_exams_this_period(Some(&json!(" 7 exams"))).unwrap(), 7);
        assert_eq!(parse_exams_this_period(Some(&json!(0))).unwrap(), 0);

        for invalid in [json!(-1), json!("abc"), json!(true), json!([1])] {
            assert!(matches!(
                parse_exams_this_period(Some(&invalid)),
                Err(AppError::InvalidRequest(_))
            ));
        }

        let missing = parse_exams_this_period(None).unwrap_err();
        assert_eq!(missing.to_string(), "Invalid request: examsThisPeriod is required");
        assert!(parse_exams_this_period(Some(&Value::Null)).is_err());
    }

    #[test]
    fn test_normalize_partner_token() {
        assert_eq!(normalize_partner_token(Some(&json!("  tok-1 "))), Some("tok-1".into()));
        assert_eq!(normalize_partner_token(Some(&json!("   "))), None);
        assert_eq!(normalize_partner_token(Some(&Value::Null)), None);
        assert_eq!(normalize_partner_token(None), None);
        assert_eq!(normalize_partner_token(Some(&json!(123))), Some("123".into()));
    }

    #[test]
    fn test_recent_exam_count_uses_thirty_day_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let at = |days: i64| bson::DateTime::from_millis((now - Duration::days(days)).timestamp_millis());

        let exams: Vec<Exam> = [1, 29, 31]
            .iter()
            .map(|days| bson::from_document(doc! { "createdAt": at(*days) }).unwrap())
            .collect();

        assert_eq!(count_recent_exams(&exams, now), 2);
    }

    #[tokio::test]
    async fn test_invalid_plan_is_rejected_before_touching_the_database() {
        let db = crate::database::test_support::offline_db().await;

        let err = update_plan(&db, "user_1", Some("gold")).await.unwrap_err();
        match err {
            AppError::InvalidRequest(msg) => assert!(msg.starts_with("Invalid plan. Must be one of:")),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(matches!(
            update_plan(&db, "user_1", None).await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_search_and_integration_are_rejected() {
        let db = crate::database::test_support::offline_db().await;

        assert!(matches!(
            search_user(&db, "   ", Utc::now()).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            link_integration(&db, "user_1", Some("  ")).await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    // Tests below need a running MongoDB (MONGODB_URI or DATABASE_URL)

    mod live {
        use super::*;
        use crate::database::test_support::{drop_live_db, live_db};
        use crate::database::{EXAMS, RESULTS};
        use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};

        async fn insert(db: &MongoDB, collection: &str, document: Document) {
            db.collection::<Document>(collection)
                .insert_one(document)
                .await
                .unwrap();
        }

        #[tokio::test]
        #[ignore] // Requires MongoDB to be running
        async fn test_updates_report_unknown_user_and_integration() {
            let db = live_db().await;
            insert(&db, USERS, doc! {
                "id": "ana@escola.com",
                "subscription": { "plan": "trial" },
                "createdAt": BsonDateTime::now(),
            })
            .await;
            insert(&db, INTEGRATIONS, doc! { "integrationId": "int-1", "integrationName": "Escola" }).await;

            let err = update_plan(&db, "ninguem@escola.com", Some("annual")).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(ref msg) if msg == "User not found"));
            let err = update_usage(&db, "ninguem@escola.com", Some(&json!(3))).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));

            let updated = update_plan(&db, "ana@escola.com", Some("annual")).await.unwrap();
            assert_eq!(
                updated.data.user.subscription.unwrap().plan.as_deref(),
                Some("annual")
            );

            let err = link_integration(&db, "ana@escola.com", Some("int-404")).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(ref msg) if msg.starts_with("Integration not found")));
            let err = link_integration(&db, "ninguem@escola.com", Some("int-1")).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(ref msg) if msg == "User not found"));

            let linked = link_integration(&db, "ana@escola.com", Some(" int-1 ")).await.unwrap();
            assert_eq!(linked.data.user.integration_id.as_deref(), Some("int-1"));

            let unlinked = unlink_integration(&db, "ana@escola.com").await.unwrap();
            assert_eq!(unlinked.data.user.integration_id, None);

            let cleared = update_partner_token(&db, "ana@escola.com", Some(&json!("   "))).await.unwrap();
            assert_eq!(cleared.data.user.integrat_partner_token, None);

            drop_live_db(&db).await;
        }

        #[tokio::test]
        #[ignore] // Requires MongoDB to be running
        async fn test_search_prefers_exact_match_and_loads_results() {
            let db = live_db().await;
            insert(&db, USERS, doc! { "id": "mariana@escola.com", "createdAt": BsonDateTime::now() }).await;
            insert(&db, USERS, doc! { "id": "ana@escola.com", "createdAt": BsonDateTime::now() }).await;

            let exam_id = ObjectId::new();
            insert(&db, EXAMS, doc! {
                "_id": exam_id,
                "userId": "ana@escola.com",
                "title": "Biologia",
                "createdAt": BsonDateTime::now(),
            })
            .await;
            insert(&db, RESULTS, doc! {
                "examId": exam_id.to_hex(),
                "email": "aluno@escola.com",
                "score": 7,
                "percentage": 0.7,
                "examTitle": "Biologia",
                "examQuestionCount": 10,
                "createdAt": BsonDateTime::now(),
            })
            .await;

            let now = Utc::now();
            let found = search_user(&db, "ANA@escola.com", now).await.unwrap().data.unwrap();
            assert_eq!(found.user.id, "ana@escola.com");
            assert!(found.search_metadata.is_exact_match);
            assert_eq!(found.counts.exams, 1);
            assert_eq!(found.counts.results, 1);
            assert_eq!(found.user.usage.unwrap().exams_this_period, Some(1));

            let partial = search_user(&db, "mariana", now).await.unwrap().data.unwrap();
            assert_eq!(partial.user.id, "mariana@escola.com");
            assert!(!partial.search_metadata.is_exact_match);

            let missing = search_user(&db, "zz-nobody", now).await.unwrap();
            assert!(missing.data.is_none());

            let export = export_user_results(&db, "ana@escola.com", None).await.unwrap();
            assert_eq!(export.filename, "resultados_ana_escola_com.csv");
            assert!(export.csv.contains("aluno@escola.com,Biologia,7,10,70.00%"));

            drop_live_db(&db).await;
        }
    }
}
