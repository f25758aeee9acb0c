use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    http::header,
    web, HttpResponse,
};
use askama::Template;
use serde::Deserialize;

use super::failure;
use crate::{
    config::AppConfig,
    middleware::auth::{AUTH_COOKIE, AUTH_COOKIE_MAX_AGE_SECS, AUTH_COOKIE_VALUE, LOGIN_PATH},
    models::UserPlan,
    utils::AppError,
};

pub const INVALID_PASSWORD_MESSAGE: &str = "Senha incorreta";

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub active: &'static str,
}

#[derive(Template)]
#[template(path = "lucida.html")]
pub struct OverviewTemplate {
    pub active: &'static str,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub active: &'static str,
}

#[derive(Template)]
#[template(path = "monitor.html")]
pub struct MonitorTemplate {
    pub active: &'static str,
}

#[derive(Template)]
#[template(path = "user_list.html")]
pub struct UserListTemplate {
    pub active: &'static str,
}

#[derive(Template)]
#[template(path = "search_user.html")]
pub struct SearchUserTemplate {
    pub active: &'static str,
    pub query: String,
    pub plans: Vec<&'static str>,
}

#[derive(Template)]
#[template(path = "integrations.html")]
pub struct IntegrationsTemplate {
    pub active: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchPageQuery {
    pub q: Option<String>,
}

fn render<T: Template>(template: &T) -> HttpResponse {
    match template.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(e) => failure(AppError::from(e), "Failed to render page"),
    }
}

fn auth_cookie(value: &str) -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, value.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(AUTH_COOKIE_MAX_AGE_SECS))
        .finish()
}

pub async fn login_page() -> HttpResponse {
    render(&LoginTemplate { error: None })
}

pub async fn login(form: web::Form<LoginForm>, config: web::Data<AppConfig>) -> HttpResponse {
    if form.password != config.dashboard_password {
        log::warn!("🔑 Dashboard login rejected");
        return render(&LoginTemplate {
            error: Some(INVALID_PASSWORD_MESSAGE.to_string()),
        });
    }

    log::info!("🔑 Dashboard login accepted");
    HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .cookie(auth_cookie(AUTH_COOKIE_VALUE))
        .finish()
}

pub async fn logout() -> HttpResponse {
    let mut cookie = auth_cookie("");
    cookie.make_removal();

    HttpResponse::Found()
        .insert_header((header::LOCATION, LOGIN_PATH))
        .cookie(cookie)
        .finish()
}

pub async fn home() -> HttpResponse {
    render(&HomeTemplate { active: "home" })
}

pub async fn overview() -> HttpResponse {
    render(&OverviewTemplate { active: "overview" })
}

pub async fn dashboard() -> HttpResponse {
    render(&DashboardTemplate { active: "dashboard" })
}

pub async fn monitor() -> HttpResponse {
    render(&MonitorTemplate { active: "monitor" })
}

pub async fn user_list() -> HttpResponse {
    render(&UserListTemplate { active: "user-list" })
}

pub async fn search_user(query: web::Query<SearchPageQuery>) -> HttpResponse {
    render(&SearchUserTemplate {
        active: "search-user",
        query: query.q.clone().unwrap_or_default(),
        plans: UserPlan::ALL.iter().map(UserPlan::as_str).collect(),
    })
}

pub async fn integrations() -> HttpResponse {
    render(&IntegrationsTemplate { active: "integrations" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PostHogConfig;
    use actix_web::{http::StatusCode, test, App};

    fn config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".into(),
            port: 3000,
            database_url: "mongodb://localhost:27017".into(),
            database_name: None,
            dashboard_password: "segredo".into(),
            openai_api_key: None,
            posthog: PostHogConfig::default(),
            allowed_origins: Vec::new(),
        }
    }

    #[test]
    fn test_login_template_shows_error() {
        let html = LoginTemplate {
            error: Some(INVALID_PASSWORD_MESSAGE.to_string()),
        }
        .render()
        .unwrap();
        assert!(html.contains("Senha incorreta"));

        let html = LoginTemplate { error: None }.render().unwrap();
        assert!(!html.contains("Senha incorreta"));
    }

    #[test]
    fn test_search_page_escapes_query() {
        let html = SearchUserTemplate {
            active: "search-user",
            query: "\"><script>".to_string(),
            plans: vec!["trial", "semi-annual"],
        }
        .render()
        .unwrap();

        assert!(!html.contains("\"><script>"));
        assert!(html.contains("<option value=\"semi-annual\">"));
    }

    #[test]
    fn test_search_page_scales_result_percentage() {
        let html = SearchUserTemplate {
            active: "search-user",
            query: String::new(),
            plans: vec!["trial"],
        }
        .render()
        .unwrap();

        assert!(html.contains("(Number(fraction || 0) * 100).toFixed(2)"));
        assert!(html.contains("row => formatPercentage(row.percentage)"));
        assert!(!html.contains("Number(row.percentage).toFixed(2)"));
    }

    #[actix_web::test]
    async fn test_login_flow() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .route("/auth", web::post().to(login))
                .route("/logout", web::get().to(logout)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth")
            .set_form([("password", "errada")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("Senha incorreta"));

        let req = test::TestRequest::post()
            .uri("/auth")
            .set_form([("password", "segredo")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == AUTH_COOKIE)
            .unwrap();
        assert_eq!(cookie.value(), AUTH_COOKIE_VALUE);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86_400)));

        let req = test::TestRequest::get().uri("/logout").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/auth");
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == AUTH_COOKIE)
            .unwrap();
        assert_eq!(cookie.value(), "");
    }

    #[actix_web::test]
    async fn test_pages_render() {
        let app = test::init_service(
            App::new()
                .route("/", web::get().to(home))
                .route("/lucida", web::get().to(overview))
                .route("/lucida/dashboard", web::get().to(dashboard))
                .route("/lucida/monitor", web::get().to(monitor))
                .route("/lucida/user-list", web::get().to(user_list))
                .route("/lucida/search-user", web::get().to(search_user))
                .route("/lucida/integrations", web::get().to(integrations)),
        )
        .await;

        for uri in [
            "/",
            "/lucida",
            "/lucida/dashboard",
            "/lucida/monitor",
            "/lucida/user-list",
            "/lucida/search-user?q=ana",
            "/lucida/integrations",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
            assert_eq!(
                resp.headers().get(header::CONTENT_TYPE).unwrap(),
                "text/html; charset=utf-8"
            );
        }
    }
}
