mod api;
mod config;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::{AppConfig, DEFAULT_DATABASE_NAME};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("🚀 Starting Kintal...");
    log::info!("📊 Database: {}", config.masked_database_url());

    if config.openai_api_key.is_none() {
        log::warn!("⚠️  OPENAI_API_KEY not set, /api/openai/costs will fail");
    }
    if config.posthog.credentials().is_none() {
        log::warn!("⚠️  POSTHOG_API_KEY/POSTHOG_PROJECT_ID not set, /api/posthog/* will fail");
    }

    // Initialize MongoDB connection
    let db = match database::MongoDB::new(
        &config.database_url,
        config.database_name.as_deref(),
        DEFAULT_DATABASE_NAME,
    )
    .await
    {
        Ok(db) => db,
        Err(e) => {
            log::error!("❌ Failed to connect to MongoDB: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("✅ MongoDB connected successfully");

    let host = config.host.clone();
    let port = config.port;

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    let db_data = web::Data::new(db);
    let config_data = web::Data::new(config);

    // Generate OpenAPI specification
    let openapi = api::swagger::ApiDoc::openapi();

    HttpServer::new(move || {
        let cors = config_data
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::CACHE_CONTROL,
                header::PRAGMA,
            ])
            .expose_headers(vec![header::CONTENT_TYPE, header::CONTENT_DISPOSITION])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(db_data.clone())
            .app_data(config_data.clone())
            .app_data(api::json_config())
            .app_data(api::query_config())
            .wrap(middleware::AuthGate)
            .wrap(middleware::SecurityHeaders)
            .wrap(cors)
            .wrap(middleware::RequestMetrics)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            // Metrics
            .route("/metrics", web::get().to(api::metrics::get_metrics))

            // ==================== PAGES ====================
            .route("/auth", web::get().to(api::pages::login_page))
            .route("/auth", web::post().to(api::pages::login))
            .route("/logout", web::get().to(api::pages::logout))
            .route("/", web::get().to(api::pages::home))
            .service(
                web::scope("/lucida")
                    .route("", web::get().to(api::pages::overview))
                    .route("/dashboard", web::get().to(api::pages::dashboard))
                    .route("/monitor", web::get().to(api::pages::monitor))
                    .route("/user-list", web::get().to(api::pages::user_list))
                    .route("/search-user", web::get().to(api::pages::search_user))
                    .route("/integrations", web::get().to(api::pages::integrations))
            )

            // ==================== LUCIDA (MongoDB) ====================
            .service(
                web::scope("/api/lucida")
                    .route("/users", web::get().to(api::users::get_users))
                    .route("/users/list", web::get().to(api::users::list_users))
                    .route("/users/search", web::get().to(api::users::search_user))
                    .route("/users/{id}/plan", web::patch().to(api::users::update_plan))
                    .route("/users/{id}/usage", web::patch().to(api::users::update_usage))
                    .route("/users/{id}/integration", web::patch().to(api::users::link_integration))
                    .route("/users/{id}/integration", web::delete().to(api::users::unlink_integration))
                    .route("/users/{id}/integrat-partner-token", web::patch().to(api::users::update_partner_token))
                    .route("/users/{id}/results.csv", web::get().to(api::users::export_results))
                    .route("/exams", web::get().to(api::exams::get_exams))
                    .route("/questions", web::get().to(api::exams::get_questions))
                    .route("/answers", web::get().to(api::answers::get_answers))
                    .route("/answers/key", web::get().to(api::answers::get_answer_key))
                    .route("/results/{id}", web::delete().to(api::answers::delete_result))
                    .route("/integrations", web::get().to(api::integrations::list_integrations))
                    .route("/integrations", web::post().to(api::integrations::create_integration))
                    .route("/integrations", web::delete().to(api::integrations::delete_integration))
                    .route("/chart-data", web::get().to(api::chart::get_chart_data))
            )

            // ==================== EXTERNAL APIs ====================

            // OpenAI: organization costs in BRL
            .service(
                web::scope("/api/openai")
                    .route("/costs", web::get().to(api::costs::get_costs))
            )

            // PostHog: $exception events
            .service(
                web::scope("/api/posthog/errors")
                    .route("", web::get().to(api::errors::list_errors))
                    .route("/types", web::get().to(api::errors::error_types))
                    .route("/stats", web::get().to(api::errors::error_stats))
                    .route("/chart-data", web::get().to(api::errors::error_chart))
            )
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
