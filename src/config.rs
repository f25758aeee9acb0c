use std::env;

pub const DEFAULT_POSTHOG_HOST: &str = "https://us.posthog.com";
pub const DEFAULT_DATABASE_NAME: &str = "lucida";

/// Configuração lida do ambiente (.env carregado pelo main)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_name: Option<String>,
    /// Shared password for the dashboard login page
    pub dashboard_password: String,
    pub openai_api_key: Option<String>,
    pub posthog: PostHogConfig,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PostHogConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub project_id: Option<String>,
}

impl PostHogConfig {
    /// `(api_key, project_id)` when both are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_key.as_deref(), self.project_id.as_deref()) {
            (Some(key), Some(project)) => Some((key, project)),
            _ => None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| "Invalid PORT: must be a number between 0-65535".to_string())?;

        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("MONGODB_URI"))
            .map_err(|_| "DATABASE_URL (or MONGODB_URI) must be set".to_string())?;

        let dashboard_password = env::var("KINTAL_PASSWORD")
            .map_err(|_| "KINTAL_PASSWORD must be set".to_string())?;

        if dashboard_password.trim().is_empty() {
            return Err("KINTAL_PASSWORD must not be empty".to_string());
        }

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(AppConfig {
            host,
            port,
            database_url,
            database_name: non_empty_var("MONGODB_DATABASE"),
            dashboard_password,
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            posthog: PostHogConfig {
                host: non_empty_var("POSTHOG_HOST")
                    .unwrap_or_else(|| DEFAULT_POSTHOG_HOST.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                api_key: non_empty_var("POSTHOG_API_KEY"),
                project_id: non_empty_var("POSTHOG_PROJECT_ID"),
            },
            allowed_origins,
        })
    }

    /// Masks credentials in the database URL for logging
    pub fn masked_database_url(&self) -> String {
        mask_url(&self.database_url)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn mask_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at_pos)) if at_pos > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at_pos..])
        }
        _ => url.to_string(),
    }
}
