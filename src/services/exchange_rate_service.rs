use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::http_client;
use crate::utils::AppError;

// ExchangeRate-API (Free tier: 1,500 requests/month)
const EXCHANGERATE_API_BASE: &str = "https://api.exchangerate-api.com/v4/latest";

/// Used when the USD→BRL lookup fails so cost cards still render
pub const FALLBACK_USD_BRL_RATE: f64 = 5.2;

const CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
pub struct ExchangeRatesResponse {
    pub rates: HashMap<String, f64>,
}

impl ExchangeRatesResponse {
    pub fn rate_for(&self, to: &str) -> Result<f64, AppError> {
        self.rates
            .get(&to.to_uppercase())
            .copied()
            .ok_or_else(|| AppError::NotFound(format!("Currency '{}' not found in rates", to)))
    }
}

/// Busca taxa de câmbio entre duas moedas
pub async fn get_exchange_rate(from: &str, to: &str) -> Result<f64, AppError> {
    if from.eq_ignore_ascii_case(to) {
        return Ok(1.0);
    }

    log::info!("💱 Fetching exchange rate: {} -> {}", from, to);

    let url = format!("{}/{}", EXCHANGERATE_API_BASE, from.to_uppercase());
    let response = http_client()
        .get(&url)
        .header("Accept", "application/json")
        .timeout(Duration::from_secs(10))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AppError::Upstream {
            status: response.status().as_u16(),
            message: format!("Exchange rate API error: {}", response.status()),
        });
    }

    let rates: ExchangeRatesResponse = response.json().await?;
    let rate = rates.rate_for(to)?;

    log::info!("✅ Exchange rate {}/{}: {:.4}", from, to, rate);
    Ok(rate)
}

#[derive(Debug, Clone)]
struct CachedRate {
    rate: f64,
    fetched_at: Instant,
}

lazy_static! {
    static ref RATE_CACHE: Mutex<HashMap<String, CachedRate>> = Mutex::new(HashMap::new());
}

fn cache_key(from: &str, to: &str) -> String {
    format!("{}_{}", from.to_uppercase(), to.to_uppercase())
}

fn cached_rate(key: &str) -> Option<f64> {
    let cache = RATE_CACHE.lock().ok()?;
    cache
        .get(key)
        .filter(|cached| cached.fetched_at.elapsed() < CACHE_TTL)
        .map(|cached| cached.rate)
}

fn store_rate(key: String, rate: f64) {
    if let Ok(mut cache) = RATE_CACHE.lock() {
        cache.insert(key, CachedRate { rate, fetched_at: Instant::now() });
    }
}

/// Busca taxa com cache (1 hora de TTL)
pub async fn get_exchange_rate_cached(from: &str, to: &str) -> Result<f64, AppError> {
    let key = cache_key(from, to);

    if let Some(rate) = cached_rate(&key) {
        log::debug!("📦 Using cached rate for {}: {:.4}", key, rate);
        return Ok(rate);
    }

    let rate = get_exchange_rate(from, to).await?;
    store_rate(key, rate);
    Ok(rate)
}

/// USD→BRL rate for cost conversion, never failing.
pub async fn usd_to_brl_rate_or_fallback() -> f64 {
    match get_exchange_rate_cached("USD", "BRL").await {
        Ok(rate) => rate,
        Err(e) => {
            log::warn!(
                "⚠️  Exchange rate lookup failed, using fallback {:.2}: {}",
                FALLBACK_USD_BRL_RATE,
                e
            );
            FALLBACK_USD_BRL_RATE
        }
    }
}
