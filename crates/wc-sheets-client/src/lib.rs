use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use wc_api_types::{
    SheetValueRange, TokenErrorResponse, TokenRequest, TokenResponse, Vehicle, Wheel, epoch_ms,
};
use wc_catalog::{CatalogSource, Table, table};

pub const DEFAULT_TOKEN_ENDPOINT: &str = "http://localhost:5175/auth/google-sheets-token";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const DEFAULT_VEHICLE_RANGE: &str = "Vehicles!A:G";
pub const DEFAULT_WHEEL_RANGE: &str = "Wheels!A:ZZ";

/// Tokens are refreshed this long before they actually expire.
pub const TOKEN_EXPIRY_MARGIN_MS: u64 = 5 * 60 * 1000;
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Where the catalog spreadsheets live and how to authenticate against them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfig {
    pub token_endpoint: String,
    pub client_email: String,
    pub vehicle_sheet_id: String,
    pub vehicle_range: String,
    pub wheel_sheet_id: String,
    pub wheel_range: String,
    pub api_base: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl SheetsConfig {
    /// Reads `WC_*` variables from the process environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str, default: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            token_endpoint: var("WC_TOKEN_ENDPOINT", DEFAULT_TOKEN_ENDPOINT),
            client_email: var("WC_CLIENT_EMAIL", ""),
            vehicle_sheet_id: var("WC_VEHICLE_SHEET_ID", ""),
            vehicle_range: var("WC_VEHICLE_RANGE", DEFAULT_VEHICLE_RANGE),
            wheel_sheet_id: var("WC_WHEEL_SHEET_ID", ""),
            wheel_range: var("WC_WHEEL_RANGE", DEFAULT_WHEEL_RANGE),
            api_base: var("WC_SHEETS_API_BASE", DEFAULT_SHEETS_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_email.trim().is_empty() {
            bail!("WC_CLIENT_EMAIL is not set");
        }
        if self.vehicle_sheet_id.trim().is_empty() || self.wheel_sheet_id.trim().is_empty() {
            bail!("both WC_VEHICLE_SHEET_ID and WC_WHEEL_SHEET_ID are required");
        }
        Ok(())
    }
}

/// A bare sheet name is widened to columns `A:Z`. Ranges that already carry a
/// `:` or end in a cell reference are left alone.
pub fn expand_range(range: &str) -> String {
    if range.contains(':') || ends_with_cell_reference(range) {
        return range.to_string();
    }
    format!("{range}!A:Z")
}

fn ends_with_cell_reference(range: &str) -> bool {
    range
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_uppercase())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedToken {
    access_token: String,
    expires_at_ms: u64,
}

impl CachedToken {
    fn is_fresh(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms.saturating_sub(TOKEN_EXPIRY_MARGIN_MS)
    }
}

/// Bearer tokens from the token-issuing service, cached until shortly before expiry.
pub struct TokenClient {
    endpoint: String,
    client_email: String,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenClient {
    pub fn new(endpoint: impl Into<String>, client_email: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client_email: client_email.into(),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_token(epoch_ms()) {
            return Ok(token);
        }

        let fresh = self.request_token().await?;
        let token = fresh.access_token.clone();
        *self.cache() = Some(fresh);
        Ok(token)
    }

    /// Drops the cached token so the next call hits the endpoint.
    pub fn invalidate(&self) {
        *self.cache() = None;
    }

    fn cached_token(&self, now_ms: u64) -> Option<String> {
        self.cache()
            .as_ref()
            .filter(|token| token.is_fresh(now_ms))
            .map(|token| token.access_token.clone())
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, Option<CachedToken>> {
        self.cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn request_token(&self) -> Result<CachedToken> {
        debug!("requesting access token for {}", self.client_email);
        let response = self
            .http
            .post(&self.endpoint)
            .json(&TokenRequest {
                client_email: self.client_email.clone(),
            })
            .send()
            .await
            .context("token endpoint transport")?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let body: TokenErrorResponse = serde_json::from_str(&text).unwrap_or_default();
            bail!("token acquisition failed: {status} - {}", body.describe());
        }

        let body: TokenResponse =
            serde_json::from_str(&text).context("token endpoint response parse")?;
        let access_token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow!("token endpoint returned no access_token"))?;
        let lifetime_secs = body.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        info!("access token acquired, expires in {} min", lifetime_secs / 60);
        Ok(CachedToken {
            access_token,
            expires_at_ms: epoch_ms().saturating_add(lifetime_secs.saturating_mul(1000)),
        })
    }
}

/// Catalog source reading the vehicle and wheel sheets through the values API.
pub struct SheetsClient {
    config: SheetsConfig,
    tokens: TokenClient,
    http: reqwest::Client,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> Self {
        let tokens = TokenClient::new(&config.token_endpoint, &config.client_email);
        Self {
            config,
            tokens,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &SheetsConfig {
        &self.config
    }

    fn values_url(&self, sheet_id: &str, range: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.config.api_base)
            .with_context(|| format!("invalid sheets api base {}", self.config.api_base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("sheets api base cannot carry a path"))?
            .extend([sheet_id, "values", &expand_range(range)]);
        Ok(url)
    }

    /// Raw 2-D cell array of one range; empty when the sheet returned no values.
    pub async fn fetch_values(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let token = self.tokens.access_token().await?;
        let url = self.values_url(sheet_id, range)?;
        debug!("fetching sheet values from {url}");

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .context("sheets values transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("sheets api HTTP {status}: {text}");
        }

        let body: SheetValueRange = response.json().await.context("sheets values parse")?;
        if body.values.is_empty() {
            warn!("sheet {sheet_id} range {range} returned no values");
        }
        Ok(body.values)
    }

    async fn fetch_table(&self, sheet_id: &str, range: &str, what: &str) -> Result<Option<Table>> {
        let values = self.fetch_values(sheet_id, range).await?;
        if values.len() < 2 {
            warn!("{what} sheet has no data rows");
            return Ok(None);
        }
        Ok(Some(Table::from_values(&values)))
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl CatalogSource for SheetsClient {
    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>> {
        let table = self
            .fetch_table(&self.config.vehicle_sheet_id, &self.config.vehicle_range, "vehicle")
            .await?;
        Ok(table.map(|t| table::decode_vehicles(&t)).unwrap_or_default())
    }

    async fn fetch_wheels(&self) -> Result<Vec<Wheel>> {
        let table = self
            .fetch_table(&self.config.wheel_sheet_id, &self.config.wheel_range, "wheel")
            .await?;
        Ok(table.map(|t| table::decode_wheels(&t)).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn bare_sheet_names_are_widened() {
        assert_eq!(expand_range("Vehicles"), "Vehicles!A:Z");
        assert_eq!(expand_range("Sheet1"), "Sheet1!A:Z");
        assert_eq!(expand_range("Vehicles!A:G"), "Vehicles!A:G");
        assert_eq!(expand_range("Wheels!B2"), "Wheels!B2");
        assert_eq!(expand_range("DATA"), "DATA");
    }

    #[test]
    fn token_goes_stale_five_minutes_early() {
        let token = CachedToken {
            access_token: "t".into(),
            expires_at_ms: 3_600_000,
        };
        assert!(token.is_fresh(0));
        assert!(token.is_fresh(3_600_000 - TOKEN_EXPIRY_MARGIN_MS - 1));
        assert!(!token.is_fresh(3_600_000 - TOKEN_EXPIRY_MARGIN_MS));

        let short = CachedToken {
            access_token: "t".into(),
            expires_at_ms: 60_000,
        };
        assert!(!short.is_fresh(0));
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = SheetsConfig::from_lookup(|name| match name {
            "WC_CLIENT_EMAIL" => Some("svc@example.iam".into()),
            "WC_WHEEL_RANGE" => Some("  ".into()),
            "WC_SHEETS_API_BASE" => Some("http://127.0.0.1:9/v4/".into()),
            _ => None,
        });

        assert_eq!(config.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
        assert_eq!(config.client_email, "svc@example.iam");
        assert_eq!(config.vehicle_range, DEFAULT_VEHICLE_RANGE);
        assert_eq!(config.wheel_range, DEFAULT_WHEEL_RANGE);
        assert_eq!(config.api_base, "http://127.0.0.1:9/v4");
        assert!(config.validate().is_err());
    }

    #[test]
    fn values_url_keeps_range_in_one_segment() -> Result<()> {
        let client = SheetsClient::new(SheetsConfig::default());
        let url = client.values_url("abc123", "Wheels")?;
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Wheels!A:Z"
        );
        Ok(())
    }

    #[derive(Clone, Default)]
    struct Upstream {
        token_hits: Arc<AtomicUsize>,
    }

    async fn token(State(upstream): State<Upstream>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        upstream.token_hits.fetch_add(1, Ordering::SeqCst);
        if body["client_email"] == "denied@example.iam" {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Failed to generate access token" })),
            );
        }
        if body["client_email"] == "forever@example.iam" {
            return (
                StatusCode::OK,
                Json(json!({ "access_token": "tok-1", "expires_in": u64::MAX })),
            );
        }
        (
            StatusCode::OK,
            Json(json!({ "access_token": "tok-1", "token_type": "Bearer" })),
        )
    }

    async fn values(
        Path((sheet_id, range)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<Value>) {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer tok-1") {
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }
        let body = match (sheet_id.as_str(), range.as_str()) {
            ("vehicles", "Vehicles!A:G") => json!({
                "range": range,
                "values": [
                    ["Year", "Make", "Model", "Color", "Image", "Swatch", "Lower"],
                    ["2024", "Subaru", "WRX VB", "Ignition Red", "a.png", "#d4161c", "low.png"],
                ],
            }),
            ("wheels", "Wheels!A:ZZ") => json!({
                "values": [["Brand", "Model", "Finish", "Wheel Image", "Swatch", "ID", "WRX VB"]],
            }),
            _ => json!({ "range": range }),
        };
        (StatusCode::OK, Json(body))
    }

    async fn spawn_upstream() -> Result<(String, Upstream)> {
        let upstream = Upstream::default();
        let app = Router::new()
            .route("/auth/google-sheets-token", post(token))
            .route("/v4/{sheet_id}/values/{range}", get(values))
            .with_state(upstream.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base = format!("http://{}", listener.local_addr()?);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok((base, upstream))
    }

    fn config_for(base: &str, client_email: &str) -> SheetsConfig {
        SheetsConfig {
            token_endpoint: format!("{base}/auth/google-sheets-token"),
            client_email: client_email.into(),
            vehicle_sheet_id: "vehicles".into(),
            wheel_sheet_id: "wheels".into(),
            api_base: format!("{base}/v4"),
            ..SheetsConfig::default()
        }
    }

    #[tokio::test]
    async fn fetches_catalog_and_reuses_token() -> Result<()> {
        let (base, upstream) = spawn_upstream().await?;
        let client = SheetsClient::new(config_for(&base, "svc@example.iam"));

        let vehicles = client.fetch_vehicles().await?;
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].lower_image, "low.png");

        // header row only
        assert!(client.fetch_wheels().await?.is_empty());
        // no values field at all
        assert!(client.fetch_values("other", "Sheet1").await?.is_empty());

        assert_eq!(upstream.token_hits.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_token_request_is_a_hard_failure() -> Result<()> {
        let (base, _) = spawn_upstream().await?;
        let client = SheetsClient::new(config_for(&base, "denied@example.iam"));

        let err = client.fetch_catalog().await.unwrap_err().to_string();
        assert!(err.contains("token acquisition failed: 403"), "{err}");
        assert!(err.contains("Failed to generate access token"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn huge_token_lifetime_is_clamped() -> Result<()> {
        let (base, upstream) = spawn_upstream().await?;
        let tokens = TokenClient::new(
            format!("{base}/auth/google-sheets-token"),
            "forever@example.iam",
        );

        assert_eq!(tokens.access_token().await?, "tok-1");
        assert_eq!(tokens.access_token().await?, "tok-1");
        assert_eq!(upstream.token_hits.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
