use std::time::Duration;

// -----------------------------------------------
// GEXBOT API ENDPOINTS
// -----------------------------------------------
pub const GEXBOT_BASE_URL: &str = "https://api.gexbot.com";

/// Base URL, overridable for test servers.
pub fn base_url() -> String {
    std::env::var("GEXBOT_BASE_URL").unwrap_or_else(|_| GEXBOT_BASE_URL.to_string())
}

pub fn snapshot_url(ticker: &str, aggregation: &str, key: &str) -> String {
    format!(
        "{}/{}/classic/{}?key={}",
        base_url(),
        urlencoding::encode(ticker),
        urlencoding::encode(aggregation),
        urlencoding::encode(key)
    )
}

pub fn majors_url(ticker: &str, aggregation: &str, key: &str) -> String {
    format!(
        "{}/{}/classic/{}/majors?key={}",
        base_url(),
        urlencoding::encode(ticker),
        urlencoding::encode(aggregation),
        urlencoding::encode(key)
    )
}

// -----------------------------------------------
// TICKER MAP (source index -> charted future)
// -----------------------------------------------
pub const TICKERS: &[(&str, &str, &str)] = &[
    ("SPX", "ES", "SPX GEX for ES futures"),
    ("NDX", "NQ", "NDX GEX for NQ futures"),
];

// -----------------------------------------------
// DTE AGGREGATION PERIODS
// -----------------------------------------------
// zero = nearest expiry (0DTE when active), one = next expiry,
// full = all expirations combined
pub const DTE_PERIODS: &[(&str, &str)] = &[
    ("zero", "ZERO"),
    ("one", "ONE"),
    ("full", "FULL"),
];

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = "gex-levels/0.1";

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

// -----------------------------------------------
// RETRY CONFIG
// -----------------------------------------------
pub const RETRY_BASE_DELAY_MS: u64 = 200;
pub const RETRY_FACTOR: u64 = 3;
pub const RETRY_MAX_DELAY_SECS: u64 = 5;
pub const RETRY_MAX_ATTEMPTS: usize = 5;

// -----------------------------------------------
// RUNTIME CONFIGURATION
// -----------------------------------------------

/// API key; required by every endpoint.
pub fn api_key() -> Option<String> {
    std::env::var("GEXBOT_API_KEY").ok().filter(|k| !k.is_empty())
}

/// Directory the CSV / Pine files are written to.
pub fn output_dir() -> String {
    std::env::var("GEX_OUTPUT_DIR").unwrap_or_else(|_| ".".to_string())
}

/// Whether to emit a companion .pine file next to each CSV.
pub fn render_pine() -> bool {
    std::env::var("GEX_RENDER_PINE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Multiplier applied to strikes at render time (index -> future conversion).
pub fn price_multiplier() -> f64 {
    std::env::var("GEX_PRICE_MULTIPLIER")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1.0)
}
