use std::fmt;
use std::time::Duration;

/// Upper bound on a single HTTP request, applied by the router.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime mode controlling how much error detail leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Production,
    Development,
}

impl RuntimeMode {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => RuntimeMode::Development,
            _ => RuntimeMode::Production,
        }
    }

    /// Whether error envelopes may carry driver-level details.
    pub fn exposes_error_details(self) -> bool {
        self == RuntimeMode::Development
    }
}

/// Connection settings for the MySQL store holding `KuberFinalMailFiles`.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Full `mysql://` URL. Takes precedence over the individual fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

/// Settings for the ZIP code coordinate resolver.
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    /// When false the resolver only uses the offline fallbacks.
    pub enabled: bool,
    pub base_url: String,
    pub timeout: Duration,
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Time budget for live lookups in one batch; must stay under `REQUEST_TIMEOUT`.
    pub batch_deadline: Duration,
    pub cache_capacity: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub mode: RuntimeMode,
    pub max_page_size: u32,
    pub database: DatabaseConfig,
    pub geocoder: GeocoderConfig,
}

impl Config {
    /// Loads the configuration from the process environment (and `.env`).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database: {}:{}/{} (pool size {})",
            config.database.host,
            config.database.port,
            config.database.name,
            config.database.max_connections
        );
        tracing::debug!(
            "Geocoder enabled: {}, base URL: {}",
            config.geocoder.enabled,
            config.geocoder.base_url
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let url = get("DATABASE_URL")
            .or_else(|| get("DB_URL"))
            .map(|url| {
                if !url.starts_with("mysql://") {
                    anyhow::bail!("DATABASE_URL must start with mysql://");
                }
                Ok(url)
            })
            .transpose()?;

        let (host, user, password, name) = if url.is_some() {
            (
                get("DB_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
                get("DB_USER").unwrap_or_default(),
                lookup("DB_PASSWORD").unwrap_or_default(),
                get("DB_NAME").unwrap_or_default(),
            )
        } else {
            (
                get("DB_HOST").ok_or_else(|| {
                    anyhow::anyhow!("DATABASE_URL or DB_HOST environment variable required")
                })?,
                get("DB_USER")
                    .ok_or_else(|| anyhow::anyhow!("DB_USER environment variable required"))?,
                lookup("DB_PASSWORD").unwrap_or_default(),
                get("DB_NAME")
                    .ok_or_else(|| anyhow::anyhow!("DB_NAME environment variable required"))?,
            )
        };

        let database = DatabaseConfig {
            url,
            host,
            port: parse_or(&get, "DB_PORT", 3306)?,
            user,
            password,
            name,
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            connect_timeout: Duration::from_secs(parse_or(&get, "DB_CONNECT_TIMEOUT_SECS", 10)?),
            query_timeout: Duration::from_secs(parse_or(&get, "DB_QUERY_TIMEOUT_SECS", 15)?),
        };
        if database.max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be at least 1");
        }

        let geocoder = GeocoderConfig {
            enabled: parse_or(&get, "GEOCODER_ENABLED", true)?,
            base_url: get("GEOCODER_BASE_URL")
                .unwrap_or_else(|| "https://api.zippopotam.us".to_string()),
            timeout: Duration::from_secs(parse_or(&get, "GEOCODER_TIMEOUT_SECS", 5)?),
            batch_size: parse_or(&get, "GEOCODE_BATCH_SIZE", 10)?,
            batch_delay: Duration::from_millis(parse_or(&get, "GEOCODE_BATCH_DELAY_MS", 100)?),
            batch_deadline: Duration::from_millis(parse_or(
                &get,
                "GEOCODE_BATCH_DEADLINE_MS",
                20_000,
            )?),
            cache_capacity: parse_or(&get, "GEOCODE_CACHE_CAPACITY", 100_000)?,
        };
        if !geocoder.base_url.starts_with("http://") && !geocoder.base_url.starts_with("https://")
        {
            anyhow::bail!("GEOCODER_BASE_URL must start with http:// or https://");
        }
        if geocoder.batch_size == 0 {
            anyhow::bail!("GEOCODE_BATCH_SIZE must be at least 1");
        }
        if geocoder.batch_deadline.is_zero() || geocoder.batch_deadline >= REQUEST_TIMEOUT {
            anyhow::bail!(
                "GEOCODE_BATCH_DEADLINE_MS must be between 1 and {}",
                REQUEST_TIMEOUT.as_millis() - 1
            );
        }

        let max_page_size: u32 = parse_or(&get, "MAX_PAGE_SIZE", 200)?;
        if max_page_size == 0 {
            anyhow::bail!("MAX_PAGE_SIZE must be at least 1");
        }

        Ok(Self {
            port: parse_or(&get, "PORT", 3000)
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            mode: get("APP_ENV")
                .map(|v| RuntimeMode::parse(&v))
                .unwrap_or(RuntimeMode::Production),
            max_page_size,
            database,
            geocoder,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}
