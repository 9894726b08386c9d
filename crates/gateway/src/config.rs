//! Configuration loaded from environment variables.
//!
//! Every value has a fixed default. Loading goes through a lookup function so
//! tests can supply their own variables instead of touching the process
//! environment.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use common::Money;
use domain::DeclinePolicy;
use saga::{DEFAULT_CALL_TIMEOUT, DEFAULT_UNIT_PRICE, PriceList};
use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_GATEWAY_PORT: u16 = 3000;

/// A configuration variable holds a value that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value {value:?} for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl ConfigError {
    fn new(var: &'static str, value: &str, reason: impl Display) -> Self {
        Self {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `text` or `json`, got `{other}`")),
        }
    }
}

/// `RUST_LOG` and `LOG_FORMAT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LogConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            filter: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            format: parse_or("LOG_FORMAT", lookup, LogFormat::Text)?,
        })
    }
}

/// The three leaf services and their fixed defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafService {
    User,
    Order,
    Payment,
}

impl LeafService {
    pub fn name(self) -> &'static str {
        match self {
            LeafService::User => "user",
            LeafService::Order => "order",
            LeafService::Payment => "payment",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            LeafService::User => 50051,
            LeafService::Order => 50052,
            LeafService::Payment => 50053,
        }
    }

    /// Variable the gateway reads this service's address from.
    pub fn addr_var(self) -> &'static str {
        match self {
            LeafService::User => "USER_SERVICE_ADDR",
            LeafService::Order => "ORDER_SERVICE_ADDR",
            LeafService::Payment => "PAYMENT_SERVICE_ADDR",
        }
    }

    pub fn default_addr(self) -> String {
        format!("http://localhost:{}", self.default_port())
    }
}

/// Gateway settings.
///
/// | Variable | Default |
/// |----------|---------|
/// | `HOST` | `0.0.0.0` |
/// | `PORT` | `3000` |
/// | `USER_SERVICE_ADDR` | `http://localhost:50051` |
/// | `ORDER_SERVICE_ADDR` | `http://localhost:50052` |
/// | `PAYMENT_SERVICE_ADDR` | `http://localhost:50053` |
/// | `CALL_TIMEOUT_MS` | `2000` |
/// | `DEFAULT_PRICE_CENTS` | `10050`, or `none` to require listed prices |
/// | `PRODUCT_PRICES` | empty, `sku=cents,...` |
/// | `EMBEDDED_SERVICES` | `false` |
/// | `PAYMENT_DECLINE_POLICY` | `approve-all` (embedded mode only) |
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub user_service_addr: String,
    pub order_service_addr: String,
    pub payment_service_addr: String,
    pub call_timeout: Duration,
    pub prices: PriceList,
    pub embedded_services: bool,
    pub decline_policy: DeclinePolicy,
    pub log: LogConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_GATEWAY_PORT,
            user_service_addr: LeafService::User.default_addr(),
            order_service_addr: LeafService::Order.default_addr(),
            payment_service_addr: LeafService::Payment.default_addr(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            prices: PriceList::default(),
            embedded_services: false,
            decline_policy: DeclinePolicy::ApproveAll,
            log: LogConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr = |service: LeafService| {
            lookup(service.addr_var()).unwrap_or_else(|| service.default_addr())
        };

        let call_timeout_ms: u64 = parse_or(
            "CALL_TIMEOUT_MS",
            &lookup,
            DEFAULT_CALL_TIMEOUT.as_millis() as u64,
        )?;
        if call_timeout_ms == 0 {
            return Err(ConfigError::new(
                "CALL_TIMEOUT_MS",
                "0",
                "timeout must be positive",
            ));
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or("PORT", &lookup, DEFAULT_GATEWAY_PORT)?,
            user_service_addr: addr(LeafService::User),
            order_service_addr: addr(LeafService::Order),
            payment_service_addr: addr(LeafService::Payment),
            call_timeout: Duration::from_millis(call_timeout_ms),
            prices: price_list(&lookup)?,
            embedded_services: parse_flag("EMBEDDED_SERVICES", &lookup)?,
            decline_policy: parse_or("PAYMENT_DECLINE_POLICY", &lookup, DeclinePolicy::ApproveAll)?,
            log: LogConfig::from_lookup(&lookup)?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings of a leaf service binary: `HOST`, `PORT`,
/// `PAYMENT_DECLINE_POLICY` and logging.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service: LeafService,
    pub host: String,
    pub port: u16,
    pub decline_policy: DeclinePolicy,
    pub log: LogConfig,
}

impl ServiceConfig {
    pub fn from_env(service: LeafService) -> Result<Self, ConfigError> {
        Self::from_lookup(service, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        service: LeafService,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            service,
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or("PORT", &lookup, service.default_port())?,
            decline_policy: parse_or("PAYMENT_DECLINE_POLICY", &lookup, DeclinePolicy::ApproveAll)?,
            log: LogConfig::from_lookup(&lookup)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(
    var: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| ConfigError::new(var, &value, e)),
        None => Ok(default),
    }
}

fn parse_flag(
    var: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::new(var, &value, "expected true or false")),
    }
}

fn price_list(lookup: &impl Fn(&str) -> Option<String>) -> Result<PriceList, ConfigError> {
    let default_price = match lookup("DEFAULT_PRICE_CENTS") {
        None => Some(DEFAULT_UNIT_PRICE),
        Some(value) if value.trim().eq_ignore_ascii_case("none") => None,
        Some(value) => {
            let cents: i64 = value
                .trim()
                .parse()
                .map_err(|e| ConfigError::new("DEFAULT_PRICE_CENTS", &value, e))?;
            if cents <= 0 {
                return Err(ConfigError::new(
                    "DEFAULT_PRICE_CENTS",
                    &value,
                    "price must be positive",
                ));
            }
            Some(Money::from_cents(cents))
        }
    };

    let table = lookup("PRODUCT_PRICES").unwrap_or_default();
    PriceList::new(default_price)
        .with_price_table(&table)
        .map_err(|e| ConfigError::new("PRODUCT_PRICES", &table, e))
}
