use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::core::sql::Paging;

/// 运行配置，全部来自环境变量（`.env` 由 dotenvy 预先加载）
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    /// 未设置时按数据库类型取默认分页写法
    pub sql_paging: Option<Paging>,
    pub pivot_cache_ttl: Duration,
    pub cache_refresh_interval: Duration,
    pub cache_input_features: bool,
    pub cache_output_features: bool,
    pub input_features: Vec<String>,
    pub input_features_table: String,
    pub output_features_table: String,
    pub dashboard_table: String,
    pub movements_sql: Option<String>,
    pub feature_key_column: String,
    pub month_rollover_day: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从任意键值来源读取，空字符串视同未设置
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let month_rollover_day: u32 = parse_or(&get, "MONTH_ROLLOVER_DAY", 14)?;
        if !(1..=31).contains(&month_rollover_day) {
            return Err(anyhow!(
                "MONTH_ROLLOVER_DAY must be between 1 and 31, got {}",
                month_rollover_day
            ));
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            bind_addr: parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            sql_paging: get("SQL_PAGING")
                .map(|v| v.parse::<Paging>())
                .transpose()
                .map_err(|e| anyhow!("invalid SQL_PAGING: {}", e))?,
            pivot_cache_ttl: Duration::from_secs(parse_or(&get, "PIVOT_CACHE_TTL_SECS", 300)?),
            cache_refresh_interval: Duration::from_secs(parse_or(
                &get,
                "CACHE_REFRESH_SECS",
                35_000,
            )?),
            cache_input_features: parse_bool(&get, "CACHE_INPUT_FEATURES")?,
            cache_output_features: parse_bool(&get, "CACHE_OUTPUT_FEATURES")?,
            input_features: get("INPUT_FEATURES")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            input_features_table: get("INPUT_FEATURES_TABLE")
                .unwrap_or_else(|| "input_features".to_string()),
            output_features_table: get("OUTPUT_FEATURES_TABLE")
                .unwrap_or_else(|| "output_features".to_string()),
            dashboard_table: get("DASHBOARD_TABLE").unwrap_or_else(|| "dashboard".to_string()),
            movements_sql: get("MOVEMENTS_SQL"),
            feature_key_column: get("FEATURE_KEY_COLUMN").unwrap_or_else(|| "vehicle".to_string()),
            month_rollover_day,
        })
    }
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", name, raw)),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, name: &str) -> anyhow::Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name).map(|v| v.trim().to_lowercase()).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow!("invalid boolean for {}: '{}'", name, other)),
    }
}
