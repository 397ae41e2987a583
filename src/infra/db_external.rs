use sqlx::{mysql::MySqlPoolOptions, postgres::PgPoolOptions, MySql, Pool, Postgres, Row as _};
use tracing::info;

use crate::core::source::RowSource;
use crate::core::sql::{Dialect, Ident};
use crate::infra::utils::{mysql_row_to_map, pg_row_to_map};
use crate::models::response::Row;

pub enum DynamicPool {
    Postgres(Pool<Postgres>),
    MySql(Pool<MySql>),
}

/// 行模型查询所面对的外部数据库
pub struct ExternalDb {
    pool: DynamicPool,
}

impl ExternalDb {
    /// 按连接串的 scheme 选择驱动
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let scheme = url.split("://").next().unwrap_or_default().to_lowercase();
        let pool = match scheme.as_str() {
            "postgres" | "postgresql" => {
                let pool = PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await?;
                DynamicPool::Postgres(pool)
            }
            "mysql" | "mariadb" => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await?;
                DynamicPool::MySql(pool)
            }
            other => return Err(anyhow::anyhow!("Unsupported DB type: {}", other)),
        };
        info!("外部数据源已连接: {}", scheme);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: DynamicPool) -> Self {
        Self { pool }
    }

    /// 驱动对应的默认 SQL 方言
    pub fn dialect(&self) -> Dialect {
        match self.pool {
            DynamicPool::Postgres(_) => Dialect::postgres(),
            DynamicPool::MySql(_) => Dialect::mysql(),
        }
    }
}

impl RowSource for ExternalDb {
    async fn execute(&self, sql: &str) -> anyhow::Result<Vec<Row>> {
        let rows = match &self.pool {
            DynamicPool::Postgres(p) => sqlx::query(sql)
                .fetch_all(p)
                .await?
                .iter()
                .map(pg_row_to_map)
                .collect(),
            DynamicPool::MySql(p) => sqlx::query(sql)
                .fetch_all(p)
                .await?
                .iter()
                .map(mysql_row_to_map)
                .collect(),
        };
        Ok(rows)
    }

    async fn distinct_values(&self, relation: &Ident, column: &Ident) -> anyhow::Result<Vec<String>> {
        // 取值统一转成文本，空值不参与透视
        let values = match &self.pool {
            DynamicPool::Postgres(p) => {
                let sql = format!(
                    "SELECT DISTINCT CAST({} AS TEXT) AS val FROM {} WHERE {} IS NOT NULL",
                    column, relation, column
                );
                sqlx::query(&sql)
                    .fetch_all(p)
                    .await?
                    .into_iter()
                    .filter_map(|r| r.try_get::<Option<String>, _>("val").ok().flatten())
                    .collect()
            }
            DynamicPool::MySql(p) => {
                let sql = format!(
                    "SELECT DISTINCT CAST({} AS CHAR) AS val FROM {} WHERE {} IS NOT NULL",
                    column, relation, column
                );
                sqlx::query(&sql)
                    .fetch_all(p)
                    .await?
                    .into_iter()
                    .filter_map(|r| r.try_get::<Option<String>, _>("val").ok().flatten())
                    .collect()
            }
        };
        Ok(values)
    }
}
