use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ssrm_backend::api::router;
use ssrm_backend::ax_state::AppState;
use ssrm_backend::core::query_builder::SqlQueryBuilder;
use ssrm_backend::core::rows::RowModelDao;
use ssrm_backend::infra::cache::{DataLakeCache, PivotDomainCache};
use ssrm_backend::infra::config::Config;
use ssrm_backend::infra::db_external::ExternalDb;
use ssrm_backend::infra::refresh::{spawn_refresh_jobs, Refresher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env()?);
    let db = Arc::new(ExternalDb::connect(&config.database_url, config.max_connections).await?);

    // 未显式配置分页写法时沿用驱动默认
    let dialect = match config.sql_paging {
        Some(paging) => db.dialect().with_paging(paging),
        None => db.dialect(),
    };
    info!("SQL 方言: {:?}", dialect);

    let pivot_cache = Arc::new(PivotDomainCache::new(config.pivot_cache_ttl));
    let rows = RowModelDao::new(SqlQueryBuilder::with_dialect(dialect)).with_pivot_cache(pivot_cache);

    let cache = Arc::new(DataLakeCache::new());
    let refresher = Arc::new(Refresher::new(db.clone(), cache.clone(), config.clone(), dialect));
    spawn_refresh_jobs(refresher, config.cache_refresh_interval);

    let state = Arc::new(AppState { db, rows, cache });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("🚀 SSRM Backend 运行在 http://{}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
