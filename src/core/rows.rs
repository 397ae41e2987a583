use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::error::QueryError;
use super::pivot::{resolve_pivot_domains, PivotDomains};
use super::query_builder::SqlQueryBuilder;
use super::response_builder::create_response;
use super::source::RowSource;
use crate::infra::cache::PivotDomainCache;
use crate::models::request::GetRowsRequest;
use crate::models::response::GetRowsResponse;

/// 一次取数：透视取值域 -> 生成 SQL -> 执行 -> 整理响应
#[derive(Clone, Default)]
pub struct RowModelDao {
    builder: SqlQueryBuilder,
    pivot_cache: Option<Arc<PivotDomainCache>>,
}

impl RowModelDao {
    pub fn new(builder: SqlQueryBuilder) -> Self {
        Self {
            builder,
            pivot_cache: None,
        }
    }

    pub fn with_pivot_cache(mut self, cache: Arc<PivotDomainCache>) -> Self {
        self.pivot_cache = Some(cache);
        self
    }

    pub fn builder(&self) -> &SqlQueryBuilder {
        &self.builder
    }

    #[instrument(skip_all, fields(table = %table, start = request.start_row, end = request.end_row))]
    pub async fn get_data<S: RowSource>(
        &self,
        source: &S,
        table: &str,
        request: &GetRowsRequest,
    ) -> Result<GetRowsResponse, QueryError> {
        // 调用方错误必须在访问数据源之前报出
        self.builder.validate(request, table)?;

        let pivot_values = if request.is_pivoting() {
            match &self.pivot_cache {
                Some(cache) => cache.resolve(source, table, &request.pivot_cols).await?,
                None => resolve_pivot_domains(source, table, &request.pivot_cols).await?,
            }
        } else {
            PivotDomains::new()
        };

        let sql = self.builder.create_sql(request, table, &pivot_values)?;
        debug!("生成查询: {}", sql);

        let rows = source
            .execute(&sql)
            .await
            .map_err(|e| QueryError::ExecutionFailure {
                relation: table.to_string(),
                query: sql.clone(),
                source: e,
            })?;
        info!("取数完成，返回 {} 行", rows.len());

        Ok(create_response(request, rows, &pivot_values))
    }
}
