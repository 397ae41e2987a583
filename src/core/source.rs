use std::future::Future;

use super::sql::Ident;
use crate::models::response::Row;

/// 外部数据源对本核心暴露的全部能力
///
/// 连接、事务、驱动细节都留在实现方。
pub trait RowSource: Send + Sync {
    /// 执行一条查询，按返回顺序给出行
    fn execute(&self, sql: &str) -> impl Future<Output = anyhow::Result<Vec<Row>>> + Send;

    /// 某列的去重取值，空值不返回
    fn distinct_values(
        &self,
        relation: &Ident,
        column: &Ident,
    ) -> impl Future<Output = anyhow::Result<Vec<String>>> + Send;
}
