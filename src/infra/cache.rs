//! 进程内缓存
//!
//! `SnapshotCache` 整代替换：读方拿到当前代的 `Arc`，刷新成功才换代，
//! 刷新失败保留上一代。`PivotDomainCache` 按 (表, 列) 缓存透视取值域。

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::error::QueryError;
use crate::core::pivot::{resolve_column, PivotDomains};
use crate::core::source::RowSource;
use crate::models::feature::Feature;
use crate::models::request::ColumnVO;
use crate::models::response::Row;

/// 可按业务键归组的缓存实体
pub trait HasCacheKey {
    fn cache_key(&self) -> &str;
}

/// 同键条目按来源顺序的逆序保存
///
/// 来源查询按时间倒序返回，所以每个键下的列表是从旧到新。
pub fn index_by_key<T, I>(items: I) -> HashMap<String, Vec<T>>
where
    T: HasCacheKey,
    I: IntoIterator<Item = T>,
{
    let mut index: HashMap<String, Vec<T>> = HashMap::new();
    for item in items {
        index.entry(item.cache_key().to_string()).or_default().push(item);
    }
    for list in index.values_mut() {
        list.reverse();
    }
    index
}

pub struct SnapshotCache<T> {
    name: &'static str,
    current: RwLock<Arc<T>>,
    generation: AtomicU64,
}

impl<T> SnapshotCache<T> {
    pub fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            current: RwLock::new(Arc::new(initial)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn snapshot(&self) -> Arc<T> {
        self.current.read().await.clone()
    }

    /// 0 表示尚未成功加载过
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// 直接换代，返回被替换的上一代
    pub async fn replace(&self, next: T) -> Arc<T> {
        let mut guard = self.current.write().await;
        let prev = std::mem::replace(&mut *guard, Arc::new(next));
        self.generation.fetch_add(1, Ordering::AcqRel);
        prev
    }

    /// 加载新一代；加载失败时保留当前代并返回 false
    pub async fn refresh<F>(&self, load: F) -> bool
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let started = Instant::now();
        match load.await {
            Ok(next) => {
                self.replace(next).await;
                info!(
                    "缓存 {} 刷新完成，第 {} 代，耗时 {} ms",
                    self.name,
                    self.generation(),
                    started.elapsed().as_millis()
                );
                true
            }
            Err(e) => {
                warn!("缓存 {} 刷新失败，继续使用上一代: {:#}", self.name, e);
                false
            }
        }
    }
}

/// 数据湖快照：输入特征、输出特征、里程、看板数据
pub struct DataLakeCache {
    pub input_features: SnapshotCache<HashMap<String, Vec<Feature>>>,
    pub output_features: SnapshotCache<HashMap<String, Vec<Feature>>>,
    pub movements: SnapshotCache<HashMap<String, i64>>,
    pub dashboard: SnapshotCache<Vec<Row>>,
}

impl DataLakeCache {
    pub fn new() -> Self {
        Self {
            input_features: SnapshotCache::new("input_features", HashMap::new()),
            output_features: SnapshotCache::new("output_features", HashMap::new()),
            movements: SnapshotCache::new("movements", HashMap::new()),
            dashboard: SnapshotCache::new("dashboard", Vec::new()),
        }
    }
}

impl Default for DataLakeCache {
    fn default() -> Self {
        Self::new()
    }
}

/// 透视取值域缓存，ttl 为 0 时不缓存
pub struct PivotDomainCache {
    ttl: Duration,
    entries: DashMap<(String, String), (Instant, Arc<Vec<String>>)>,
}

impl PivotDomainCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    fn lookup(&self, relation: &str, column: &str) -> Option<Arc<Vec<String>>> {
        if self.ttl.is_zero() {
            return None;
        }
        let entry = self
            .entries
            .get(&(relation.to_string(), column.to_string()))?;
        let (loaded_at, values) = entry.value();
        if loaded_at.elapsed() < self.ttl {
            Some(values.clone())
        } else {
            None
        }
    }

    pub async fn resolve<S: RowSource>(
        &self,
        source: &S,
        relation: &str,
        pivot_cols: &[ColumnVO],
    ) -> Result<PivotDomains, QueryError> {
        let mut domains = PivotDomains::new();
        for col in pivot_cols {
            let values = match self.lookup(relation, &col.field) {
                Some(cached) => {
                    debug!("透视取值域命中缓存: {}.{}", relation, col.field);
                    cached.as_ref().clone()
                }
                None => {
                    let fresh = resolve_column(source, relation, &col.field).await?;
                    if !self.ttl.is_zero() {
                        self.entries.insert(
                            (relation.to_string(), col.field.clone()),
                            (Instant::now(), Arc::new(fresh.clone())),
                        );
                    }
                    fresh
                }
            };
            domains.insert(col.field.clone(), values);
        }
        Ok(domains)
    }

    /// 表数据变化后丢弃该表的全部取值域
    pub fn invalidate(&self, relation: &str) {
        self.entries.retain(|(r, _), _| r != relation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Entry(&'static str, u32);

    impl HasCacheKey for Entry {
        fn cache_key(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn index_reverses_source_order_per_key() {
        let index = index_by_key(vec![Entry("a", 3), Entry("b", 9), Entry("a", 2), Entry("a", 1)]);
        assert_eq!(index["a"], vec![Entry("a", 1), Entry("a", 2), Entry("a", 3)]);
        assert_eq!(index["b"], vec![Entry("b", 9)]);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_generation() {
        let cache = SnapshotCache::new("test", vec![1]);
        assert_eq!(cache.generation(), 0);

        assert!(cache.refresh(async { Ok(vec![1, 2]) }).await);
        assert_eq!(*cache.snapshot().await, vec![1, 2]);
        assert_eq!(cache.generation(), 1);

        assert!(!cache.refresh(async { Err(anyhow::anyhow!("lake offline")) }).await);
        assert_eq!(*cache.snapshot().await, vec![1, 2]);
        assert_eq!(cache.generation(), 1);
    }

    #[tokio::test]
    async fn readers_keep_their_generation() {
        let cache = SnapshotCache::new("test", "old".to_string());
        let held = cache.snapshot().await;
        let prev = cache.replace("new".to_string()).await;
        assert_eq!(*held, "old");
        assert_eq!(*prev, "old");
        assert_eq!(*cache.snapshot().await, "new");
    }
}
