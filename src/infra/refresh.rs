//! 数据湖缓存的定时刷新
//!
//! 每个缓存一个 tokio 定时任务。分区窗口按当天日期计算：
//! 月窗口在滚动日之前带上上个月，年窗口在一月份带上去年。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cache::{index_by_key, DataLakeCache};
use super::config::Config;
use crate::core::error::QueryError;
use crate::core::plan::{Predicate, SelectItem, SelectPlan, SortKey};
use crate::core::source::RowSource;
use crate::core::sql::{Dialect, Ident, Literal};
use crate::models::feature::{Feature, Movement};
use crate::models::request::SortDirection;
use crate::models::response::Row;

/// 单次刷新读取的行数上限
pub const CACHE_ROW_LIMIT: usize = 1_000_000;

/// 当月 `YYYY-MM`；日期早于滚动日时追加上个月，一月回滚到去年 12 月
pub fn month_window(today: NaiveDate, rollover_day: u32) -> Vec<String> {
    let mut window = vec![format!("{}-{:02}", today.year(), today.month())];
    if today.day() < rollover_day {
        if today.month() > 1 {
            window.push(format!("{}-{:02}", today.year(), today.month() - 1));
        } else {
            window.push(format!("{}-12", today.year() - 1));
        }
    }
    window
}

pub fn year_window(today: NaiveDate) -> Vec<String> {
    let mut window = vec![today.year().to_string()];
    if today.month() < 2 {
        window.push((today.year() - 1).to_string());
    }
    window
}

fn text_in(column: &str, values: &[String]) -> Result<Predicate, QueryError> {
    Ok(Predicate::In {
        column: Ident::new(column)?,
        values: values.iter().map(|v| Literal::text(v)).collect(),
    })
}

fn plan(
    relation: &str,
    predicates: Vec<Predicate>,
    order_by: Option<&str>,
) -> Result<SelectPlan, QueryError> {
    Ok(SelectPlan {
        items: vec![SelectItem::Wildcard],
        relation: Ident::relation(relation)?,
        predicates,
        group_by: None,
        order_by: match order_by {
            Some(col) => vec![(SortKey::Column(Ident::new(col)?), SortDirection::Desc)],
            None => Vec::new(),
        },
        start_row: 0,
        end_row: CACHE_ROW_LIMIT,
    })
}

pub fn input_features_sql(
    config: &Config,
    dialect: &Dialect,
    today: NaiveDate,
) -> Result<String, QueryError> {
    if config.input_features.is_empty() {
        return Err(QueryError::InvalidRequest(
            "no input features configured".to_string(),
        ));
    }
    let predicates = vec![
        text_in("eventdate", &month_window(today, config.month_rollover_day))?,
        text_in("var", &config.input_features)?,
    ];
    Ok(plan(&config.input_features_table, predicates, Some("ts"))?.to_sql(dialect))
}

pub fn output_features_sql(
    config: &Config,
    dialect: &Dialect,
    today: NaiveDate,
) -> Result<String, QueryError> {
    let predicates = vec![
        text_in("partitiondate", &year_window(today))?,
        Predicate::eq(Ident::new("processed")?, Literal::Number("1".to_string())),
    ];
    Ok(plan(&config.output_features_table, predicates, Some("time"))?.to_sql(dialect))
}

pub fn dashboard_sql(
    config: &Config,
    dialect: &Dialect,
    today: NaiveDate,
) -> Result<String, QueryError> {
    let predicates = vec![text_in("partitiondate", &year_window(today))?];
    Ok(plan(&config.dashboard_table, predicates, None)?.to_sql(dialect))
}

/// 可独立调度的刷新任务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshJob {
    InputFeatures,
    OutputFeatures,
    Movements,
    Dashboard,
}

impl RefreshJob {
    pub const ALL: [RefreshJob; 4] = [
        RefreshJob::InputFeatures,
        RefreshJob::OutputFeatures,
        RefreshJob::Movements,
        RefreshJob::Dashboard,
    ];
}

pub struct Refresher<S> {
    source: Arc<S>,
    cache: Arc<DataLakeCache>,
    config: Arc<Config>,
    dialect: Dialect,
}

impl<S: RowSource> Refresher<S> {
    pub fn new(source: Arc<S>, cache: Arc<DataLakeCache>, config: Arc<Config>, dialect: Dialect) -> Self {
        Self {
            source,
            cache,
            config,
            dialect,
        }
    }

    /// 执行一次刷新；关闭的任务和失败的任务都返回 false
    pub async fn run(&self, job: RefreshJob, today: NaiveDate) -> bool {
        match job {
            RefreshJob::InputFeatures => {
                if !self.config.cache_input_features {
                    info!("输入特征缓存已关闭");
                    return false;
                }
                let key_column = self.config.feature_key_column.as_str();
                let load = async {
                    let sql = input_features_sql(&self.config, &self.dialect, today)?;
                    self.load_features(&sql, key_column).await
                };
                self.cache.input_features.refresh(load).await
            }
            RefreshJob::OutputFeatures => {
                if !self.config.cache_output_features {
                    info!("输出特征缓存已关闭");
                    return false;
                }
                let key_column = self.config.feature_key_column.as_str();
                let load = async {
                    let sql = output_features_sql(&self.config, &self.dialect, today)?;
                    self.load_features(&sql, key_column).await
                };
                self.cache.output_features.refresh(load).await
            }
            RefreshJob::Movements => {
                let Some(sql) = self.config.movements_sql.as_deref() else {
                    debug!("未配置 MOVEMENTS_SQL，跳过里程缓存");
                    return false;
                };
                let load = async {
                    let rows = self.fetch(sql).await?;
                    Ok::<_, anyhow::Error>(
                        rows.iter()
                            .filter_map(Movement::from_row)
                            .map(|m| (m.key, m.mileage))
                            .collect::<HashMap<_, _>>(),
                    )
                };
                self.cache.movements.refresh(load).await
            }
            RefreshJob::Dashboard => {
                let load = async {
                    let sql = dashboard_sql(&self.config, &self.dialect, today)?;
                    self.fetch(&sql).await
                };
                self.cache.dashboard.refresh(load).await
            }
        }
    }

    pub async fn run_all(&self, today: NaiveDate) {
        for job in RefreshJob::ALL {
            self.run(job, today).await;
        }
    }

    async fn fetch(&self, sql: &str) -> anyhow::Result<Vec<Row>> {
        info!("{}", sql);
        self.source.execute(sql).await
    }

    async fn load_features(
        &self,
        sql: &str,
        key_column: &str,
    ) -> anyhow::Result<HashMap<String, Vec<Feature>>> {
        let rows = self.fetch(sql).await?;
        let total = rows.len();
        let index = index_by_key(rows.into_iter().filter_map(|r| Feature::from_row(r, key_column)));
        debug!("特征 {} 行，归入 {} 个键", total, index.len());
        Ok(index)
    }
}

/// 每个刷新任务一个定时器，首轮立即执行
pub fn spawn_refresh_jobs<S>(refresher: Arc<Refresher<S>>, every: Duration) -> Vec<JoinHandle<()>>
where
    S: RowSource + 'static,
{
    let every = if every.is_zero() {
        warn!("刷新间隔为 0，按 1 秒处理");
        Duration::from_secs(1)
    } else {
        every
    };
    RefreshJob::ALL
        .into_iter()
        .map(|job| {
            let refresher = refresher.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                loop {
                    ticker.tick().await;
                    refresher.run(job, Local::now().date_naive()).await;
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> Config {
        Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("postgres://lake".to_string()),
            "INPUT_FEATURES" => Some("speed,temp".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn month_window_rolls_back_before_rollover_day() {
        assert_eq!(month_window(day(2024, 3, 20), 14), vec!["2024-03"]);
        assert_eq!(month_window(day(2024, 3, 13), 14), vec!["2024-03", "2024-02"]);
        assert_eq!(month_window(day(2024, 1, 2), 14), vec!["2024-01", "2023-12"]);
        assert_eq!(month_window(day(2024, 11, 5), 1), vec!["2024-11"]);
    }

    #[test]
    fn year_window_includes_last_year_in_january() {
        assert_eq!(year_window(day(2024, 1, 31)), vec!["2024", "2023"]);
        assert_eq!(year_window(day(2024, 2, 1)), vec!["2024"]);
    }

    #[test]
    fn builds_input_feature_query() {
        let sql = input_features_sql(&config(), &Dialect::postgres(), day(2024, 3, 2)).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM input_features WHERE eventdate IN ('2024-03', '2024-02') \
             AND var IN ('speed', 'temp') ORDER BY ts desc LIMIT 1000000 OFFSET 0"
        );
    }

    #[test]
    fn builds_output_feature_and_dashboard_queries() {
        let cfg = config();
        let sql = output_features_sql(&cfg, &Dialect::mysql(), day(2024, 6, 1)).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM output_features WHERE partitiondate IN ('2024') \
             AND processed = 1 ORDER BY time desc LIMIT 0,1000000"
        );
        let sql = dashboard_sql(&cfg, &Dialect::mysql(), day(2024, 1, 9)).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM dashboard WHERE partitiondate IN ('2024', '2023') LIMIT 0,1000000"
        );
    }

    #[test]
    fn empty_feature_list_is_rejected() {
        let mut cfg = config();
        cfg.input_features.clear();
        assert!(input_features_sql(&cfg, &Dialect::default(), day(2024, 3, 2)).is_err());
    }
}
