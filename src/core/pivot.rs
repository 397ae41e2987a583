//! 透视列取值域的解析
//!
//! 每个透视列的去重取值会变成合成输出列 `<取值>_<值列别名>`；
//! 取值域按字典序排列，保证多次请求的列顺序一致。

use tracing::{debug, instrument};

use super::error::QueryError;
use super::sql::Ident;
use super::source::RowSource;
use crate::models::request::{ColumnVO, GetRowsRequest};

/// 透视列源列名 -> 有序取值，保持插入顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotDomains(Vec<(String, Vec<String>)>);

impl PivotDomains {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, values: Vec<String>) {
        let column = column.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = values,
            None => self.0.push((column, values)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(c, v)| (c.as_str(), v.as_slice()))
    }
}

impl FromIterator<(String, Vec<String>)> for PivotDomains {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut domains = PivotDomains::new();
        for (column, values) in iter {
            domains.insert(column, values);
        }
        domains
    }
}

/// 去重并按字典序排序
pub fn normalize_domain(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

/// 单列取值域，执行失败原样上抛
pub async fn resolve_column<S: RowSource>(
    source: &S,
    relation: &str,
    column: &str,
) -> Result<Vec<String>, QueryError> {
    let rel = Ident::relation(relation)?;
    let col = Ident::new(column)?;
    let values = source
        .distinct_values(&rel, &col)
        .await
        .map_err(|e| QueryError::ExecutionFailure {
            relation: relation.to_string(),
            query: format!("SELECT DISTINCT {} FROM {}", col, rel),
            source: e,
        })?;
    Ok(normalize_domain(values))
}

#[instrument(skip_all, fields(relation = %relation, columns = pivot_cols.len()))]
pub async fn resolve_pivot_domains<S: RowSource>(
    source: &S,
    relation: &str,
    pivot_cols: &[ColumnVO],
) -> Result<PivotDomains, QueryError> {
    let mut domains = PivotDomains::new();
    for col in pivot_cols {
        let values = resolve_column(source, relation, &col.field).await?;
        debug!("透视列 {} 取值 {} 个", col.field, values.len());
        domains.insert(col.field.clone(), values);
    }
    Ok(domains)
}

/// 所有透视列取值的笛卡尔积，按透视列顺序展开
///
/// 任一列取值域为空时结果为空；缺少某列的取值域返回 `None`。
pub fn combinations<'a>(
    pivot_cols: &[ColumnVO],
    domains: &'a PivotDomains,
) -> Option<Vec<Vec<&'a str>>> {
    let mut acc: Vec<Vec<&'a str>> = vec![Vec::new()];
    for col in pivot_cols {
        let values = domains.get(&col.field)?;
        acc = acc
            .iter()
            .flat_map(|prefix| {
                values.iter().map(move |v| {
                    let mut next = prefix.clone();
                    next.push(v.as_str());
                    next
                })
            })
            .collect();
    }
    Some(acc)
}

pub fn secondary_field_name(combo: &[&str], value_alias: &str) -> String {
    format!("{}_{}", combo.join("_"), value_alias)
}

/// 合成列名，顺序与生成 SQL 中的列顺序一致
pub fn secondary_column_fields(request: &GetRowsRequest, domains: &PivotDomains) -> Vec<String> {
    if !request.is_pivoting() {
        return Vec::new();
    }
    let Some(combos) = combinations(&request.pivot_cols, domains) else {
        return Vec::new();
    };
    combos
        .iter()
        .flat_map(|combo| {
            request
                .value_cols
                .iter()
                .map(move |v| secondary_field_name(combo, v.alias()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::AggFunc;

    fn col(name: &str) -> ColumnVO {
        ColumnVO::new(name, name, name, None)
    }

    #[test]
    fn insert_keeps_first_position() {
        let mut d = PivotDomains::new();
        d.insert("b", vec!["1".into()]);
        d.insert("a", vec![]);
        d.insert("b", vec!["2".into()]);
        let keys: Vec<&str> = d.iter().map(|(c, _)| c).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(d.get("b"), Some(&["2".to_string()][..]));
    }

    #[test]
    fn normalizes_to_sorted_unique() {
        let v = normalize_domain(vec!["US".into(), "DE".into(), "US".into(), "AT".into()]);
        assert_eq!(v, vec!["AT", "DE", "US"]);
    }

    #[test]
    fn crosses_all_pivot_columns() {
        let domains: PivotDomains = vec![
            ("country".to_string(), vec!["DE".to_string(), "US".to_string()]),
            ("year".to_string(), vec!["2008".to_string(), "2012".to_string()]),
        ]
        .into_iter()
        .collect();
        let combos = combinations(&[col("country"), col("year")], &domains).unwrap();
        assert_eq!(
            combos,
            vec![
                vec!["DE", "2008"],
                vec!["DE", "2012"],
                vec!["US", "2008"],
                vec!["US", "2012"]
            ]
        );
    }

    #[test]
    fn empty_domain_yields_no_combinations() {
        let domains: PivotDomains = vec![("country".to_string(), vec![])].into_iter().collect();
        assert!(combinations(&[col("country")], &domains).unwrap().is_empty());
        assert!(combinations(&[col("year")], &domains).is_none());
    }

    #[test]
    fn secondary_fields_follow_value_columns() {
        let request = GetRowsRequest {
            row_group_cols: vec![col("sport")],
            value_cols: vec![
                ColumnVO::new("gold", "gold", "gold", Some(AggFunc::Sum)),
                ColumnVO::new("silver", "silver", "silver", Some(AggFunc::Sum)),
            ],
            pivot_cols: vec![col("country")],
            ..Default::default()
        };
        let domains: PivotDomains = vec![("country".to_string(), vec!["DE".into(), "US".into()])]
            .into_iter()
            .collect();
        assert_eq!(
            secondary_column_fields(&request, &domains),
            vec!["DE_gold", "DE_silver", "US_gold", "US_silver"]
        );
    }
}
