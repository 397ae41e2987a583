use serde::{Deserialize, Serialize};

use crate::core::error::QueryError;
use crate::core::plan::{CompareOp, LikeShape, Predicate};
use crate::core::sql::{Dialect, Ident, Literal};

/// 列过滤条件，按 `filterType` 区分三种变体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filterType", rename_all = "lowercase")]
pub enum ColumnFilter {
    Set(SetFilter),
    Text(TextFilter),
    Number(NumberFilter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetFilter {
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextFilterType {
    Equals,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Blank,
    NotBlank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFilter {
    #[serde(rename = "type")]
    pub kind: TextFilterType,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberFilterType {
    Equals,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    InRange,
    Blank,
    NotBlank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberFilter {
    #[serde(rename = "type")]
    pub kind: NumberFilterType,
    #[serde(default)]
    pub filter: Option<f64>,
    #[serde(default)]
    pub filter_to: Option<f64>,
}

impl ColumnFilter {
    pub fn set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnFilter::Set(SetFilter {
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn text(kind: TextFilterType, filter: &str) -> Self {
        ColumnFilter::Text(TextFilter {
            kind,
            filter: Some(filter.to_string()),
        })
    }

    pub fn number(kind: NumberFilterType, filter: f64) -> Self {
        ColumnFilter::Number(NumberFilter {
            kind,
            filter: Some(filter),
            filter_to: None,
        })
    }

    pub fn in_range(from: f64, to: f64) -> Self {
        ColumnFilter::Number(NumberFilter {
            kind: NumberFilterType::InRange,
            filter: Some(from),
            filter_to: Some(to),
        })
    }

    /// 绑定到指定列，生成单个谓词
    pub fn to_predicate(&self, column: &str) -> Result<Predicate, QueryError> {
        let ident = Ident::new(column)?;
        match self {
            ColumnFilter::Set(f) => set_predicate(ident, f),
            ColumnFilter::Text(f) => text_predicate(ident, f),
            ColumnFilter::Number(f) => number_predicate(ident, f),
        }
    }

    pub fn render_predicate(&self, column: &str, dialect: &Dialect) -> Result<String, QueryError> {
        Ok(self.to_predicate(column)?.render(dialect))
    }
}

fn set_predicate(column: Ident, filter: &SetFilter) -> Result<Predicate, QueryError> {
    if filter.values.is_empty() {
        return Err(QueryError::invalid_filter(column.as_str(), "set filter has no values"));
    }
    let mut values: Vec<Literal> = Vec::with_capacity(filter.values.len());
    for v in &filter.values {
        let lit = Literal::text(v);
        if !values.contains(&lit) {
            values.push(lit);
        }
    }
    Ok(Predicate::In { column, values })
}

fn text_predicate(column: Ident, filter: &TextFilter) -> Result<Predicate, QueryError> {
    use TextFilterType::*;

    let compare = |op| -> Result<Predicate, QueryError> {
        let value = text_operand(&column, filter)?;
        Ok(Predicate::Compare {
            column: column.clone(),
            op,
            value: Literal::text(value),
        })
    };
    let like = |shape, negated| -> Result<Predicate, QueryError> {
        let value = text_operand(&column, filter)?;
        Ok(Predicate::Like {
            column: column.clone(),
            value: value.to_string(),
            shape,
            negated,
        })
    };

    match filter.kind {
        Equals => compare(CompareOp::Eq),
        NotEqual => compare(CompareOp::NotEq),
        LessThan => compare(CompareOp::Lt),
        LessThanOrEqual => compare(CompareOp::LtEq),
        GreaterThan => compare(CompareOp::Gt),
        GreaterThanOrEqual => compare(CompareOp::GtEq),
        Contains => like(LikeShape::Contains, false),
        NotContains => like(LikeShape::Contains, true),
        StartsWith => like(LikeShape::StartsWith, false),
        EndsWith => like(LikeShape::EndsWith, false),
        Blank => Ok(Predicate::Null {
            column: column.clone(),
            negated: false,
        }),
        NotBlank => Ok(Predicate::Null {
            column: column.clone(),
            negated: true,
        }),
    }
}

fn text_operand<'a>(column: &Ident, filter: &'a TextFilter) -> Result<&'a str, QueryError> {
    filter
        .filter
        .as_deref()
        .ok_or_else(|| QueryError::invalid_filter(column.as_str(), "text filter has no value"))
}

fn number_predicate(column: Ident, filter: &NumberFilter) -> Result<Predicate, QueryError> {
    let op = match filter.kind {
        NumberFilterType::Equals => CompareOp::Eq,
        NumberFilterType::NotEqual => CompareOp::NotEq,
        NumberFilterType::LessThan => CompareOp::Lt,
        NumberFilterType::LessThanOrEqual => CompareOp::LtEq,
        NumberFilterType::GreaterThan => CompareOp::Gt,
        NumberFilterType::GreaterThanOrEqual => CompareOp::GtEq,
        NumberFilterType::InRange => {
            let lower = number_operand(&column, filter.filter, "filter")?;
            let upper = number_operand(&column, filter.filter_to, "filterTo")?;
            return Ok(Predicate::Range {
                column,
                lower,
                upper,
            });
        }
        NumberFilterType::Blank | NumberFilterType::NotBlank => {
            return Ok(Predicate::Null {
                column,
                negated: filter.kind == NumberFilterType::NotBlank,
            });
        }
    };
    let value = number_operand(&column, filter.filter, "filter")?;
    Ok(Predicate::Compare { column, op, value })
}

fn number_operand(column: &Ident, value: Option<f64>, name: &str) -> Result<Literal, QueryError> {
    let v = value.ok_or_else(|| {
        QueryError::invalid_filter(column.as_str(), format!("number filter has no '{}'", name))
    })?;
    Literal::number(v).ok_or_else(|| {
        QueryError::invalid_filter(column.as_str(), format!("'{}' is not a finite number", name))
    })
}
