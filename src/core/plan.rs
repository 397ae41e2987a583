//! 单条 SELECT 的类型化描述
//!
//! 所有字段都已校验过，渲染不会失败。

use super::sql::{escape_like, Alias, Dialect, Ident, Literal};
use crate::models::request::{AggFunc, SortDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeShape {
    Contains,
    StartsWith,
    EndsWith,
}

/// 绑定到单列的布尔谓词
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: Ident,
        op: CompareOp,
        value: Literal,
    },
    In {
        column: Ident,
        values: Vec<Literal>,
    },
    Like {
        column: Ident,
        value: String,
        shape: LikeShape,
        negated: bool,
    },
    /// 开区间 `lower < column < upper`
    Range {
        column: Ident,
        lower: Literal,
        upper: Literal,
    },
    Null {
        column: Ident,
        negated: bool,
    },
}

impl Predicate {
    pub fn eq(column: Ident, value: Literal) -> Self {
        Predicate::Compare {
            column,
            op: CompareOp::Eq,
            value,
        }
    }

    pub fn render(&self, dialect: &Dialect) -> String {
        match self {
            Predicate::Compare { column, op, value } => {
                format!("{} {} {}", column, op.as_sql(), dialect.literal(value))
            }
            Predicate::In { column, values } => {
                let list: Vec<String> = values.iter().map(|v| dialect.literal(v)).collect();
                format!("{} IN ({})", column, list.join(", "))
            }
            Predicate::Like {
                column,
                value,
                shape,
                negated,
            } => {
                let (escaped, needs_escape) = escape_like(value);
                let pattern = match shape {
                    LikeShape::Contains => format!("%{}%", escaped),
                    LikeShape::StartsWith => format!("{}%", escaped),
                    LikeShape::EndsWith => format!("%{}", escaped),
                };
                let not = if *negated { "NOT " } else { "" };
                let mut sql = format!("{} {}LIKE {}", column, not, dialect.quote_str(&pattern));
                if needs_escape {
                    sql.push_str(" ESCAPE ");
                    sql.push_str(&dialect.quote_str("\\"));
                }
                sql
            }
            Predicate::Range {
                column,
                lower,
                upper,
            } => format!(
                "({c} > {} AND {c} < {})",
                dialect.literal(lower),
                dialect.literal(upper),
                c = column
            ),
            Predicate::Null { column, negated } => {
                if *negated {
                    format!("{} IS NOT NULL", column)
                } else {
                    format!("{} IS NULL", column)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Column(Ident),
    Aggregate {
        func: AggFunc,
        column: Ident,
        alias: Ident,
    },
    /// 条件聚合：只聚合透视列取值全部命中的行
    Pivoted {
        func: AggFunc,
        column: Ident,
        matches: Vec<(Ident, Literal)>,
        alias: Alias,
    },
}

impl SelectItem {
    /// 结果行里对应的字段名；`*` 没有单一名字
    pub fn output_name(&self) -> Option<&str> {
        match self {
            SelectItem::Wildcard => None,
            SelectItem::Column(c) => Some(c.as_str()),
            SelectItem::Aggregate { alias, .. } => Some(alias.as_str()),
            SelectItem::Pivoted { alias, .. } => Some(alias.as_str()),
        }
    }

    fn render(&self, dialect: &Dialect) -> String {
        match self {
            SelectItem::Wildcard => "*".to_string(),
            SelectItem::Column(c) => c.to_string(),
            SelectItem::Aggregate {
                func,
                column,
                alias,
            } => format!(
                "{}({}) as {}",
                func.as_sql(),
                column,
                dialect.output_name(alias.as_str())
            ),
            SelectItem::Pivoted {
                func,
                column,
                matches,
                alias,
            } => {
                let cond: Vec<String> = matches
                    .iter()
                    .map(|(col, value)| format!("{} = {}", col, dialect.literal(value)))
                    .collect();
                format!(
                    "{}(CASE WHEN {} THEN {} END) as {}",
                    func.as_sql(),
                    cond.join(" AND "),
                    column,
                    dialect.alias(alias)
                )
            }
        }
    }
}

/// 排序键：源表列，或本条查询产出的聚合别名
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Column(Ident),
    Output(Ident),
}

impl SortKey {
    fn render(&self, dialect: &Dialect) -> String {
        match self {
            SortKey::Column(c) => c.to_string(),
            SortKey::Output(alias) => dialect.output_name(alias.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    pub items: Vec<SelectItem>,
    pub relation: Ident,
    pub predicates: Vec<Predicate>,
    pub group_by: Option<Ident>,
    pub order_by: Vec<(SortKey, SortDirection)>,
    pub start_row: usize,
    pub end_row: usize,
}

impl SelectPlan {
    /// 空的 WHERE / ORDER BY 不输出
    pub fn to_sql(&self, dialect: &Dialect) -> String {
        let items: Vec<String> = self.items.iter().map(|i| i.render(dialect)).collect();
        let mut sql = format!("SELECT {} FROM {}", items.join(", "), self.relation);

        if !self.predicates.is_empty() {
            let preds: Vec<String> = self.predicates.iter().map(|p| p.render(dialect)).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&preds.join(" AND "));
        }
        if let Some(group) = &self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group.as_str());
        }
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self
                .order_by
                .iter()
                .map(|(key, dir)| format!("{} {}", key.render(dialect), dir.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }
        sql.push(' ');
        sql.push_str(&dialect.limit(self.start_row, self.end_row));
        sql
    }
}
