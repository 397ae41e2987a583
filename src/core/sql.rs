//! 标识符校验与字面量转义
//!
//! 所有拼进 SQL 文本的列名、表名、字面量都必须经过这里：标识符只接受
//! `[A-Za-z_][A-Za-z0-9_]*`，不合规直接拒绝而不是转义。

use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::error::QueryError;

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

// 表名允许带一级 schema 前缀
static RELATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap()
});

/// 已校验的 SQL 标识符
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    pub fn new(name: &str) -> Result<Self, QueryError> {
        if IDENT_RE.is_match(name) {
            Ok(Ident(name.to_string()))
        } else {
            Err(QueryError::UnsafeIdentifier(name.to_string()))
        }
    }

    pub fn relation(name: &str) -> Result<Self, QueryError> {
        if RELATION_RE.is_match(name) {
            Ok(Ident(name.to_string()))
        } else {
            Err(QueryError::UnsafeIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 透视列合成的输出别名，例如 `United States_gold`
///
/// 合成名来自数据本身，不一定是普通标识符；渲染时按方言加引号。
/// 含引号字符或控制字符的名字一律拒绝。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias(String);

impl Alias {
    pub fn new(name: &str) -> Result<Self, QueryError> {
        let unsafe_char = |c: char| c == '"' || c == '`' || c == '\\' || c.is_control();
        if name.is_empty() || name.chars().any(unsafe_char) {
            return Err(QueryError::UnsafeIdentifier(name.to_string()));
        }
        Ok(Alias(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// SQL 字面量；数字保存为已规范化的文本
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(String),
}

impl Literal {
    pub fn text(value: &str) -> Self {
        Literal::Text(value.to_string())
    }

    /// 非有限值 (NaN / inf) 无法写成 SQL 数字
    pub fn number(value: f64) -> Option<Self> {
        value.is_finite().then(|| Literal::Number(value.to_string()))
    }

    /// 整数与定点小数原样保留全部位数，只有科学计数法才经过 f64
    pub fn parse_number(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(int) = value.parse::<i128>() {
            return Some(Literal::Number(int.to_string()));
        }
        if let Ok(dec) = value.parse::<Decimal>() {
            return Some(Literal::Number(dec.to_string()));
        }
        value.parse::<f64>().ok().and_then(Literal::number)
    }

    pub fn json_number(value: &serde_json::Number) -> Self {
        Literal::Number(value.to_string())
    }
}

/// 分页子句的写法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Paging {
    /// `LIMIT <startRow>,<endRow>`，直接写出窗口两端
    Bounds,
    /// `LIMIT <startRow>,<count>` (MySQL)
    OffsetCount,
    /// `LIMIT <count> OFFSET <startRow>` (PostgreSQL)
    LimitOffset,
}

impl FromStr for Paging {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bounds" => Ok(Paging::Bounds),
            "offset_count" => Ok(Paging::OffsetCount),
            "limit_offset" => Ok(Paging::LimitOffset),
            other => Err(format!("unknown paging style '{}'", other)),
        }
    }
}

/// 目标库的文本差异：分页写法、字符串内反斜杠是否转义、别名引号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub paging: Paging,
    pub backslash_escapes: bool,
    pub identifier_quote: char,
    /// 未加引号的标识符会被折叠成小写 (PostgreSQL)
    pub folds_case: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            paging: Paging::Bounds,
            backslash_escapes: false,
            identifier_quote: '"',
            folds_case: false,
        }
    }
}

impl Dialect {
    pub fn mysql() -> Self {
        Self {
            paging: Paging::OffsetCount,
            backslash_escapes: true,
            identifier_quote: '`',
            folds_case: false,
        }
    }

    pub fn postgres() -> Self {
        Self {
            paging: Paging::LimitOffset,
            backslash_escapes: false,
            identifier_quote: '"',
            folds_case: true,
        }
    }

    pub fn with_paging(mut self, paging: Paging) -> Self {
        self.paging = paging;
        self
    }

    pub fn quote_str(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' if self.backslash_escapes => out.push_str("\\\\"),
                _ => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    pub fn literal(&self, literal: &Literal) -> String {
        match literal {
            Literal::Text(s) => self.quote_str(s),
            Literal::Number(n) => n.clone(),
        }
    }

    pub fn alias(&self, alias: &Alias) -> String {
        self.output_name(alias.as_str())
    }

    /// 结果集里的列名必须与响应中的字段名逐字一致
    ///
    /// 非普通标识符加引号；折叠大小写的库里含大写字母的名字也加引号。
    pub fn output_name(&self, name: &str) -> String {
        let folded = self.folds_case && name.chars().any(|c| c.is_ascii_uppercase());
        if IDENT_RE.is_match(name) && !folded {
            name.to_string()
        } else {
            let q = self.identifier_quote;
            format!("{q}{}{q}", name)
        }
    }

    /// 半开窗口 `[start, end)` 的分页子句
    pub fn limit(&self, start: usize, end: usize) -> String {
        let count = end.saturating_sub(start);
        match self.paging {
            Paging::Bounds => format!("LIMIT {},{}", start, end),
            Paging::OffsetCount => format!("LIMIT {},{}", start, count),
            Paging::LimitOffset => format!("LIMIT {} OFFSET {}", count, start),
        }
    }
}

/// LIKE 模式中的通配符转义，返回值的布尔位表示是否发生了转义
pub fn escape_like(value: &str) -> (String, bool) {
    let mut escaped = false;
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
            escaped = true;
        }
        out.push(c);
    }
    (out, escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert_eq!(Ident::new("objectid").unwrap().as_str(), "objectid");
        assert!(Ident::new("_col_2").is_ok());
        assert!(Ident::relation("lake.overview").is_ok());
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        for bad in ["", "1abc", "a b", "a;drop table x", "a'b", "a.b", "count(*)", "a--"] {
            assert!(
                matches!(Ident::new(bad), Err(QueryError::UnsafeIdentifier(_))),
                "{bad} should be rejected"
            );
        }
        assert!(Ident::relation("a.b.c").is_err());
        assert!(Ident::relation("overview;").is_err());
    }

    #[test]
    fn quotes_embedded_single_quotes() {
        let d = Dialect::default();
        assert_eq!(d.quote_str("O'Brien"), "'O''Brien'");
        assert_eq!(d.quote_str(r"a\b"), r"'a\b'");
    }

    #[test]
    fn mysql_doubles_backslashes() {
        assert_eq!(Dialect::mysql().quote_str(r"a\'b"), r"'a\\''b'");
    }

    #[test]
    fn number_literals_stay_unquoted() {
        let d = Dialect::default();
        assert_eq!(d.literal(&Literal::number(5.0).unwrap()), "5");
        assert_eq!(d.literal(&Literal::number(-2.5).unwrap()), "-2.5");
        assert_eq!(Literal::parse_number("12; drop"), None);
        assert_eq!(Literal::parse_number("inf"), None);
        assert_eq!(
            Literal::parse_number(" 9007199254740993 "),
            Some(Literal::Number("9007199254740993".into()))
        );
        assert_eq!(
            Literal::parse_number("-0.10"),
            Some(Literal::Number("-0.10".into()))
        );
        assert_eq!(Literal::parse_number("1e3"), Some(Literal::Number("1000".into())));
        assert_eq!(Literal::number(f64::NAN), None);
    }

    #[test]
    fn renders_each_paging_style() {
        assert_eq!(Dialect::default().limit(100, 200), "LIMIT 100,200");
        assert_eq!(Dialect::mysql().limit(100, 200), "LIMIT 100,100");
        assert_eq!(Dialect::postgres().limit(100, 200), "LIMIT 100 OFFSET 100");
        assert_eq!(Dialect::postgres().limit(7, 7), "LIMIT 0 OFFSET 7");
    }

    #[test]
    fn quotes_only_non_plain_aliases() {
        let d = Dialect::mysql();
        assert_eq!(d.alias(&Alias::new("US_gold").unwrap()), "US_gold");
        assert_eq!(d.alias(&Alias::new("United States_gold").unwrap()), "`United States_gold`");
        assert!(Alias::new("a\"b").is_err());
        assert_eq!(Dialect::mysql().output_name("Gold"), "Gold");
        assert!(Alias::new("a`b").is_err());
    }

    #[test]
    fn postgres_quotes_mixed_case_output_names() {
        let d = Dialect::postgres();
        assert_eq!(d.output_name("gold"), "gold");
        assert_eq!(d.output_name("Gold"), "\"Gold\"");
        assert_eq!(d.alias(&Alias::new("Ireland_Gold").unwrap()), "\"Ireland_Gold\"");
        assert_eq!(Dialect::default().output_name("Gold"), "Gold");
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("abc"), ("abc".to_string(), false));
        assert_eq!(escape_like("50%_x"), (r"50\%\_x".to_string(), true));
    }

    #[test]
    fn parses_paging_names() {
        assert_eq!("limit_offset".parse::<Paging>(), Ok(Paging::LimitOffset));
        assert!("page".parse::<Paging>().is_err());
    }
}
