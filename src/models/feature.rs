use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::response::Row;
use crate::infra::cache::HasCacheKey;

/// 数据湖中的一条特征记录，按车辆等业务键归组
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(skip)]
    pub key: String,
    #[serde(flatten)]
    pub fields: Row,
}

impl Feature {
    /// 键列缺失或为空值的行不入缓存
    pub fn from_row(row: Row, key_column: &str) -> Option<Self> {
        let key = key_text(row.get(key_column)?)?;
        Some(Self { key, fields: row })
    }
}

impl HasCacheKey for Feature {
    fn cache_key(&self) -> &str {
        &self.key
    }
}

/// 里程缓存的一条：业务键 -> 累计里程
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movement {
    pub key: String,
    pub mileage: i64,
}

impl Movement {
    pub fn from_row(row: &Row) -> Option<Self> {
        let key = key_text(row.get("key")?)?;
        let mileage = match row.get("mileage")? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_number)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        let Some(mileage) = mileage else {
            debug!("里程不是整数，跳过 {}: {:?}", key, row.get("mileage"));
            return None;
        };
        Some(Self { key, mileage })
    }
}

// 只接受落在 i64 范围内的整数值
fn whole_number(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then(|| f as i64)
}

fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn feature_takes_key_from_column() {
        let f = Feature::from_row(row(json!({"vehicle": 4711, "var": "speed"})), "vehicle").unwrap();
        assert_eq!(f.key, "4711");
        // 键列仍保留在输出字段里
        assert_eq!(
            serde_json::to_value(&f).unwrap(),
            json!({"vehicle": 4711, "var": "speed"})
        );
    }

    #[test]
    fn feature_without_key_is_skipped() {
        assert!(Feature::from_row(row(json!({"vehicle": null})), "vehicle").is_none());
        assert!(Feature::from_row(row(json!({"var": "speed"})), "vehicle").is_none());
    }

    #[test]
    fn movement_accepts_numeric_strings() {
        let m = Movement::from_row(&row(json!({"key": "T1", "mileage": "120"}))).unwrap();
        assert_eq!(m, Movement { key: "T1".into(), mileage: 120 });
        let m = Movement::from_row(&row(json!({"key": "T2", "mileage": 99.0}))).unwrap();
        assert_eq!(m.mileage, 99);
        assert!(Movement::from_row(&row(json!({"key": "T3"}))).is_none());
    }

    #[test]
    fn movement_rejects_fractional_or_huge_mileage() {
        assert!(Movement::from_row(&row(json!({"key": "T2", "mileage": 99.7}))).is_none());
        assert!(Movement::from_row(&row(json!({"key": "T4", "mileage": 1e30}))).is_none());
        assert!(Movement::from_row(&row(json!({"key": "T5", "mileage": "12.5"}))).is_none());
    }
}
