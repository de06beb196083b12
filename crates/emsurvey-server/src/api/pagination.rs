use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::IntoParams;
use utoipa::ToSchema;

const DEFAULT_PAGE_LIMIT: u64 = 20;
const MAX_PAGE_LIMIT: u64 = 1000;

/// 通用分页参数（`limit` / `offset`，兼容字符串形式的数字）
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// 每页条数（默认 20，最大 1000）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    /// 偏移量（默认 0）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum U64Input {
    Number(u64),
    Text(String),
}

fn deserialize_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<U64Input>::deserialize(deserializer)? {
        None => Ok(None),
        Some(U64Input::Number(number)) => Ok(Some(number)),
        Some(U64Input::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(U64Input::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(DeError::custom),
    }
}

impl PaginationParams {
    pub fn limit(&self) -> usize {
        match self.limit {
            Some(0) | None => DEFAULT_PAGE_LIMIT as usize,
            Some(n) => n.min(MAX_PAGE_LIMIT) as usize,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PaginationParams {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn defaults_and_caps() {
        let p = parse("{}");
        assert_eq!(p.limit(), 20);
        assert_eq!(p.offset(), 0);
        assert_eq!(parse(r#"{"limit": 5000}"#).limit(), 1000);
        assert_eq!(parse(r#"{"limit": 0}"#).limit(), 20);
    }

    #[test]
    fn accepts_numeric_strings() {
        let p = parse(r#"{"limit": " 15 ", "offset": "30"}"#);
        assert_eq!(p.limit(), 15);
        assert_eq!(p.offset(), 30);
        assert_eq!(parse(r#"{"limit": ""}"#).limit(), 20);
        assert!(serde_json::from_str::<PaginationParams>(r#"{"limit": "ten"}"#).is_err());
    }
}
