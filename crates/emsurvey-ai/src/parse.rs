//! Turning a model reply into an [`AssessmentReport`].
//!
//! Models tend to wrap JSON in Markdown fences or add a sentence before and
//! after it, so the parser looks for the outermost `{ ... }` span and only
//! then deserializes. Missing list fields default to empty; a missing or
//! unknown `level` is derived from the score.

use anyhow::{Context, Result};
use chrono::Utc;
use emsurvey_common::types::{AssessmentReport, ReadinessLevel, ReportSource};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RawReport {
    overall_score: Value,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    highlights: Vec<String>,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    recommended_products: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

/// 提取回复中的 JSON 对象（容忍 ```json 代码块及前后说明文字）
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn score_from(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, 100.0) as u8)
}

fn level_from(raw: Option<&str>, score: u8) -> ReadinessLevel {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("high") => ReadinessLevel::High,
        Some("medium") => ReadinessLevel::Medium,
        Some("low") => ReadinessLevel::Low,
        _ => ReadinessLevel::from_score(score),
    }
}

/// 解析模型回复为评估报告
pub fn parse_report(content: &str, provider: &str, model: &str) -> Result<AssessmentReport> {
    let json = extract_json_object(content)
        .ok_or_else(|| anyhow::anyhow!("No JSON object found in model reply"))?;
    let raw: RawReport =
        serde_json::from_str(json).context("Model reply is not a valid report object")?;
    let score = score_from(&raw.overall_score)
        .ok_or_else(|| anyhow::anyhow!("overall_score is not a number: {}", raw.overall_score))?;
    if raw.summary.trim().is_empty() {
        anyhow::bail!("Model reply has an empty summary");
    }

    Ok(AssessmentReport {
        overall_score: score,
        level: level_from(raw.level.as_deref(), score),
        summary: raw.summary.trim().to_string(),
        highlights: raw.highlights,
        risks: raw.risks,
        recommended_products: raw.recommended_products,
        suggestions: raw.suggestions,
        source: ReportSource::Ai,
        provider: Some(provider.to_string()),
        model: Some(model.to_string()),
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_reply() {
        let reply = "好的，以下是评估结果：\n```json\n{\"overall_score\": 82, \"level\": \"HIGH\", \"summary\": \"基础扎实\", \"highlights\": [\"计量完善\"], \"recommended_products\": [\"能耗监测\"]}\n```\n";
        let report = parse_report(reply, "zhipu", "glm-4-flash").unwrap();
        assert_eq!(report.overall_score, 82);
        assert_eq!(report.level, ReadinessLevel::High);
        assert_eq!(report.highlights, vec!["计量完善".to_string()]);
        assert!(report.risks.is_empty());
        assert_eq!(report.source, ReportSource::Ai);
        assert_eq!(report.model.as_deref(), Some("glm-4-flash"));
    }

    #[test]
    fn score_is_clamped_and_level_derived() {
        let reply = r#"{"overall_score": 140, "summary": "x"}"#;
        let report = parse_report(reply, "p", "m").unwrap();
        assert_eq!(report.overall_score, 100);
        assert_eq!(report.level, ReadinessLevel::High);

        let reply = r#"{"overall_score": "50.4", "level": "unknown", "summary": "x"}"#;
        let report = parse_report(reply, "p", "m").unwrap();
        assert_eq!(report.overall_score, 50);
        assert_eq!(report.level, ReadinessLevel::Medium);
    }

    #[test]
    fn rejects_unusable_replies() {
        assert!(parse_report("抱歉，我无法完成该请求。", "p", "m").is_err());
        assert!(parse_report(r#"{"summary": "no score"}"#, "p", "m").is_err());
        assert!(parse_report(r#"{"overall_score": "abc", "summary": "x"}"#, "p", "m").is_err());
        assert!(parse_report(r#"{"overall_score": 60, "summary": "  "}"#, "p", "m").is_err());
    }

    #[test]
    fn extract_requires_braces_in_order() {
        assert_eq!(extract_json_object("} nothing {"), None);
        assert_eq!(extract_json_object("a {\"k\":1} b"), Some("{\"k\":1}"));
    }
}
