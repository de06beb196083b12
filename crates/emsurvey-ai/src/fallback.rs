use crate::generator::{ReportGenerator, ReportInput};
use chrono::Utc;
use emsurvey_common::types::{AssessmentReport, ReadinessLevel, ReportSource};

/// 兜底报告的固定得分
pub const FALLBACK_SCORE: u8 = 60;

/// 静态兜底报告（AI 不可用或结果无法解析时使用）
///
/// 内容固定，仅带入客户名称，并从启用的产品能力中挑选与客户行业匹配的
/// 前三项作为推荐。
pub fn fallback_report(input: &ReportInput<'_>) -> AssessmentReport {
    let survey = input.survey;
    let industry = survey.industry.as_deref();

    let mut recommended: Vec<String> = input
        .products
        .iter()
        .filter(|p| p.enabled)
        .filter(|p| match industry {
            Some(ind) => p.industries.is_empty() || p.industries.iter().any(|i| i == ind),
            None => true,
        })
        .take(3)
        .map(|p| p.name.clone())
        .collect();
    if recommended.is_empty() {
        recommended.push("能耗在线监测".to_string());
    }

    AssessmentReport {
        overall_score: FALLBACK_SCORE,
        level: ReadinessLevel::from_score(FALLBACK_SCORE),
        summary: format!(
            "{}已具备建设能源管理系统的基本条件，建议在补齐计量基础后分阶段实施。本报告为系统预设评估，仅供参考。",
            survey.customer_name
        ),
        highlights: vec![
            "客户已明确能源管理建设意向".to_string(),
            "具备开展现场调研与数据采集的条件".to_string(),
        ],
        risks: vec![
            "分项计量覆盖不足可能影响能耗分析精度".to_string(),
            "既有系统对接范围需进一步确认".to_string(),
        ],
        recommended_products: recommended,
        suggestions: vec![
            "安排现场踏勘，核实配电结构与表计清单".to_string(),
            "明确一期建设范围与预算，输出初步方案".to_string(),
            "梳理能源管理目标，确定考核指标".to_string(),
        ],
        source: ReportSource::Fallback,
        provider: None,
        model: None,
        generated_at: Utc::now(),
    }
}

/// 调用生成器；未配置或任何失败均返回兜底报告。单次调用，不重试。
pub async fn generate_with_fallback(
    generator: Option<&dyn ReportGenerator>,
    input: &ReportInput<'_>,
) -> AssessmentReport {
    let Some(generator) = generator else {
        tracing::info!(survey_id = %input.survey.id, "No report generator configured, using fallback report");
        return fallback_report(input);
    };

    match generator.generate(input).await {
        Ok(report) => {
            tracing::info!(
                survey_id = %input.survey.id,
                provider = generator.provider(),
                model = generator.model_name(),
                score = report.overall_score,
                "Assessment report generated"
            );
            report
        }
        Err(e) => {
            tracing::warn!(
                survey_id = %input.survey.id,
                provider = generator.provider(),
                error = %e,
                "Report generation failed, using fallback report"
            );
            fallback_report(input)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use emsurvey_common::template::{get_template, DEFAULT_TEMPLATE_ID};
    use emsurvey_common::types::{ProductCapability, Survey, SurveyStatus};
    use serde_json::json;

    fn survey() -> Survey {
        let now = Utc::now();
        Survey {
            id: "s1".into(),
            title: "t".into(),
            customer_name: "某钢厂".into(),
            industry: Some("steel".into()),
            region_code: None,
            template_id: DEFAULT_TEMPLATE_ID.into(),
            status: SurveyStatus::Completed,
            answers: json!({}),
            report: None,
            creator_id: "u1".into(),
            presales_id: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn product(name: &str, industries: &[&str]) -> ProductCapability {
        let now = Utc::now();
        ProductCapability {
            id: name.into(),
            name: name.into(),
            category: "c".into(),
            description: None,
            features: vec![],
            industries: industries.iter().map(|s| s.to_string()).collect(),
            enabled: true,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl ReportGenerator for FailingGenerator {
        fn provider(&self) -> &str {
            "failing"
        }

        fn model_name(&self) -> &str {
            "none"
        }

        async fn generate(&self, _input: &ReportInput<'_>) -> Result<AssessmentReport> {
            anyhow::bail!("connection refused")
        }
    }

    struct FixedGenerator;

    #[async_trait]
    impl ReportGenerator for FixedGenerator {
        fn provider(&self) -> &str {
            "fixed"
        }

        fn model_name(&self) -> &str {
            "fixed-1"
        }

        async fn generate(&self, input: &ReportInput<'_>) -> Result<AssessmentReport> {
            Ok(AssessmentReport {
                overall_score: 88,
                level: ReadinessLevel::High,
                summary: format!("{} 计量基础完善", input.survey.customer_name),
                highlights: vec!["已有电力监控系统".into()],
                risks: vec![],
                recommended_products: vec!["碳排放核算".into()],
                suggestions: vec![],
                source: ReportSource::Ai,
                provider: Some(self.provider().to_string()),
                model: Some(self.model_name().to_string()),
                generated_at: Utc::now(),
            })
        }
    }

    #[test]
    fn fallback_recommends_matching_products() {
        let s = survey();
        let products = vec![
            product("楼宇节能", &["building"]),
            product("能耗监测", &["steel", "chemical"]),
            product("碳管理", &[]),
        ];
        let template = get_template(DEFAULT_TEMPLATE_ID).unwrap();
        let report = fallback_report(&ReportInput {
            survey: &s,
            template,
            products: &products,
        });
        assert_eq!(report.source, ReportSource::Fallback);
        assert_eq!(report.level, ReadinessLevel::Medium);
        assert_eq!(report.recommended_products, vec!["能耗监测", "碳管理"]);
        assert!(report.summary.starts_with("某钢厂"));
    }

    #[tokio::test]
    async fn failures_and_missing_generator_fall_back() {
        let s = survey();
        let template = get_template(DEFAULT_TEMPLATE_ID).unwrap();
        let input = ReportInput {
            survey: &s,
            template,
            products: &[],
        };
        let report = generate_with_fallback(Some(&FailingGenerator), &input).await;
        assert_eq!(report.source, ReportSource::Fallback);
        assert_eq!(report.recommended_products, vec!["能耗在线监测"]);

        let report = generate_with_fallback(None, &input).await;
        assert_eq!(report.source, ReportSource::Fallback);
    }

    #[tokio::test]
    async fn successful_generation_is_returned_as_is() {
        let s = survey();
        let template = get_template(DEFAULT_TEMPLATE_ID).unwrap();
        let input = ReportInput {
            survey: &s,
            template,
            products: &[],
        };
        let report = generate_with_fallback(Some(&FixedGenerator), &input).await;
        assert_eq!(report.source, ReportSource::Ai);
        assert_eq!(report.overall_score, 88);
        assert_eq!(report.provider.as_deref(), Some("fixed"));
        assert_eq!(report.model.as_deref(), Some("fixed-1"));
        assert_eq!(report.summary, "某钢厂 计量基础完善");
    }
}
