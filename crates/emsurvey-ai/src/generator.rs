use anyhow::Result;
use async_trait::async_trait;
use emsurvey_common::template::SurveyTemplate;
use emsurvey_common::types::{AssessmentReport, ProductCapability, Survey};

/// 报告生成输入
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    /// 已填写的调研单
    pub survey: &'a Survey,
    /// 调研单使用的问卷模板
    pub template: &'a SurveyTemplate,
    /// 可推荐的产品能力（仅启用项）
    pub products: &'a [ProductCapability],
}

/// 评估报告生成器 trait（支持多模型扩展）
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// 模型提供商名称
    fn provider(&self) -> &str;

    /// 模型名称
    fn model_name(&self) -> &str;

    /// 根据调研内容生成评估报告
    async fn generate(&self, input: &ReportInput<'_>) -> Result<AssessmentReport>;
}
