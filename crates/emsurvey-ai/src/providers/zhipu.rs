use crate::generator::{ReportGenerator, ReportInput};
use crate::models::{ChatMessage, ChatRequest, ChatResponse, ResponseFormat};
use anyhow::{Context, Result};
use async_trait::async_trait;
use emsurvey_common::types::AssessmentReport;
use reqwest::Client;

pub const DEFAULT_MODEL: &str = "glm-4-flash";
pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// 智谱 AI Provider（OpenAI 兼容接口，GLM-4 系列）
#[derive(Clone)]
pub struct ZhipuProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
}

impl ZhipuProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout_secs: Option<u64>,
        max_tokens: Option<usize>,
        temperature: Option<f32>,
    ) -> Result<Self> {
        let timeout = timeout_secs.unwrap_or(120);
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client,
            max_tokens,
            temperature,
        })
    }

    /// 调用 chat/completions，返回第一条回复内容
    async fn call_api(&self, prompt: &str) -> Result<String> {
        let req = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(crate::prompt::SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: Some(ResponseFormat::json_object()),
        };

        tracing::debug!(
            model = %self.model,
            prompt_length = prompt.len(),
            "Calling Zhipu API"
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("Failed to send request to Zhipu API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body,
                "Zhipu API request failed"
            );
            anyhow::bail!("Zhipu API error {}: {}", status, body);
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .context("Failed to parse Zhipu API response")?;

        tracing::debug!(usage = ?chat_resp.usage, "Zhipu API response received");

        chat_resp
            .first_content()
            .ok_or_else(|| anyhow::anyhow!("Empty response from Zhipu API"))
    }
}

#[async_trait]
impl ReportGenerator for ZhipuProvider {
    fn provider(&self) -> &str {
        "zhipu"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, input: &ReportInput<'_>) -> Result<AssessmentReport> {
        let prompt = crate::prompt::build_report_prompt(input);
        let reply = self.call_api(&prompt).await?;
        crate::parse::parse_report(&reply, self.provider(), &self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let p = ZhipuProvider::new("key".into(), None, None, None, None, None).unwrap();
        assert_eq!(p.model_name(), DEFAULT_MODEL);
        assert_eq!(p.base_url, DEFAULT_BASE_URL);
        assert_eq!(p.provider(), "zhipu");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let p = ZhipuProvider::new(
            "key".into(),
            Some("glm-4-plus".into()),
            Some("http://localhost:9000/v1/".into()),
            Some(5),
            Some(2048),
            Some(0.3),
        )
        .unwrap();
        assert_eq!(p.base_url, "http://localhost:9000/v1");
        assert_eq!(p.model_name(), "glm-4-plus");
    }
}
