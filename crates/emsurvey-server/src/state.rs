use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use emsurvey_ai::ReportGenerator;
use emsurvey_storage::SurveyStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SurveyStore>,
    /// 未配置 AI 时为 None，报告直接走兜底
    pub report_generator: Option<Arc<dyn ReportGenerator>>,
    pub start_time: DateTime<Utc>,
    pub jwt_secret: Arc<String>,
    pub token_expire_secs: u64,
    pub config: Arc<ServerConfig>,
}
