use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---- User & Auth types ----

/// 用户帐号
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct User {
    /// 唯一标识
    pub id: String,
    /// 登录用户名
    pub username: String,
    /// 密码哈希（bcrypt）
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Token 版本（修改密码后旧 JWT 失效）
    #[serde(skip_serializing, default)]
    pub token_version: i64,
    /// 显示名称
    pub display_name: Option<String>,
    /// 邮箱
    pub email: Option<String>,
    /// 手机号
    pub phone: Option<String>,
    /// 角色 ID
    pub role_id: String,
    /// 角色编码（查询时填充）
    pub role_code: Option<String>,
    /// 角色名称（查询时填充）
    pub role_name: Option<String>,
    /// 是否启用
    pub enabled: bool,
    /// 最近登录时间
    pub last_login_at: Option<DateTime<Utc>>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// 登录请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    /// 登录用户名（必填）
    pub username: String,
    /// 登录密码（必填）
    pub password: String,
}

/// 登录响应
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// JWT Access Token
    pub access_token: String,
    /// Token 有效期（秒）
    pub expires_in: u64,
    /// 当前用户
    pub user: User,
}

/// 修改密码请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChangePasswordRequest {
    /// 当前密码
    pub current_password: String,
    /// 新密码（至少 4 位）
    pub new_password: String,
}

/// 管理员重置密码请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ResetPasswordRequest {
    /// 新密码（至少 4 位）
    pub new_password: String,
}

/// 创建用户请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    /// 登录用户名（至少 4 位，唯一）
    pub username: String,
    /// 初始密码（至少 4 位）
    pub password: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// 角色 ID（必填）
    pub role_id: String,
    /// 是否启用（默认 true）
    pub enabled: Option<bool>,
}

/// 更新用户请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    pub display_name: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub role_id: Option<String>,
    pub enabled: Option<bool>,
}

/// 用户列表过滤条件
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub username_contains: Option<String>,
    pub role_id_eq: Option<String>,
    pub enabled_eq: Option<bool>,
}

// ---- Role types ----

/// 角色
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Role {
    pub id: String,
    /// 角色编码（唯一，如 admin / sales / presales）
    pub code: String,
    /// 角色名称
    pub name: String,
    pub description: Option<String>,
    /// 权限标识列表
    pub permissions: Vec<String>,
    /// 是否系统内置（内置角色不可删除）
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建角色请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateRoleRequest {
    /// 角色编码（小写字母、数字、下划线）
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

/// 更新角色请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub permissions: Option<Vec<String>>,
}

// ---- Dictionary types ----

/// 字典条目
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DictionaryItem {
    pub id: String,
    /// 字典类型（如 industry, survey_status）
    pub dict_type: String,
    /// 字典键（同一 dict_type 下唯一）
    pub dict_key: String,
    /// 显示标签
    pub dict_label: String,
    /// 字典值（可选）
    pub dict_value: Option<String>,
    pub sort_order: i32,
    pub enabled: bool,
    /// 是否系统内置（内置项不可删除）
    pub is_system: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建字典条目请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateDictionaryRequest {
    pub dict_type: String,
    pub dict_key: String,
    pub dict_label: String,
    pub dict_value: Option<String>,
    pub sort_order: Option<i32>,
    pub enabled: Option<bool>,
    pub description: Option<String>,
}

/// 更新字典条目请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateDictionaryRequest {
    pub dict_label: Option<String>,
    pub dict_value: Option<Option<String>>,
    pub sort_order: Option<i32>,
    pub enabled: Option<bool>,
    pub description: Option<Option<String>>,
}

/// 字典类型摘要
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DictionaryTypeSummary {
    pub dict_type: String,
    pub dict_type_label: String,
    /// 该类型下的条目数量
    pub count: u64,
}

/// 字典类型
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DictionaryType {
    pub dict_type: String,
    pub dict_type_label: String,
    pub sort_order: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建字典类型请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateDictionaryTypeRequest {
    pub dict_type: String,
    pub dict_type_label: String,
    pub sort_order: Option<i32>,
    pub description: Option<String>,
}

/// 更新字典类型请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateDictionaryTypeRequest {
    pub dict_type_label: Option<String>,
    pub sort_order: Option<i32>,
    pub description: Option<Option<String>>,
}

// ---- Region types ----

/// 行政区划
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Region {
    /// 区划代码（主键）
    pub code: String,
    pub name: String,
    /// 上级区划代码（省级为空）
    pub parent_code: Option<String>,
    /// 层级：1 省 / 2 市 / 3 区县
    pub level: i32,
    pub sort_order: i32,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 区划树节点
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RegionNode {
    pub code: String,
    pub name: String,
    pub level: i32,
    #[schema(no_recursion)]
    pub children: Vec<RegionNode>,
}

/// 创建区划请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateRegionRequest {
    pub code: String,
    pub name: String,
    pub parent_code: Option<String>,
    pub sort_order: Option<i32>,
}

/// 更新区划请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateRegionRequest {
    pub name: Option<String>,
    pub sort_order: Option<i32>,
}

// ---- Survey types ----

/// 调研单状态：草稿 → 填写中 → 已完成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    Draft,
    Filling,
    Completed,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Filling => "filling",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SurveyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "filling" => Ok(Self::Filling),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown survey status: {other}")),
        }
    }
}

/// 客户调研单
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Survey {
    pub id: String,
    pub title: String,
    pub customer_name: String,
    pub industry: Option<String>,
    pub region_code: Option<String>,
    pub template_id: String,
    pub status: SurveyStatus,
    /// 问卷答案（字段 key → 值）
    pub answers: Value,
    /// 评估报告（提交后生成）
    pub report: Option<AssessmentReport>,
    /// 创建人
    pub creator_id: String,
    /// 售前负责人
    pub presales_id: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建调研单请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateSurveyRequest {
    pub title: String,
    pub customer_name: String,
    pub industry: Option<String>,
    pub region_code: Option<String>,
    /// 问卷模板 ID（默认 ems-presales-v1）
    pub template_id: Option<String>,
    pub presales_id: Option<String>,
    pub answers: Option<Value>,
}

/// 更新调研单请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateSurveyRequest {
    pub title: Option<String>,
    pub customer_name: Option<String>,
    pub industry: Option<Option<String>>,
    pub region_code: Option<Option<String>>,
    pub presales_id: Option<Option<String>>,
    /// 整体替换答案
    pub answers: Option<Value>,
}

/// 调研单列表过滤条件
#[derive(Debug, Clone, Default)]
pub struct SurveyFilter {
    /// 标题或客户名称包含
    pub keyword: Option<String>,
    pub status_eq: Option<SurveyStatus>,
    pub creator_id_eq: Option<String>,
    /// 仅返回该用户创建或负责的调研单
    pub visible_to: Option<String>,
}

// ---- Assessment report types ----

/// 客户 EMS 建设成熟度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessLevel {
    High,
    Medium,
    Low,
}

impl ReadinessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// 按综合得分推导等级
    pub fn from_score(score: u8) -> Self {
        match score {
            75..=u8::MAX => Self::High,
            45..=74 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// 报告来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    Ai,
    Fallback,
}

/// 调研评估报告
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AssessmentReport {
    /// 综合得分（0-100）
    pub overall_score: u8,
    pub level: ReadinessLevel,
    pub summary: String,
    pub highlights: Vec<String>,
    pub risks: Vec<String>,
    pub recommended_products: Vec<String>,
    pub suggestions: Vec<String>,
    pub source: ReportSource,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub generated_at: DateTime<Utc>,
}

// ---- Product capability types ----

/// 产品能力
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProductCapability {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub features: Vec<String>,
    /// 适用行业（字典 industry 的 key）
    pub industries: Vec<String>,
    pub enabled: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建产品能力请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
    pub industries: Option<Vec<String>>,
    pub enabled: Option<bool>,
    pub sort_order: Option<i32>,
}

/// 更新产品能力请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<Option<String>>,
    pub features: Option<Vec<String>>,
    pub industries: Option<Vec<String>>,
    pub enabled: Option<bool>,
    pub sort_order: Option<i32>,
}

/// 产品能力过滤条件
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_eq: Option<String>,
    pub enabled_eq: Option<bool>,
    pub name_contains: Option<String>,
}

// ---- Message types ----

/// 站内消息
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Message {
    pub id: String,
    pub recipient_id: String,
    /// 发送人（系统消息为空）
    pub sender_id: Option<String>,
    pub title: String,
    pub content: String,
    /// 消息类型：system / report / notice
    pub msg_type: String,
    /// 关联业务 ID（如调研单 ID）
    pub related_id: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// 发送消息请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SendMessageRequest {
    pub recipient_id: String,
    pub title: String,
    pub content: String,
    /// 默认 notice
    pub msg_type: Option<String>,
    pub related_id: Option<String>,
}

/// 新消息（存储层写入参数）
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub title: String,
    pub content: String,
    pub msg_type: String,
    pub related_id: Option<String>,
}

// ---- System log types ----

/// 系统操作日志
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SystemLog {
    pub id: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    /// 模块（auth / user / role / survey / product / dictionary / region）
    pub module: String,
    /// 操作（login / create / update / delete / submit ...）
    pub action: String,
    pub target_id: Option<String>,
    pub detail: Option<String>,
    pub trace_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 新日志（存储层写入参数）
#[derive(Debug, Clone, Default)]
pub struct NewSystemLog {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub module: String,
    pub action: String,
    pub target_id: Option<String>,
    pub detail: Option<String>,
    pub trace_id: Option<String>,
}

/// 日志过滤条件
#[derive(Debug, Clone, Default)]
pub struct SystemLogFilter {
    pub module_eq: Option<String>,
    pub action_eq: Option<String>,
    pub username_contains: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survey_status_roundtrips_through_str() {
        for status in [
            SurveyStatus::Draft,
            SurveyStatus::Filling,
            SurveyStatus::Completed,
        ] {
            let parsed: SurveyStatus = status.as_str().parse().expect("status should parse");
            assert_eq!(parsed, status);
        }
        assert!("archived".parse::<SurveyStatus>().is_err());
    }

    #[test]
    fn readiness_level_follows_score_bands() {
        assert_eq!(ReadinessLevel::from_score(100), ReadinessLevel::High);
        assert_eq!(ReadinessLevel::from_score(75), ReadinessLevel::High);
        assert_eq!(ReadinessLevel::from_score(74), ReadinessLevel::Medium);
        assert_eq!(ReadinessLevel::from_score(45), ReadinessLevel::Medium);
        assert_eq!(ReadinessLevel::from_score(0), ReadinessLevel::Low);
    }

    #[test]
    fn user_serialization_hides_credentials() {
        let now = Utc::now();
        let user = User {
            id: "1".into(),
            username: "alice".into(),
            password_hash: "$2b$secret".into(),
            token_version: 3,
            display_name: None,
            email: None,
            phone: None,
            role_id: "r1".into(),
            role_code: Some("sales".into()),
            role_name: None,
            enabled: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).expect("user should serialize");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("token_version").is_none());
        assert_eq!(json["role_code"], "sales");
    }
}
