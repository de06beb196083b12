//! Built-in EMS pre-sales questionnaire.
//!
//! The service ships exactly one template, [`DEFAULT_TEMPLATE_ID`]. It is
//! assembled once on first use and never persisted; surveys only store the
//! template id alongside their answers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Id of the questionnaire every survey is created from.
pub const DEFAULT_TEMPLATE_ID: &str = "ems-presales-v1";

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Select,
    MultiSelect,
    Date,
    Phone,
}

/// 选项
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// 问卷字段
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SurveyField {
    /// 答案中的键
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    pub options: Vec<FieldOption>,
    pub placeholder: Option<String>,
    /// 数值字段单位（如 kWh）
    pub unit: Option<String>,
}

/// 问卷分组
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SurveySection {
    pub key: String,
    pub title: String,
    pub fields: Vec<SurveyField>,
}

/// 问卷模板
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SurveyTemplate {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub sections: Vec<SurveySection>,
}

impl SurveyTemplate {
    pub fn fields(&self) -> impl Iterator<Item = &SurveyField> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn field(&self, key: &str) -> Option<&SurveyField> {
        self.fields().find(|f| f.key == key)
    }
}

/// 答案校验错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

static DEFAULT_TEMPLATE: LazyLock<SurveyTemplate> = LazyLock::new(build_default_template);

/// All templates known to the service.
pub fn list_templates() -> Vec<&'static SurveyTemplate> {
    vec![&DEFAULT_TEMPLATE]
}

pub fn get_template(id: &str) -> Option<&'static SurveyTemplate> {
    list_templates().into_iter().find(|t| t.id == id)
}

/// Check `answers` against the template.
///
/// Unknown keys are ignored so that older clients can keep extra data.
pub fn validate_answers(template: &SurveyTemplate, answers: &Map<String, Value>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for field in template.fields() {
        let value = answers.get(&field.key).filter(|v| !is_blank(v));
        match value {
            None if field.required => {
                errors.push(FieldError::new(&field.key, format!("{} 为必填项", field.label)));
            }
            None => {}
            Some(v) => {
                if let Err(msg) = check_value(field, v) {
                    errors.push(FieldError::new(&field.key, msg));
                }
            }
        }
    }
    errors
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn option_exists(field: &SurveyField, value: &str) -> bool {
    field.options.iter().any(|o| o.value == value)
}

fn check_value(field: &SurveyField, v: &Value) -> Result<(), String> {
    match field.field_type {
        FieldType::Text | FieldType::Textarea => match v {
            Value::String(_) => Ok(()),
            _ => Err(format!("{} 必须为文本", field.label)),
        },
        FieldType::Number => {
            let numeric = match v {
                Value::Number(n) => n.as_f64().is_some_and(f64::is_finite),
                // "NaN" 和 "inf" 也能被 f64 解析
                Value::String(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
                _ => false,
            };
            if numeric {
                Ok(())
            } else {
                Err(format!("{} 必须为数字", field.label))
            }
        }
        FieldType::Select => match v.as_str() {
            Some(s) if option_exists(field, s) => Ok(()),
            _ => Err(format!("{} 的取值不在可选范围内", field.label)),
        },
        FieldType::MultiSelect => {
            let Some(items) = v.as_array() else {
                return Err(format!("{} 必须为数组", field.label));
            };
            let all_known = items
                .iter()
                .all(|item| item.as_str().is_some_and(|s| option_exists(field, s)));
            if all_known {
                Ok(())
            } else {
                Err(format!("{} 包含无效选项", field.label))
            }
        }
        FieldType::Date => match v.as_str() {
            Some(s) if chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => Ok(()),
            _ => Err(format!("{} 日期格式应为 YYYY-MM-DD", field.label)),
        },
        FieldType::Phone => match v.as_str() {
            Some(s) if is_phone(s) => Ok(()),
            _ => Err(format!("{} 格式不正确", field.label)),
        },
    }
}

fn is_phone(s: &str) -> bool {
    let s = s.trim();
    (7..=20).contains(&s.len())
        && s.chars().all(|c| c.is_ascii_digit() || c == '+' || c == '-')
        && s.chars().filter(char::is_ascii_digit).count() >= 7
}

fn opts(pairs: &[(&str, &str)]) -> Vec<FieldOption> {
    pairs
        .iter()
        .map(|(value, label)| FieldOption {
            value: (*value).to_string(),
            label: (*label).to_string(),
        })
        .collect()
}

fn field(key: &str, label: &str, field_type: FieldType, required: bool) -> SurveyField {
    SurveyField {
        key: key.to_string(),
        label: label.to_string(),
        field_type,
        required,
        options: Vec::new(),
        placeholder: None,
        unit: None,
    }
}

fn with_options(mut f: SurveyField, pairs: &[(&str, &str)]) -> SurveyField {
    f.options = opts(pairs);
    f
}

fn with_unit(mut f: SurveyField, unit: &str) -> SurveyField {
    f.unit = Some(unit.to_string());
    f
}

fn with_placeholder(mut f: SurveyField, placeholder: &str) -> SurveyField {
    f.placeholder = Some(placeholder.to_string());
    f
}

const INDUSTRY_OPTIONS: &[(&str, &str)] = &[
    ("manufacturing", "制造业"),
    ("chemical", "化工"),
    ("steel", "钢铁冶金"),
    ("building", "商业楼宇"),
    ("park", "工业园区"),
    ("hospital", "医院"),
    ("school", "学校"),
    ("data_center", "数据中心"),
    ("other", "其他"),
];

const ENERGY_TYPE_OPTIONS: &[(&str, &str)] = &[
    ("electricity", "电"),
    ("water", "水"),
    ("gas", "天然气"),
    ("steam", "蒸汽"),
    ("heat", "热力"),
    ("compressed_air", "压缩空气"),
    ("pv", "光伏"),
    ("storage", "储能"),
];

fn build_default_template() -> SurveyTemplate {
    let customer = SurveySection {
        key: "customer".to_string(),
        title: "客户基本信息".to_string(),
        fields: vec![
            with_placeholder(
                field("company_name", "企业名称", FieldType::Text, true),
                "请输入企业全称",
            ),
            with_options(
                field("industry", "所属行业", FieldType::Select, true),
                INDUSTRY_OPTIONS,
            ),
            field("address", "企业地址", FieldType::Text, false),
            field("contact_name", "联系人", FieldType::Text, true),
            field("contact_phone", "联系电话", FieldType::Phone, true),
            with_unit(field("employee_count", "员工人数", FieldType::Number, false), "人"),
        ],
    };

    let energy = SurveySection {
        key: "energy".to_string(),
        title: "用能概况".to_string(),
        fields: vec![
            with_options(
                field("energy_types", "主要能源类型", FieldType::MultiSelect, true),
                ENERGY_TYPE_OPTIONS,
            ),
            with_unit(
                field("annual_electricity", "年用电量", FieldType::Number, true),
                "万kWh",
            ),
            with_unit(field("annual_energy_cost", "年能源费用", FieldType::Number, false), "万元"),
            with_unit(field("peak_load", "最大负荷", FieldType::Number, false), "kW"),
            with_unit(
                field("transformer_capacity", "变压器总容量", FieldType::Number, false),
                "kVA",
            ),
            with_options(
                field("tariff_type", "电价类型", FieldType::Select, false),
                &[
                    ("single", "单一制"),
                    ("two_part", "两部制"),
                    ("time_of_use", "分时电价"),
                ],
            ),
        ],
    };

    let current = SurveySection {
        key: "current".to_string(),
        title: "现状与基础".to_string(),
        fields: vec![
            with_options(
                field("metering_coverage", "计量覆盖情况", FieldType::Select, true),
                &[
                    ("none", "基本无分项计量"),
                    ("partial", "部分重点设备已计量"),
                    ("full", "已实现分项全覆盖"),
                ],
            ),
            with_unit(field("meter_count", "现有智能表计数量", FieldType::Number, false), "块"),
            with_options(
                field("existing_systems", "已有信息化系统", FieldType::MultiSelect, false),
                &[
                    ("scada", "SCADA"),
                    ("bms", "楼宇自控 BMS"),
                    ("mes", "MES"),
                    ("erp", "ERP"),
                    ("power_monitoring", "电力监控系统"),
                ],
            ),
            with_options(
                field("network_condition", "现场网络条件", FieldType::Select, false),
                &[
                    ("wired", "有线网络"),
                    ("wireless", "无线/4G"),
                    ("none", "暂无网络"),
                ],
            ),
            with_options(
                field("certification", "能源管理体系认证", FieldType::Select, false),
                &[
                    ("none", "未认证"),
                    ("planning", "计划认证"),
                    ("certified", "已通过 ISO 50001"),
                ],
            ),
        ],
    };

    let demand = SurveySection {
        key: "demand".to_string(),
        title: "需求与目标".to_string(),
        fields: vec![
            with_options(
                field("goals", "建设目标", FieldType::MultiSelect, true),
                &[
                    ("cost_saving", "降低能源成本"),
                    ("carbon", "碳排放核算与管理"),
                    ("compliance", "满足政策监管要求"),
                    ("demand_response", "需求响应/负荷管理"),
                    ("visualization", "能耗可视化"),
                    ("pv_storage", "光储协同优化"),
                ],
            ),
            field("pain_points", "当前痛点", FieldType::Textarea, true),
            with_options(
                field("budget_range", "预算范围", FieldType::Select, false),
                &[
                    ("lt_50", "50 万以下"),
                    ("50_200", "50-200 万"),
                    ("200_500", "200-500 万"),
                    ("gt_500", "500 万以上"),
                ],
            ),
            field("expected_go_live", "期望上线时间", FieldType::Date, false),
            field("remarks", "其他说明", FieldType::Textarea, false),
        ],
    };

    SurveyTemplate {
        id: DEFAULT_TEMPLATE_ID.to_string(),
        name: "EMS 售前调研问卷".to_string(),
        version: "1".to_string(),
        description: "能源管理系统售前客户调研标准问卷".to_string(),
        sections: vec![customer, energy, current, demand],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_answers() -> Map<String, Value> {
        json!({
            "company_name": "某某制造有限公司",
            "industry": "manufacturing",
            "contact_name": "张工",
            "contact_phone": "138-0000-0000",
            "energy_types": ["electricity", "gas"],
            "annual_electricity": "1200",
            "metering_coverage": "partial",
            "goals": ["cost_saving", "carbon"],
            "pain_points": "能耗数据靠人工抄表"
        })
        .as_object()
        .cloned()
        .expect("answers should be an object")
    }

    #[test]
    fn default_template_is_registered() {
        let template = get_template(DEFAULT_TEMPLATE_ID).expect("template should exist");
        assert_eq!(template.sections.len(), 4);
        assert!(template.field("annual_electricity").is_some());
        assert!(get_template("unknown").is_none());
    }

    #[test]
    fn field_keys_are_unique() {
        let template = get_template(DEFAULT_TEMPLATE_ID).expect("template should exist");
        let mut keys: Vec<&str> = template.fields().map(|f| f.key.as_str()).collect();
        let total = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn complete_answers_pass_validation() {
        let template = get_template(DEFAULT_TEMPLATE_ID).expect("template should exist");
        assert!(validate_answers(template, &complete_answers()).is_empty());
    }

    #[test]
    fn missing_and_blank_required_fields_are_reported() {
        let template = get_template(DEFAULT_TEMPLATE_ID).expect("template should exist");
        let mut answers = complete_answers();
        answers.remove("company_name");
        answers.insert("pain_points".into(), json!("   "));
        answers.insert("goals".into(), json!([]));

        let errors = validate_answers(template, &answers);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["company_name", "goals", "pain_points"]);
    }

    #[test]
    fn typed_fields_reject_bad_values() {
        let template = get_template(DEFAULT_TEMPLATE_ID).expect("template should exist");
        let mut answers = complete_answers();
        answers.insert("annual_electricity".into(), json!("a lot"));
        answers.insert("industry".into(), json!("bakery"));
        answers.insert("energy_types".into(), json!(["electricity", "nuclear"]));
        answers.insert("contact_phone".into(), json!("call me"));
        answers.insert("expected_go_live".into(), json!("next spring"));

        let errors = validate_answers(template, &answers);
        let mut fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        fields.sort_unstable();
        assert_eq!(
            fields,
            vec![
                "annual_electricity",
                "contact_phone",
                "energy_types",
                "expected_go_live",
                "industry"
            ]
        );
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let template = get_template(DEFAULT_TEMPLATE_ID).expect("template should exist");
        for bad in ["NaN", "inf", "-infinity"] {
            let mut answers = complete_answers();
            answers.insert("annual_electricity".into(), json!(bad));
            let errors = validate_answers(template, &answers);
            assert_eq!(errors.len(), 1, "{bad} should be rejected");
            assert_eq!(errors[0].field, "annual_electricity");
        }

        let mut answers = complete_answers();
        answers.insert("annual_electricity".into(), json!(" 1.5e3 "));
        assert!(validate_answers(template, &answers).is_empty());
    }

    #[test]
    fn phone_needs_enough_digits() {
        assert!(is_phone("13800138000"));
        assert!(is_phone("+86-21-5555-0000"));
        assert!(!is_phone("-------"));
        assert!(!is_phone("+86-123"));
        assert!(!is_phone("123456"));
    }

    #[test]
    fn unknown_keys_and_optional_blanks_are_ignored() {
        let template = get_template(DEFAULT_TEMPLATE_ID).expect("template should exist");
        let mut answers = complete_answers();
        answers.insert("legacy_field".into(), json!(42));
        answers.insert("budget_range".into(), Value::Null);
        answers.insert("peak_load".into(), json!(850.5));
        assert!(validate_answers(template, &answers).is_empty());
    }
}
