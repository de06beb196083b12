use crate::generator::ReportInput;
use emsurvey_common::template::{FieldType, SurveyField};
use serde_json::Value;

/// 系统角色设定
pub const SYSTEM_PROMPT: &str =
    "你是一位资深的能源管理系统（EMS）售前顾问，擅长根据客户调研信息评估项目成熟度并给出方案建议。";

const REPORT_PROMPT: &str = r#"请根据以下客户调研信息，评估该客户建设能源管理系统的成熟度，并推荐合适的产品能力。

## 调研单
- 标题：{{TITLE}}
- 客户：{{CUSTOMER}}
- 行业：{{INDUSTRY}}
- 区域：{{REGION}}

{{ANSWERS}}

## 可选产品能力
{{PRODUCTS}}

## 输出要求
仅输出一个 JSON 对象，不要输出其他内容，字段如下：
{
  "overall_score": 0-100 的整数，综合成熟度得分,
  "level": "high" | "medium" | "low",
  "summary": "一段总体评价",
  "highlights": ["客户优势"],
  "risks": ["项目风险"],
  "recommended_products": ["从可选产品能力中挑选的名称"],
  "suggestions": ["下一步建议"]
}"#;

/// 构建报告生成 prompt
pub fn build_report_prompt(input: &ReportInput<'_>) -> String {
    let survey = input.survey;
    REPORT_PROMPT
        .replace("{{TITLE}}", &survey.title)
        .replace("{{CUSTOMER}}", &survey.customer_name)
        .replace("{{INDUSTRY}}", survey.industry.as_deref().unwrap_or("未填写"))
        .replace("{{REGION}}", survey.region_code.as_deref().unwrap_or("未填写"))
        .replace("{{ANSWERS}}", &format_answers(input))
        .replace("{{PRODUCTS}}", &format_products(input))
}

/// 按模板章节输出答案，字段使用中文标签，选项值换成选项名称
fn format_answers(input: &ReportInput<'_>) -> String {
    let mut output = String::new();
    for section in &input.template.sections {
        output.push_str(&format!("### {}\n", section.title));
        for field in &section.fields {
            let value = input
                .survey
                .answers
                .get(&field.key)
                .map(|v| display_value(field, v))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "未填写".to_string());
            match field.unit {
                Some(ref unit) if value != "未填写" => {
                    output.push_str(&format!("- {}：{} {}\n", field.label, value, unit))
                }
                _ => output.push_str(&format!("- {}：{}\n", field.label, value)),
            }
        }
        output.push('\n');
    }
    output
}

fn option_label(field: &SurveyField, value: &str) -> String {
    field
        .options
        .iter()
        .find(|o| o.value == value)
        .map(|o| o.label.clone())
        .unwrap_or_else(|| value.to_string())
}

fn display_value(field: &SurveyField, v: &Value) -> String {
    match (field.field_type, v) {
        (FieldType::Select, Value::String(s)) => option_label(field, s),
        (FieldType::MultiSelect, Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| option_label(field, s))
            .collect::<Vec<_>>()
            .join("、"),
        (_, Value::String(s)) => s.trim().to_string(),
        (_, Value::Null) => String::new(),
        (_, other) => other.to_string(),
    }
}

fn format_products(input: &ReportInput<'_>) -> String {
    if input.products.is_empty() {
        return "（暂无）\n".to_string();
    }
    let mut output = String::new();
    for p in input.products {
        output.push_str(&format!("- {}（{}）", p.name, p.category));
        if let Some(ref desc) = p.description {
            output.push_str(&format!("：{desc}"));
        }
        if !p.industries.is_empty() {
            output.push_str(&format!("；适用行业：{}", p.industries.join("、")));
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use emsurvey_common::template::{get_template, DEFAULT_TEMPLATE_ID};
    use emsurvey_common::types::{ProductCapability, Survey, SurveyStatus};
    use serde_json::json;

    fn sample_survey() -> Survey {
        let now = Utc::now();
        Survey {
            id: "1".into(),
            title: "园区能源管理调研".into(),
            customer_name: "某产业园".into(),
            industry: Some("manufacturing".into()),
            region_code: None,
            template_id: DEFAULT_TEMPLATE_ID.into(),
            status: SurveyStatus::Completed,
            answers: json!({
                "company_name": "某产业园",
                "metering_coverage": "partial",
                "energy_types": ["electricity", "gas"],
                "annual_electricity": 1200
            }),
            report: None,
            creator_id: "u1".into(),
            presales_id: None,
            submitted_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn prompt_renders_labels_and_option_names() {
        let survey = sample_survey();
        let template = get_template(DEFAULT_TEMPLATE_ID).expect("default template");
        let now = Utc::now();
        let products = vec![ProductCapability {
            id: "p1".into(),
            name: "能耗监测".into(),
            category: "monitoring".into(),
            description: Some("分项计量与实时监测".into()),
            features: vec![],
            industries: vec!["manufacturing".into()],
            enabled: true,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }];
        let input = ReportInput {
            survey: &survey,
            template,
            products: &products,
        };
        let prompt = build_report_prompt(&input);
        assert!(prompt.contains("客户：某产业园"));
        assert!(prompt.contains("计量覆盖情况：部分重点设备已计量"));
        assert!(prompt.contains("年用电量：1200 万kWh"));
        assert!(prompt.contains("联系人：未填写"));
        assert!(prompt.contains("- 能耗监测（monitoring）"));
        assert!(!prompt.contains("{{"));
    }
}
