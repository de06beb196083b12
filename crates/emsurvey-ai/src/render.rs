use emsurvey_common::types::{AssessmentReport, ReadinessLevel, ReportSource, Survey};

/// 评估报告渲染器（Markdown / HTML）
pub struct ReportRenderer;

impl ReportRenderer {
    /// 将 Markdown 转换为 HTML。
    ///
    /// 报告文本来自调研内容和模型输出，其中的原始 HTML 一律按纯文本输出。
    pub fn markdown_to_html(markdown: &str) -> String {
        use pulldown_cmark::{html, Event, Options, Parser};

        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let parser = Parser::new_ext(markdown, options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });
        let mut html_output = String::new();
        html::push_html(&mut html_output, parser);

        html_output
    }

    pub fn level_label(level: ReadinessLevel) -> &'static str {
        match level {
            ReadinessLevel::High => "成熟度高",
            ReadinessLevel::Medium => "成熟度中",
            ReadinessLevel::Low => "成熟度低",
        }
    }

    /// 报告正文（Markdown）
    pub fn to_markdown(report: &AssessmentReport) -> String {
        let mut md = String::new();
        md.push_str("## 总体评价\n\n");
        md.push_str(&report.summary);
        md.push_str("\n\n");
        for (title, items) in [
            ("客户优势", &report.highlights),
            ("项目风险", &report.risks),
            ("推荐产品能力", &report.recommended_products),
            ("下一步建议", &report.suggestions),
        ] {
            if items.is_empty() {
                continue;
            }
            md.push_str(&format!("## {title}\n\n"));
            for item in items {
                md.push_str(&format!("- {item}\n"));
            }
            md.push('\n');
        }
        md
    }

    /// 渲染完整的 HTML 报告页面
    pub fn render_html(survey: &Survey, report: &AssessmentReport) -> String {
        let template = include_str!("templates/survey_report.html");
        let source = match report.source {
            ReportSource::Ai => match (&report.provider, &report.model) {
                (Some(p), Some(m)) => format!("AI（{p} / {m}）"),
                _ => "AI".to_string(),
            },
            ReportSource::Fallback => "系统预设".to_string(),
        };
        let content_html = Self::markdown_to_html(&Self::to_markdown(report));

        let title = escape_html(&format!("{} 评估报告", survey.title));
        let customer_name = escape_html(&survey.customer_name);
        let generated_at = report.generated_at.format("%Y-%m-%d %H:%M").to_string();
        let source = escape_html(&source);
        let overall_score = report.overall_score.to_string();

        fill_template(template, |key| match key {
            "title" => Some(title.as_str()),
            "customer_name" => Some(customer_name.as_str()),
            "generated_at" => Some(generated_at.as_str()),
            "source" => Some(source.as_str()),
            "level" => Some(report.level.as_str()),
            "level_label" => Some(Self::level_label(report.level)),
            "overall_score" => Some(overall_score.as_str()),
            "content_html" => Some(content_html.as_str()),
            _ => None,
        })
    }
}

/// Single pass over `{{key}}` placeholders; substituted values are never
/// scanned again. Unknown keys are kept as written.
fn fill_template<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match lookup(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use emsurvey_common::types::SurveyStatus;
    use serde_json::json;

    fn report() -> AssessmentReport {
        AssessmentReport {
            overall_score: 78,
            level: ReadinessLevel::High,
            summary: "计量基础**较好**".into(),
            highlights: vec!["已有电力监控".into()],
            risks: vec![],
            recommended_products: vec!["能耗监测".into()],
            suggestions: vec!["现场踏勘".into()],
            source: ReportSource::Ai,
            provider: Some("zhipu".into()),
            model: Some("glm-4-flash".into()),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn markdown_skips_empty_sections() {
        let md = ReportRenderer::to_markdown(&report());
        assert!(md.contains("## 客户优势"));
        assert!(!md.contains("## 项目风险"));
        assert!(md.contains("- 能耗监测"));
    }

    #[test]
    fn html_page_fills_placeholders() {
        let now = Utc::now();
        let survey = Survey {
            id: "1".into(),
            title: "<园区>".into(),
            customer_name: "A&B".into(),
            industry: None,
            region_code: None,
            template_id: "ems-presales-v1".into(),
            status: SurveyStatus::Completed,
            answers: json!({}),
            report: None,
            creator_id: "u".into(),
            presales_id: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        };
        let html = ReportRenderer::render_html(&survey, &report());
        assert!(html.contains("&lt;园区&gt; 评估报告"));
        assert!(html.contains("A&amp;B"));
        assert!(html.contains("level-high"));
        assert!(html.contains("<strong>较好</strong>"));
        assert!(html.contains("AI（zhipu / glm-4-flash）"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn user_text_cannot_inject_markup() {
        let now = Utc::now();
        let survey = Survey {
            id: "2".into(),
            title: "{{content_html}}".into(),
            customer_name: "<img src=x onerror=alert(1)>".into(),
            industry: None,
            region_code: None,
            template_id: "ems-presales-v1".into(),
            status: SurveyStatus::Completed,
            answers: json!({}),
            report: None,
            creator_id: "u".into(),
            presales_id: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        };
        let mut r = report();
        r.summary = format!("客户 {} 的评估", survey.customer_name);
        r.highlights = vec!["<script>alert(2)</script>".into()];
        r.risks = vec!["<div onclick=x>block</div>".into()];

        let html = ReportRenderer::render_html(&survey, &r);
        assert!(!html.contains("<img"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<div onclick"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
        // 标题中的占位符按原文输出，不会被正文替换
        assert!(html.contains("<title>{{content_html}} 评估报告</title>"));
        assert_eq!(html.matches("<h2>").count(), 5);
    }

    #[test]
    fn fill_template_keeps_unknown_and_unterminated_placeholders() {
        let out = fill_template("a {{x}} b {{y}} c {{z", |k| (k == "x").then_some("{{y}}"));
        assert_eq!(out, "a {{y}} b {{y}} c {{z");
    }
}
