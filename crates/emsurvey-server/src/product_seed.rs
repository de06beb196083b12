use emsurvey_common::types::CreateProductRequest;
use emsurvey_storage::SurveyStore;

/// 默认产品能力：(name, category, description, features, industries)
const DEFAULT_PRODUCTS: &[(&str, &str, &str, &[&str], &[&str])] = &[
    (
        "能耗在线监测",
        "monitoring",
        "水电气热等能源介质的分项计量与实时采集",
        &["多能源介质采集", "分项计量", "实时曲线", "异常用能告警"],
        &[],
    ),
    (
        "能效分析与对标",
        "analysis",
        "单位产品能耗、设备能效分析及行业对标",
        &["单耗分析", "能效排名", "行业对标", "节能潜力评估"],
        &["manufacturing", "chemical", "steel"],
    ),
    (
        "碳排放核算",
        "carbon",
        "依据核算指南自动计算企业碳排放并生成台账",
        &["排放因子管理", "碳排放台账", "碳盘查报告"],
        &["manufacturing", "chemical", "steel", "park"],
    ),
    (
        "需量管理与负荷优化",
        "optimization",
        "最大需量预警、负荷预测与削峰填谷策略",
        &["需量预警", "负荷预测", "需求响应"],
        &["manufacturing", "steel", "data_center"],
    ),
    (
        "楼宇能源管理",
        "building",
        "空调照明等楼宇设备的能耗监测与策略控制",
        &["空调能耗分析", "照明策略", "租户分户计量"],
        &["building", "hospital", "school"],
    ),
    (
        "光储协同优化",
        "renewable",
        "光伏与储能的发电监测、充放电策略优化",
        &["光伏发电监测", "储能调度", "自发自用率分析"],
        &["park", "manufacturing", "data_center"],
    ),
    (
        "园区综合能源管理",
        "park",
        "园区多主体用能管理、结算与综合能源服务",
        &["企业分户结算", "园区能源驾驶舱", "综合能源调度"],
        &["park"],
    ),
];

fn to_request(
    (name, category, description, features, industries): &(&str, &str, &str, &[&str], &[&str]),
    sort_order: i32,
) -> CreateProductRequest {
    CreateProductRequest {
        name: name.to_string(),
        category: category.to_string(),
        description: Some(description.to_string()),
        features: Some(features.iter().map(|f| f.to_string()).collect()),
        industries: Some(industries.iter().map(|i| i.to_string()).collect()),
        enabled: Some(true),
        sort_order: Some(sort_order),
    }
}

pub fn default_products() -> Vec<CreateProductRequest> {
    DEFAULT_PRODUCTS
        .iter()
        .enumerate()
        .map(|(i, p)| to_request(p, (i + 1) as i32))
        .collect()
}

/// Seed the default catalogue, only when the table is empty.
pub async fn init_default_products(store: &SurveyStore) -> anyhow::Result<usize> {
    let existing = store
        .count_products(&emsurvey_common::types::ProductFilter::default())
        .await?;
    if existing > 0 {
        return Ok(0);
    }
    let inserted = store.batch_insert_products(&default_products()).await?;
    tracing::info!(inserted, "Default product capabilities initialized");
    Ok(inserted)
}

/// Initialize product capabilities from a JSON seed file. Existing names
/// are skipped.
pub async fn init_from_seed_file(store: &SurveyStore, seed_path: &str) -> anyhow::Result<usize> {
    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: crate::config::ProductsSeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    let items: Vec<CreateProductRequest> = seed
        .products
        .into_iter()
        .map(|p| CreateProductRequest {
            name: p.name,
            category: p.category,
            description: p.description,
            features: Some(p.features),
            industries: Some(p.industries),
            enabled: Some(p.enabled),
            sort_order: p.sort_order,
        })
        .collect();
    let inserted = store.batch_insert_products(&items).await?;
    tracing::info!(
        total = items.len(),
        inserted,
        skipped = items.len() - inserted,
        "init-products completed"
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalogue_has_generic_product() {
        let products = default_products();
        assert_eq!(products.len(), DEFAULT_PRODUCTS.len());
        let monitoring = products
            .iter()
            .find(|p| p.name == "能耗在线监测")
            .expect("generic product should exist");
        assert_eq!(monitoring.industries.as_deref(), Some(&[][..]));
        assert_eq!(products[0].sort_order, Some(1));
    }
}
