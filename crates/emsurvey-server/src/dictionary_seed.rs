use chrono::{DateTime, Utc};
use emsurvey_common::types::{DictionaryItem, DictionaryType};
use emsurvey_storage::SurveyStore;

/// 内置字典类型：(dict_type, label, description)
const DEFAULT_TYPES: &[(&str, &str, &str)] = &[
    ("survey_status", "调研单状态", "调研单生命周期状态"),
    ("industry", "所属行业", "客户所属行业分类"),
    ("customer_type", "客户类型", "客户规模与性质"),
    ("energy_type", "能源类型", "客户使用的能源介质"),
    ("budget_range", "预算范围", "项目预算区间"),
    ("message_type", "消息类型", "站内消息分类"),
    ("log_module", "日志模块", "系统操作日志所属模块"),
];

/// 内置字典条目：(key, label, value)
type SeedEntry = (&'static str, &'static str, Option<&'static str>);

fn entries_for(dict_type: &str) -> &'static [SeedEntry] {
    match dict_type {
        "survey_status" => &[
            ("draft", "草稿", Some("1")),
            ("filling", "填写中", Some("2")),
            ("completed", "已完成", Some("3")),
        ],
        "industry" => &[
            ("manufacturing", "制造业", None),
            ("chemical", "化工", None),
            ("steel", "钢铁冶金", None),
            ("building", "商业楼宇", None),
            ("park", "工业园区", None),
            ("hospital", "医院", None),
            ("school", "学校", None),
            ("data_center", "数据中心", None),
            ("other", "其他", None),
        ],
        "customer_type" => &[
            ("soe", "国有企业", None),
            ("private", "民营企业", None),
            ("foreign", "外资企业", None),
            ("government", "政府及事业单位", None),
        ],
        "energy_type" => &[
            ("electricity", "电", Some("kWh")),
            ("water", "水", Some("t")),
            ("gas", "天然气", Some("m³")),
            ("steam", "蒸汽", Some("t")),
            ("heat", "热力", Some("GJ")),
            ("compressed_air", "压缩空气", Some("m³")),
            ("pv", "光伏", Some("kWh")),
            ("storage", "储能", Some("kWh")),
        ],
        "budget_range" => &[
            ("lt_50", "50 万以下", None),
            ("50_200", "50-200 万", None),
            ("200_500", "200-500 万", None),
            ("gt_500", "500 万以上", None),
        ],
        "message_type" => &[
            ("system", "系统消息", None),
            ("report", "报告通知", None),
            ("notice", "公告", None),
        ],
        "log_module" => &[
            ("auth", "登录认证", None),
            ("user", "用户管理", None),
            ("role", "角色管理", None),
            ("survey", "调研单", None),
            ("product", "产品能力", None),
            ("dictionary", "字典管理", None),
            ("region", "行政区划", None),
            ("message", "站内消息", None),
        ],
        _ => &[],
    }
}

fn make_system_item(
    dict_type: &str,
    (key, label, value): SeedEntry,
    sort_order: i32,
    now: &DateTime<Utc>,
) -> DictionaryItem {
    DictionaryItem {
        id: emsurvey_common::id::next_id(),
        dict_type: dict_type.to_string(),
        dict_key: key.to_string(),
        dict_label: label.to_string(),
        dict_value: value.map(str::to_string),
        sort_order,
        enabled: true,
        is_system: true,
        description: None,
        created_at: *now,
        updated_at: *now,
    }
}

/// Build the default dictionary items (all marked as `is_system = true`).
pub fn default_seed_items() -> Vec<DictionaryItem> {
    let now = Utc::now();
    DEFAULT_TYPES
        .iter()
        .flat_map(|(dict_type, _, _)| {
            entries_for(dict_type)
                .iter()
                .enumerate()
                .map(move |(i, entry)| make_system_item(dict_type, *entry, (i + 1) as i32, &now))
        })
        .collect()
}

pub fn default_type_seed_items() -> Vec<DictionaryType> {
    let now = Utc::now();
    DEFAULT_TYPES
        .iter()
        .enumerate()
        .map(|(i, (dict_type, label, desc))| DictionaryType {
            dict_type: dict_type.to_string(),
            dict_type_label: label.to_string(),
            sort_order: (i + 1) as i32,
            description: Some(desc.to_string()),
            created_at: now,
            updated_at: now,
        })
        .collect()
}

/// Insert missing built-in dictionary types and items on startup.
///
/// Existing rows are never modified, so edits made through the API survive
/// restarts.
pub async fn init_default_dictionaries(store: &SurveyStore) -> anyhow::Result<usize> {
    let types_inserted = store
        .batch_insert_dict_types(&default_type_seed_items())
        .await?;
    let items_inserted = store
        .batch_insert_dictionaries(&default_seed_items())
        .await?;
    if types_inserted > 0 || items_inserted > 0 {
        tracing::info!(types_inserted, items_inserted, "Default dictionaries initialized");
    }
    Ok(items_inserted)
}

/// Initialize dictionaries from a JSON seed file. Existing type/key pairs
/// are skipped.
pub async fn init_from_seed_file(store: &SurveyStore, seed_path: &str) -> anyhow::Result<usize> {
    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: crate::config::DictionariesSeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    let now = Utc::now();

    if let Some(seed_types) = seed.dictionary_types {
        let type_items: Vec<DictionaryType> = seed_types
            .into_iter()
            .map(|s| DictionaryType {
                dict_type: s.dict_type,
                dict_type_label: s.dict_type_label,
                sort_order: s.sort_order.unwrap_or(0),
                description: s.description,
                created_at: now,
                updated_at: now,
            })
            .collect();
        let types_inserted = store.batch_insert_dict_types(&type_items).await?;
        tracing::info!(
            total = type_items.len(),
            types_inserted,
            "init-dictionaries: dictionary types processed"
        );
    }

    let items: Vec<DictionaryItem> = seed
        .dictionaries
        .into_iter()
        .map(|s| DictionaryItem {
            id: emsurvey_common::id::next_id(),
            dict_type: s.dict_type,
            dict_key: s.dict_key,
            dict_label: s.dict_label,
            dict_value: s.dict_value,
            sort_order: s.sort_order.unwrap_or(0),
            enabled: s.enabled.unwrap_or(true),
            is_system: s.is_system.unwrap_or(false),
            description: s.description,
            created_at: now,
            updated_at: now,
        })
        .collect();

    let inserted = store.batch_insert_dictionaries(&items).await?;
    tracing::info!(
        total = items.len(),
        inserted,
        skipped = items.len() - inserted,
        "init-dictionaries completed"
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_type_has_items_with_unique_keys() {
        let items = default_seed_items();
        for t in default_type_seed_items() {
            let keys: Vec<&str> = items
                .iter()
                .filter(|i| i.dict_type == t.dict_type)
                .map(|i| i.dict_key.as_str())
                .collect();
            assert!(!keys.is_empty(), "{} has no items", t.dict_type);
            let unique: HashSet<&str> = keys.iter().copied().collect();
            assert_eq!(unique.len(), keys.len(), "{} has duplicate keys", t.dict_type);
        }
        assert!(items.iter().all(|i| i.is_system && i.enabled));
    }

    #[test]
    fn survey_status_keys_match_status_enum() {
        use emsurvey_common::types::SurveyStatus;
        for item in default_seed_items()
            .iter()
            .filter(|i| i.dict_type == "survey_status")
        {
            assert!(item.dict_key.parse::<SurveyStatus>().is_ok());
        }
    }
}
