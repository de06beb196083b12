use anyhow::Result;
use chrono::Utc;
use emsurvey_common::types::{
    CreateDictionaryRequest, CreateDictionaryTypeRequest, DictionaryItem, DictionaryType,
    DictionaryTypeSummary, UpdateDictionaryRequest, UpdateDictionaryTypeRequest,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use std::collections::HashMap;

use crate::entities::dictionary_item::{self, Column as DictCol, Entity as DictEntity};
use crate::entities::dictionary_type::{self, Column as DtCol, Entity as DtEntity};
use crate::error::StorageError;
use crate::store::SurveyStore;

/// 字典类型过滤条件
#[derive(Debug, Clone, Default)]
pub struct DictTypeFilter {
    pub dict_type_contains: Option<String>,
}

fn model_to_dict_item(m: dictionary_item::Model) -> DictionaryItem {
    DictionaryItem {
        id: m.id,
        dict_type: m.dict_type,
        dict_key: m.dict_key,
        dict_label: m.dict_label,
        dict_value: m.dict_value,
        sort_order: m.sort_order,
        enabled: m.enabled,
        is_system: m.is_system,
        description: m.description,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn model_to_dict_type(m: dictionary_type::Model) -> DictionaryType {
    DictionaryType {
        dict_type: m.dict_type,
        dict_type_label: m.dict_type_label,
        sort_order: m.sort_order,
        description: m.description,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl SurveyStore {
    // ---- dictionary_items CRUD ----

    pub async fn insert_dictionary(&self, req: &CreateDictionaryRequest) -> Result<DictionaryItem> {
        if self
            .get_dictionary_by_type_key(&req.dict_type, &req.dict_key)
            .await?
            .is_some()
        {
            return Err(StorageError::Duplicate {
                entity: "dictionary_item",
                field: "dict_key",
                value: format!("{}/{}", req.dict_type, req.dict_key),
            }
            .into());
        }
        let id = emsurvey_common::id::next_id();
        let now = Utc::now().fixed_offset();
        let am = dictionary_item::ActiveModel {
            id: Set(id.clone()),
            dict_type: Set(req.dict_type.clone()),
            dict_key: Set(req.dict_key.clone()),
            dict_label: Set(req.dict_label.clone()),
            dict_value: Set(req.dict_value.clone()),
            sort_order: Set(req.sort_order.unwrap_or(0)),
            enabled: Set(req.enabled.unwrap_or(true)),
            is_system: Set(false),
            description: Set(req.description.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(self.db()).await?;
        Ok(model_to_dict_item(m))
    }

    /// Insert items, skipping any whose `(dict_type, dict_key)` already
    /// exists. Returns the number of inserted rows.
    pub async fn batch_insert_dictionaries(&self, items: &[DictionaryItem]) -> Result<usize> {
        let mut count = 0usize;
        for item in items {
            if self
                .get_dictionary_by_type_key(&item.dict_type, &item.dict_key)
                .await?
                .is_some()
            {
                continue;
            }
            let am = dictionary_item::ActiveModel {
                id: Set(item.id.clone()),
                dict_type: Set(item.dict_type.clone()),
                dict_key: Set(item.dict_key.clone()),
                dict_label: Set(item.dict_label.clone()),
                dict_value: Set(item.dict_value.clone()),
                sort_order: Set(item.sort_order),
                enabled: Set(item.enabled),
                is_system: Set(item.is_system),
                description: Set(item.description.clone()),
                created_at: Set(item.created_at.fixed_offset()),
                updated_at: Set(item.updated_at.fixed_offset()),
            };
            am.insert(self.db()).await?;
            count += 1;
        }
        Ok(count)
    }

    pub async fn get_dictionary_by_id(&self, id: &str) -> Result<Option<DictionaryItem>> {
        let model = DictEntity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(model_to_dict_item))
    }

    pub async fn get_dictionary_by_type_key(
        &self,
        dict_type: &str,
        dict_key: &str,
    ) -> Result<Option<DictionaryItem>> {
        let model = DictEntity::find()
            .filter(DictCol::DictType.eq(dict_type))
            .filter(DictCol::DictKey.eq(dict_key))
            .one(self.db())
            .await?;
        Ok(model.map(model_to_dict_item))
    }

    pub async fn list_dictionaries_by_type(
        &self,
        dict_type: &str,
        enabled_only: bool,
    ) -> Result<Vec<DictionaryItem>> {
        let mut q = DictEntity::find().filter(DictCol::DictType.eq(dict_type));
        if enabled_only {
            q = q.filter(DictCol::Enabled.eq(true));
        }
        let rows = q
            .order_by(DictCol::SortOrder, Order::Asc)
            .order_by(DictCol::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(model_to_dict_item).collect())
    }

    pub async fn update_dictionary(
        &self,
        id: &str,
        update: &UpdateDictionaryRequest,
    ) -> Result<Option<DictionaryItem>> {
        let Some(m) = DictEntity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };
        let mut am: dictionary_item::ActiveModel = m.into();
        if let Some(ref label) = update.dict_label {
            am.dict_label = Set(label.clone());
        }
        if let Some(ref val) = update.dict_value {
            am.dict_value = Set(val.clone());
        }
        if let Some(order) = update.sort_order {
            am.sort_order = Set(order);
        }
        if let Some(en) = update.enabled {
            am.enabled = Set(en);
        }
        if let Some(ref desc) = update.description {
            am.description = Set(desc.clone());
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(model_to_dict_item(updated)))
    }

    /// Delete a non-system item. System items are never removed.
    pub async fn delete_dictionary(&self, id: &str) -> Result<bool> {
        let res = DictEntity::delete_many()
            .filter(DictCol::Id.eq(id))
            .filter(DictCol::IsSystem.eq(false))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn count_dictionaries(&self) -> Result<u64> {
        Ok(DictEntity::find().count(self.db()).await?)
    }

    // ---- dictionary_types ----

    pub async fn get_dict_type(&self, dict_type: &str) -> Result<Option<DictionaryType>> {
        let model = DtEntity::find_by_id(dict_type).one(self.db()).await?;
        Ok(model.map(model_to_dict_type))
    }

    /// Summaries of every known type: those registered in
    /// `dictionary_types` plus any type that only exists through its items.
    pub async fn list_all_dict_types(
        &self,
        filter: &DictTypeFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DictionaryTypeSummary>> {
        let mut all = self.collect_dict_type_summaries(filter).await?;
        let end = (offset + limit).min(all.len());
        if offset >= all.len() {
            return Ok(Vec::new());
        }
        Ok(all.drain(offset..end).collect())
    }

    pub async fn count_all_dict_types(&self, filter: &DictTypeFilter) -> Result<u64> {
        Ok(self.collect_dict_type_summaries(filter).await?.len() as u64)
    }

    async fn collect_dict_type_summaries(
        &self,
        filter: &DictTypeFilter,
    ) -> Result<Vec<DictionaryTypeSummary>> {
        let counts: Vec<(String, i64)> = DictEntity::find()
            .select_only()
            .column(DictCol::DictType)
            .column_as(Expr::col((DictEntity, DictCol::Id)).count(), "cnt")
            .group_by(DictCol::DictType)
            .into_tuple()
            .all(self.db())
            .await?;
        let counts: HashMap<String, i64> = counts.into_iter().collect();

        let types = DtEntity::find()
            .order_by(DtCol::SortOrder, Order::Asc)
            .order_by(DtCol::DictType, Order::Asc)
            .all(self.db())
            .await?;

        let mut summaries: Vec<DictionaryTypeSummary> = types
            .iter()
            .map(|t| DictionaryTypeSummary {
                dict_type: t.dict_type.clone(),
                dict_type_label: t.dict_type_label.clone(),
                count: counts.get(&t.dict_type).copied().unwrap_or(0) as u64,
            })
            .collect();

        let mut orphans: Vec<&String> = counts
            .keys()
            .filter(|k| !types.iter().any(|t| &t.dict_type == *k))
            .collect();
        orphans.sort();
        summaries.extend(orphans.into_iter().map(|k| DictionaryTypeSummary {
            dict_type: k.clone(),
            dict_type_label: k.clone(),
            count: counts.get(k).copied().unwrap_or(0) as u64,
        }));

        if let Some(ref needle) = filter.dict_type_contains {
            summaries.retain(|s| s.dict_type.contains(needle.as_str()));
        }
        Ok(summaries)
    }

    pub async fn insert_dict_type(&self, req: &CreateDictionaryTypeRequest) -> Result<DictionaryType> {
        if self.get_dict_type(&req.dict_type).await?.is_some() {
            return Err(StorageError::Duplicate {
                entity: "dictionary_type",
                field: "dict_type",
                value: req.dict_type.clone(),
            }
            .into());
        }
        let now = Utc::now().fixed_offset();
        let am = dictionary_type::ActiveModel {
            dict_type: Set(req.dict_type.clone()),
            dict_type_label: Set(req.dict_type_label.clone()),
            sort_order: Set(req.sort_order.unwrap_or(0)),
            description: Set(req.description.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(self.db()).await?;
        Ok(model_to_dict_type(m))
    }

    /// Insert types that do not exist yet; returns the number inserted.
    pub async fn batch_insert_dict_types(&self, types: &[DictionaryType]) -> Result<usize> {
        let mut count = 0usize;
        for t in types {
            if self.get_dict_type(&t.dict_type).await?.is_some() {
                continue;
            }
            let am = dictionary_type::ActiveModel {
                dict_type: Set(t.dict_type.clone()),
                dict_type_label: Set(t.dict_type_label.clone()),
                sort_order: Set(t.sort_order),
                description: Set(t.description.clone()),
                created_at: Set(t.created_at.fixed_offset()),
                updated_at: Set(t.updated_at.fixed_offset()),
            };
            am.insert(self.db()).await?;
            count += 1;
        }
        Ok(count)
    }

    pub async fn update_dict_type(
        &self,
        dict_type: &str,
        update: &UpdateDictionaryTypeRequest,
    ) -> Result<Option<DictionaryType>> {
        let Some(m) = DtEntity::find_by_id(dict_type).one(self.db()).await? else {
            return Ok(None);
        };
        let mut am: dictionary_type::ActiveModel = m.into();
        if let Some(ref label) = update.dict_type_label {
            am.dict_type_label = Set(label.clone());
        }
        if let Some(order) = update.sort_order {
            am.sort_order = Set(order);
        }
        if let Some(ref desc) = update.description {
            am.description = Set(desc.clone());
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(model_to_dict_type(updated)))
    }

    /// Delete a type together with its custom items.
    ///
    /// Fails with [`StorageError::Rejected`] while system items of that type
    /// remain. Returns `false` when the type is unknown.
    pub async fn delete_dict_type(&self, dict_type: &str) -> Result<bool> {
        if self.get_dict_type(dict_type).await?.is_none() {
            return Ok(false);
        }
        let system_items = DictEntity::find()
            .filter(DictCol::DictType.eq(dict_type))
            .filter(DictCol::IsSystem.eq(true))
            .count(self.db())
            .await?;
        if system_items > 0 {
            return Err(StorageError::Rejected(format!(
                "dictionary type '{dict_type}' still has {system_items} system items"
            ))
            .into());
        }
        DictEntity::delete_many()
            .filter(DictCol::DictType.eq(dict_type))
            .exec(self.db())
            .await?;
        let res = DtEntity::delete_by_id(dict_type).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}
