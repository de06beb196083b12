use anyhow::Result;
use chrono::Utc;
use emsurvey_common::types::{
    CreateProductRequest, ProductCapability, ProductFilter, UpdateProductRequest,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};

use crate::entities::product_capability::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::SurveyStore;

fn to_product(m: product_capability::Model) -> ProductCapability {
    ProductCapability {
        features: serde_json::from_str(&m.features_json).unwrap_or_default(),
        industries: serde_json::from_str(&m.industries_json).unwrap_or_default(),
        id: m.id,
        name: m.name,
        category: m.category,
        description: m.description,
        enabled: m.enabled,
        sort_order: m.sort_order,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn apply_filter(mut q: Select<Entity>, filter: &ProductFilter) -> Select<Entity> {
    if let Some(ref category) = filter.category_eq {
        q = q.filter(Column::Category.eq(category.as_str()));
    }
    if let Some(enabled) = filter.enabled_eq {
        q = q.filter(Column::Enabled.eq(enabled));
    }
    if let Some(ref name) = filter.name_contains {
        q = q.filter(Column::Name.contains(name.as_str()));
    }
    q
}

impl SurveyStore {
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ProductCapability>> {
        let rows = apply_filter(Entity::find(), filter)
            .order_by(Column::SortOrder, Order::Asc)
            .order_by(Column::CreatedAt, Order::Asc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_product).collect())
    }

    pub async fn count_products(&self, filter: &ProductFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter).count(self.db()).await?)
    }

    /// Every enabled capability, in display order. Used for report prompts.
    pub async fn list_enabled_products(&self) -> Result<Vec<ProductCapability>> {
        let rows = Entity::find()
            .filter(Column::Enabled.eq(true))
            .order_by(Column::SortOrder, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_product).collect())
    }

    pub async fn get_product(&self, id: &str) -> Result<Option<ProductCapability>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_product))
    }

    pub async fn get_product_by_name(&self, name: &str) -> Result<Option<ProductCapability>> {
        let model = Entity::find()
            .filter(Column::Name.eq(name))
            .one(self.db())
            .await?;
        Ok(model.map(to_product))
    }

    pub async fn create_product(&self, req: &CreateProductRequest) -> Result<ProductCapability> {
        if self.get_product_by_name(&req.name).await?.is_some() {
            return Err(StorageError::Duplicate {
                entity: "product_capability",
                field: "name",
                value: req.name.clone(),
            }
            .into());
        }
        let now = Utc::now().fixed_offset();
        let am = product_capability::ActiveModel {
            id: Set(emsurvey_common::id::next_id()),
            name: Set(req.name.clone()),
            category: Set(req.category.clone()),
            description: Set(req.description.clone()),
            features_json: Set(serde_json::to_string(&req.features.clone().unwrap_or_default())?),
            industries_json: Set(serde_json::to_string(
                &req.industries.clone().unwrap_or_default(),
            )?),
            enabled: Set(req.enabled.unwrap_or(true)),
            sort_order: Set(req.sort_order.unwrap_or(0)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(self.db()).await?;
        Ok(to_product(m))
    }

    pub async fn update_product(
        &self,
        id: &str,
        update: &UpdateProductRequest,
    ) -> Result<Option<ProductCapability>> {
        let Some(m) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };
        if let Some(ref name) = update.name {
            if name != &m.name && self.get_product_by_name(name).await?.is_some() {
                return Err(StorageError::Duplicate {
                    entity: "product_capability",
                    field: "name",
                    value: name.clone(),
                }
                .into());
            }
        }
        let mut am: product_capability::ActiveModel = m.into();
        if let Some(ref v) = update.name {
            am.name = Set(v.clone());
        }
        if let Some(ref v) = update.category {
            am.category = Set(v.clone());
        }
        if let Some(ref v) = update.description {
            am.description = Set(v.clone());
        }
        if let Some(ref v) = update.features {
            am.features_json = Set(serde_json::to_string(v)?);
        }
        if let Some(ref v) = update.industries {
            am.industries_json = Set(serde_json::to_string(v)?);
        }
        if let Some(v) = update.enabled {
            am.enabled = Set(v);
        }
        if let Some(v) = update.sort_order {
            am.sort_order = Set(v);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(to_product(updated)))
    }

    pub async fn delete_product(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    /// Insert products whose name is not taken yet; returns the number inserted.
    pub async fn batch_insert_products(&self, items: &[CreateProductRequest]) -> Result<usize> {
        let mut inserted = 0usize;
        for item in items {
            if self.get_product_by_name(&item.name).await?.is_some() {
                continue;
            }
            self.create_product(item).await?;
            inserted += 1;
        }
        Ok(inserted)
    }
}
