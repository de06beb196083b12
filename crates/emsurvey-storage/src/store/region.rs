use anyhow::Result;
use chrono::Utc;
use emsurvey_common::region::MAX_REGION_LEVEL;
use emsurvey_common::types::{CreateRegionRequest, Region, RegionNode, UpdateRegionRequest};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use std::collections::HashMap;

use crate::entities::region::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::SurveyStore;

fn to_region(m: region::Model) -> Region {
    Region {
        code: m.code,
        name: m.name,
        parent_code: m.parent_code,
        level: m.level,
        sort_order: m.sort_order,
        is_system: m.is_system,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

/// Assemble a forest from a flat, already ordered region list.
///
/// Entries whose parent is missing from `regions` become roots so that a
/// partial listing still renders.
pub fn build_region_tree(regions: &[Region]) -> Vec<RegionNode> {
    let mut children: HashMap<&str, Vec<&Region>> = HashMap::new();
    let known: std::collections::HashSet<&str> = regions.iter().map(|r| r.code.as_str()).collect();
    let mut roots = Vec::new();
    for r in regions {
        match r.parent_code.as_deref() {
            Some(p) if known.contains(p) => children.entry(p).or_default().push(r),
            _ => roots.push(r),
        }
    }

    fn build(r: &Region, children: &HashMap<&str, Vec<&Region>>) -> RegionNode {
        RegionNode {
            code: r.code.clone(),
            name: r.name.clone(),
            level: r.level,
            children: children
                .get(r.code.as_str())
                .map(|cs| cs.iter().map(|c| build(c, children)).collect())
                .unwrap_or_default(),
        }
    }

    roots.into_iter().map(|r| build(r, &children)).collect()
}

impl SurveyStore {
    pub async fn list_regions(&self) -> Result<Vec<Region>> {
        let rows = Entity::find()
            .order_by(Column::Level, Order::Asc)
            .order_by(Column::SortOrder, Order::Asc)
            .order_by(Column::Code, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_region).collect())
    }

    /// Direct children of `parent_code`; `None` lists the top level.
    pub async fn list_region_children(&self, parent_code: Option<&str>) -> Result<Vec<Region>> {
        let q = match parent_code {
            Some(p) => Entity::find().filter(Column::ParentCode.eq(p)),
            None => Entity::find().filter(Column::ParentCode.is_null()),
        };
        let rows = q
            .order_by(Column::SortOrder, Order::Asc)
            .order_by(Column::Code, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_region).collect())
    }

    pub async fn region_tree(&self) -> Result<Vec<RegionNode>> {
        let all = self.list_regions().await?;
        Ok(build_region_tree(&all))
    }

    pub async fn get_region(&self, code: &str) -> Result<Option<Region>> {
        let model = Entity::find_by_id(code).one(self.db()).await?;
        Ok(model.map(to_region))
    }

    /// Create a custom region. The level is derived from the parent and
    /// districts cannot have children.
    pub async fn create_region(&self, req: &CreateRegionRequest) -> Result<Region> {
        if self.get_region(&req.code).await?.is_some() {
            return Err(StorageError::Duplicate {
                entity: "region",
                field: "code",
                value: req.code.clone(),
            }
            .into());
        }
        let level = match req.parent_code.as_deref() {
            Some(p) => {
                let parent = self.get_region(p).await?.ok_or_else(|| StorageError::NotFound {
                    entity: "region",
                    id: p.to_owned(),
                })?;
                if parent.level >= MAX_REGION_LEVEL {
                    return Err(StorageError::Rejected(format!(
                        "region '{p}' is at the deepest level and cannot have children"
                    ))
                    .into());
                }
                parent.level + 1
            }
            None => 1,
        };
        self.insert_region(
            &req.code,
            &req.name,
            req.parent_code.clone(),
            level,
            req.sort_order.unwrap_or(0),
            false,
        )
        .await
    }

    async fn insert_region(
        &self,
        code: &str,
        name: &str,
        parent_code: Option<String>,
        level: i32,
        sort_order: i32,
        is_system: bool,
    ) -> Result<Region> {
        let now = Utc::now().fixed_offset();
        let am = region::ActiveModel {
            code: Set(code.to_owned()),
            name: Set(name.to_owned()),
            parent_code: Set(parent_code),
            level: Set(level),
            sort_order: Set(sort_order),
            is_system: Set(is_system),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(self.db()).await?;
        Ok(to_region(m))
    }

    pub async fn update_region(
        &self,
        code: &str,
        update: &UpdateRegionRequest,
    ) -> Result<Option<Region>> {
        let Some(m) = Entity::find_by_id(code).one(self.db()).await? else {
            return Ok(None);
        };
        let mut am: region::ActiveModel = m.into();
        if let Some(ref name) = update.name {
            am.name = Set(name.clone());
        }
        if let Some(order) = update.sort_order {
            am.sort_order = Set(order);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(to_region(updated)))
    }

    /// Delete a leaf region. Regions with children are rejected.
    pub async fn delete_region(&self, code: &str) -> Result<bool> {
        let children = Entity::find()
            .filter(Column::ParentCode.eq(code))
            .count(self.db())
            .await?;
        if children > 0 {
            return Err(StorageError::Rejected(format!(
                "region '{code}' still has {children} child regions"
            ))
            .into());
        }
        let res = Entity::delete_by_id(code).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn count_regions(&self) -> Result<u64> {
        Ok(Entity::find().count(self.db()).await?)
    }

    /// Seed presets on a fresh database only. Regions deleted later stay
    /// deleted until `ensure_preset_regions` is run explicitly.
    pub async fn seed_preset_regions_if_empty(&self) -> Result<usize> {
        if self.count_regions().await? > 0 {
            return Ok(0);
        }
        self.ensure_preset_regions().await
    }

    /// Insert preset regions that are not present yet.
    pub async fn ensure_preset_regions(&self) -> Result<usize> {
        let mut inserted = 0usize;
        for (idx, (code, name, parent)) in emsurvey_common::region::preset_regions()
            .into_iter()
            .enumerate()
        {
            if self.get_region(code).await?.is_some() {
                continue;
            }
            let level = emsurvey_common::region::preset_level(parent);
            self.insert_region(code, name, parent.map(str::to_owned), level, idx as i32, true)
                .await?;
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(code: &str, parent: Option<&str>, level: i32) -> Region {
        let now = Utc::now();
        Region {
            code: code.into(),
            name: code.into(),
            parent_code: parent.map(Into::into),
            level,
            sort_order: 0,
            is_system: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let flat = vec![
            region("440000", None, 1),
            region("110000", None, 1),
            region("440300", Some("440000"), 2),
            region("440305", Some("440300"), 3),
        ];
        let tree = build_region_tree(&flat);
        assert_eq!(tree.len(), 2);
        let gd = tree.iter().find(|n| n.code == "440000").expect("guangdong root");
        assert_eq!(gd.children.len(), 1);
        assert_eq!(gd.children[0].children[0].code, "440305");
    }

    #[test]
    fn orphans_become_roots() {
        let flat = vec![region("440305", Some("440300"), 3)];
        let tree = build_region_tree(&flat);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }
}
