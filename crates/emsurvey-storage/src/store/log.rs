use anyhow::Result;
use chrono::{Duration, Utc};
use emsurvey_common::types::{NewSystemLog, SystemLog, SystemLogFilter};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};

use crate::entities::system_log::{self, Column, Entity};
use crate::store::SurveyStore;

fn to_log(m: system_log::Model) -> SystemLog {
    SystemLog {
        id: m.id,
        user_id: m.user_id,
        username: m.username,
        module: m.module,
        action: m.action,
        target_id: m.target_id,
        detail: m.detail,
        trace_id: m.trace_id,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

fn apply_filter(mut q: Select<Entity>, filter: &SystemLogFilter) -> Select<Entity> {
    if let Some(ref module) = filter.module_eq {
        q = q.filter(Column::Module.eq(module.as_str()));
    }
    if let Some(ref action) = filter.action_eq {
        q = q.filter(Column::Action.eq(action.as_str()));
    }
    if let Some(ref name) = filter.username_contains {
        q = q.filter(Column::Username.contains(name.as_str()));
    }
    if let Some(from) = filter.from {
        q = q.filter(Column::CreatedAt.gte(from.fixed_offset()));
    }
    if let Some(to) = filter.to {
        q = q.filter(Column::CreatedAt.lte(to.fixed_offset()));
    }
    q
}

impl SurveyStore {
    pub async fn insert_log(&self, entry: &NewSystemLog) -> Result<SystemLog> {
        let am = system_log::ActiveModel {
            id: Set(emsurvey_common::id::next_id()),
            user_id: Set(entry.user_id.clone()),
            username: Set(entry.username.clone()),
            module: Set(entry.module.clone()),
            action: Set(entry.action.clone()),
            target_id: Set(entry.target_id.clone()),
            detail: Set(entry.detail.clone()),
            trace_id: Set(entry.trace_id.clone()),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let m = am.insert(self.db()).await?;
        Ok(to_log(m))
    }

    pub async fn list_logs(
        &self,
        filter: &SystemLogFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SystemLog>> {
        let rows = apply_filter(Entity::find(), filter)
            .order_by(Column::CreatedAt, Order::Desc)
            .order_by(Column::Id, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_log).collect())
    }

    pub async fn count_logs(&self, filter: &SystemLogFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter).count(self.db()).await?)
    }

    /// Remove entries older than `retention_days`; returns the deleted count.
    pub async fn cleanup_logs(&self, retention_days: u32) -> Result<u64> {
        let cutoff = (Utc::now() - Duration::days(i64::from(retention_days))).fixed_offset();
        let res = Entity::delete_many()
            .filter(Column::CreatedAt.lt(cutoff))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
