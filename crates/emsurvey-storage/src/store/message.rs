use anyhow::Result;
use chrono::Utc;
use emsurvey_common::types::{Message, NewMessage};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};
use sea_orm::sea_query::Expr;

use crate::entities::message::{self, Column, Entity};
use crate::store::SurveyStore;

fn to_message(m: message::Model) -> Message {
    Message {
        id: m.id,
        recipient_id: m.recipient_id,
        sender_id: m.sender_id,
        title: m.title,
        content: m.content,
        msg_type: m.msg_type,
        related_id: m.related_id,
        is_read: m.is_read,
        read_at: m.read_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
    }
}

fn mine(recipient_id: &str, unread_only: bool) -> Select<Entity> {
    let mut q = Entity::find().filter(Column::RecipientId.eq(recipient_id));
    if unread_only {
        q = q.filter(Column::IsRead.eq(false));
    }
    q
}

impl SurveyStore {
    pub async fn insert_message(&self, new: &NewMessage) -> Result<Message> {
        let am = message::ActiveModel {
            id: Set(emsurvey_common::id::next_id()),
            recipient_id: Set(new.recipient_id.clone()),
            sender_id: Set(new.sender_id.clone()),
            title: Set(new.title.clone()),
            content: Set(new.content.clone()),
            msg_type: Set(new.msg_type.clone()),
            related_id: Set(new.related_id.clone()),
            is_read: Set(false),
            read_at: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let m = am.insert(self.db()).await?;
        Ok(to_message(m))
    }

    pub async fn list_messages_for(
        &self,
        recipient_id: &str,
        unread_only: bool,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        let rows = mine(recipient_id, unread_only)
            .order_by(Column::CreatedAt, Order::Desc)
            .order_by(Column::Id, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_message).collect())
    }

    pub async fn count_messages_for(&self, recipient_id: &str, unread_only: bool) -> Result<u64> {
        Ok(mine(recipient_id, unread_only).count(self.db()).await?)
    }

    pub async fn unread_message_count(&self, recipient_id: &str) -> Result<u64> {
        self.count_messages_for(recipient_id, true).await
    }

    /// Mark one of the recipient's messages read. Returns `false` when the
    /// message does not exist or belongs to someone else.
    pub async fn mark_message_read(&self, recipient_id: &str, id: &str) -> Result<bool> {
        let Some(m) = Entity::find_by_id(id)
            .filter(Column::RecipientId.eq(recipient_id))
            .one(self.db())
            .await?
        else {
            return Ok(false);
        };
        if m.is_read {
            return Ok(true);
        }
        let mut am: message::ActiveModel = m.into();
        am.is_read = Set(true);
        am.read_at = Set(Some(Utc::now().fixed_offset()));
        am.update(self.db()).await?;
        Ok(true)
    }

    /// Mark every unread message of the recipient read; returns the count.
    pub async fn mark_all_messages_read(&self, recipient_id: &str) -> Result<u64> {
        let res = Entity::update_many()
            .col_expr(Column::IsRead, Expr::value(true))
            .col_expr(Column::ReadAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::RecipientId.eq(recipient_id))
            .filter(Column::IsRead.eq(false))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    pub async fn delete_message_for(&self, recipient_id: &str, id: &str) -> Result<bool> {
        let res = Entity::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::RecipientId.eq(recipient_id))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }
}
