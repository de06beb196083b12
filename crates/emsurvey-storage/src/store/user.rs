use anyhow::Result;
use chrono::Utc;
use emsurvey_common::types::{UpdateUserRequest, User, UserFilter};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};
use std::collections::HashMap;

use crate::entities::role;
use crate::entities::user::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::SurveyStore;

fn to_user(m: user::Model) -> User {
    User {
        id: m.id,
        username: m.username,
        password_hash: m.password_hash,
        token_version: m.token_version as i64,
        display_name: m.display_name,
        email: m.email,
        phone: m.phone,
        role_id: m.role_id,
        role_code: None,
        role_name: None,
        enabled: m.enabled,
        last_login_at: m.last_login_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

/// 新用户写入参数
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role_id: &'a str,
    pub enabled: bool,
}

fn apply_filter(mut q: Select<Entity>, filter: &UserFilter) -> Select<Entity> {
    if let Some(ref name) = filter.username_contains {
        q = q.filter(Column::Username.contains(name.as_str()));
    }
    if let Some(ref role_id) = filter.role_id_eq {
        q = q.filter(Column::RoleId.eq(role_id.as_str()));
    }
    if let Some(enabled) = filter.enabled_eq {
        q = q.filter(Column::Enabled.eq(enabled));
    }
    q
}

impl SurveyStore {
    /// Fill `role_code` / `role_name` from the roles table.
    async fn attach_roles(&self, mut users: Vec<User>) -> Result<Vec<User>> {
        let roles: HashMap<String, role::Model> = role::Entity::find()
            .all(self.db())
            .await?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        for u in &mut users {
            if let Some(r) = roles.get(&u.role_id) {
                u.role_code = Some(r.code.clone());
                u.role_name = Some(r.name.clone());
            }
        }
        Ok(users)
    }

    async fn attach_role(&self, user: Option<User>) -> Result<Option<User>> {
        match user {
            Some(u) => Ok(self.attach_roles(vec![u]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let model = Entity::find()
            .filter(Column::Username.eq(username))
            .one(self.db())
            .await?;
        self.attach_role(model.map(to_user)).await
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        self.attach_role(model.map(to_user)).await
    }

    pub async fn create_user(&self, new_user: &NewUser<'_>) -> Result<User> {
        if self.get_user_by_username(new_user.username).await?.is_some() {
            return Err(StorageError::Duplicate {
                entity: "user",
                field: "username",
                value: new_user.username.to_owned(),
            }
            .into());
        }
        let id = emsurvey_common::id::next_id();
        let now = Utc::now().fixed_offset();
        let am = user::ActiveModel {
            id: Set(id.clone()),
            username: Set(new_user.username.to_owned()),
            password_hash: Set(new_user.password_hash.to_owned()),
            token_version: Set(0),
            display_name: Set(new_user.display_name.clone()),
            email: Set(new_user.email.clone()),
            phone: Set(new_user.phone.clone()),
            role_id: Set(new_user.role_id.to_owned()),
            enabled: Set(new_user.enabled),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        am.insert(self.db()).await?;
        self.get_user_by_id(&id)
            .await?
            .ok_or_else(|| StorageError::InsertReadback { entity: "user" }.into())
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<User>> {
        let rows = apply_filter(Entity::find(), filter)
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        self.attach_roles(rows.into_iter().map(to_user).collect())
            .await
    }

    pub async fn count_users_filtered(&self, filter: &UserFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter).count(self.db()).await?)
    }

    pub async fn count_users(&self) -> Result<u64> {
        Ok(Entity::find().count(self.db()).await?)
    }

    pub async fn update_user(&self, id: &str, update: &UpdateUserRequest) -> Result<Option<User>> {
        let Some(m) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };
        let mut am: user::ActiveModel = m.into();
        if let Some(ref v) = update.display_name {
            am.display_name = Set(v.clone());
        }
        if let Some(ref v) = update.email {
            am.email = Set(v.clone());
        }
        if let Some(ref v) = update.phone {
            am.phone = Set(v.clone());
        }
        if let Some(ref role_id) = update.role_id {
            am.role_id = Set(role_id.clone());
        }
        if let Some(enabled) = update.enabled {
            am.enabled = Set(enabled);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        self.attach_role(Some(to_user(updated))).await
    }

    /// Replace the password hash and bump the token version so that every
    /// previously issued token stops validating.
    pub async fn update_user_password_hash(&self, user_id: &str, password_hash: &str) -> Result<bool> {
        let Some(m) = Entity::find_by_id(user_id).one(self.db()).await? else {
            return Ok(false);
        };
        let next_version = m.token_version + 1;
        let mut am: user::ActiveModel = m.into();
        am.password_hash = Set(password_hash.to_owned());
        am.token_version = Set(next_version);
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(true)
    }

    pub async fn touch_last_login(&self, user_id: &str) -> Result<()> {
        let now = Utc::now().fixed_offset();
        let am = user::ActiveModel {
            id: Set(user_id.to_owned()),
            last_login_at: Set(Some(now)),
            ..Default::default()
        };
        am.update(self.db()).await?;
        Ok(())
    }

    pub async fn delete_user(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}
