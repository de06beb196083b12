use anyhow::Result;
use chrono::Utc;
use emsurvey_common::types::{CreateRoleRequest, Role, UpdateRoleRequest};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};

use crate::entities::role::{self, Column, Entity};
use crate::entities::user;
use crate::error::StorageError;
use crate::store::SurveyStore;

/// 管理员角色编码
pub const ADMIN_ROLE: &str = "admin";

fn to_role(m: role::Model) -> Role {
    let permissions = serde_json::from_str(&m.permissions_json).unwrap_or_default();
    Role {
        id: m.id,
        code: m.code,
        name: m.name,
        description: m.description,
        permissions,
        is_system: m.is_system,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

/// 内置角色：(code, name, description, permissions)
const BUILTIN_ROLES: &[(&str, &str, &str, &[&str])] = &[
    (ADMIN_ROLE, "系统管理员", "管理用户、角色及全部基础数据", &["*"]),
    (
        "sales",
        "销售工程师",
        "创建并填写客户调研单",
        &["survey:read", "survey:write", "message:read"],
    ),
    (
        "presales",
        "售前工程师",
        "负责调研单评估与方案建议",
        &["survey:read", "survey:write", "survey:report", "product:read", "message:read"],
    ),
];

impl SurveyStore {
    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        let rows = Entity::find()
            .order_by(Column::IsSystem, Order::Desc)
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_role).collect())
    }

    pub async fn get_role_by_id(&self, id: &str) -> Result<Option<Role>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_role))
    }

    pub async fn get_role_by_code(&self, code: &str) -> Result<Option<Role>> {
        let model = Entity::find()
            .filter(Column::Code.eq(code))
            .one(self.db())
            .await?;
        Ok(model.map(to_role))
    }

    pub async fn create_role(&self, req: &CreateRoleRequest) -> Result<Role> {
        if self.get_role_by_code(&req.code).await?.is_some() {
            return Err(StorageError::Duplicate {
                entity: "role",
                field: "code",
                value: req.code.clone(),
            }
            .into());
        }
        let permissions = req.permissions.clone().unwrap_or_default();
        self.insert_role(&req.code, &req.name, req.description.clone(), &permissions, false)
            .await
    }

    async fn insert_role(
        &self,
        code: &str,
        name: &str,
        description: Option<String>,
        permissions: &[String],
        is_system: bool,
    ) -> Result<Role> {
        let now = Utc::now().fixed_offset();
        let am = role::ActiveModel {
            id: Set(emsurvey_common::id::next_id()),
            code: Set(code.to_owned()),
            name: Set(name.to_owned()),
            description: Set(description),
            permissions_json: Set(serde_json::to_string(permissions)?),
            is_system: Set(is_system),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(self.db()).await?;
        Ok(to_role(m))
    }

    pub async fn update_role(&self, id: &str, update: &UpdateRoleRequest) -> Result<Option<Role>> {
        let Some(m) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };
        let mut am: role::ActiveModel = m.into();
        if let Some(ref name) = update.name {
            am.name = Set(name.clone());
        }
        if let Some(ref desc) = update.description {
            am.description = Set(desc.clone());
        }
        if let Some(ref perms) = update.permissions {
            am.permissions_json = Set(serde_json::to_string(perms)?);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(to_role(updated)))
    }

    /// Delete a custom role.
    ///
    /// System roles and roles still assigned to users are rejected with
    /// [`StorageError::Rejected`]. Returns `false` when the role is unknown.
    pub async fn delete_role(&self, id: &str) -> Result<bool> {
        let Some(role) = self.get_role_by_id(id).await? else {
            return Ok(false);
        };
        if role.is_system {
            return Err(StorageError::Rejected(format!(
                "system role '{}' cannot be deleted",
                role.code
            ))
            .into());
        }
        if self.count_users_with_role(id).await? > 0 {
            return Err(StorageError::Rejected(format!(
                "role '{}' is still assigned to users",
                role.code
            ))
            .into());
        }
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn count_users_with_role(&self, role_id: &str) -> Result<u64> {
        Ok(user::Entity::find()
            .filter(user::Column::RoleId.eq(role_id))
            .count(self.db())
            .await?)
    }

    /// Insert missing built-in roles. Existing rows are left untouched.
    pub async fn ensure_builtin_roles(&self) -> Result<usize> {
        let mut inserted = 0usize;
        for (code, name, desc, perms) in BUILTIN_ROLES {
            if self.get_role_by_code(code).await?.is_some() {
                continue;
            }
            let perms: Vec<String> = perms.iter().map(|p| (*p).to_string()).collect();
            self.insert_role(code, name, Some((*desc).to_string()), &perms, true)
                .await?;
            inserted += 1;
        }
        if inserted > 0 {
            tracing::info!(inserted, "Built-in roles initialized");
        }
        Ok(inserted)
    }
}
