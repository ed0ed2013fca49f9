use std::collections::BTreeSet;

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QuerySelect,
    RelationTrait, Set,
};

use crate::db::StoreResult;
use crate::entities::{permissions, users_permissions};
use crate::models::InvariantViolation;
use crate::models::permission::Permissions;

pub struct PermissionRepository {
    conn: DatabaseConnection,
}

impl PermissionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Empty when the user holds nothing (or does not exist).
    pub async fn get_all_for_user(&self, user_id: i32) -> StoreResult<Permissions> {
        let codes: Vec<String> = permissions::Entity::find()
            .select_only()
            .column(permissions::Column::Code)
            .join(
                JoinType::InnerJoin,
                permissions::Relation::UsersPermissions.def(),
            )
            .filter(users_permissions::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(codes.into_iter().collect())
    }

    /// Grants `codes`; already-held codes are left alone.
    pub async fn add_for_user(&self, user_id: i32, codes: &[&str]) -> StoreResult<u64> {
        let codes: BTreeSet<&str> = codes.iter().copied().collect();
        if codes.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i32> = permissions::Entity::find()
            .select_only()
            .column(permissions::Column::Id)
            .filter(permissions::Column::Code.is_in(codes.iter().copied()))
            .into_tuple()
            .all(&self.conn)
            .await?;

        if ids.len() != codes.len() {
            return Err(InvariantViolation::new(format!(
                "unknown permission code in {codes:?}"
            ))
            .into());
        }

        let rows = ids.into_iter().map(|permission_id| users_permissions::ActiveModel {
            user_id: Set(user_id),
            permission_id: Set(permission_id),
        });

        let inserted = users_permissions::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::columns([
                    users_permissions::Column::UserId,
                    users_permissions::Column::PermissionId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(inserted)
    }
}
