use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};

use crate::auth::token::{Token, TokenScope, storage_timestamp};
use crate::db::StoreResult;
use crate::entities::tokens;

/// Tokens are only ever inserted and deleted, never updated.
pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, token: &Token) -> StoreResult<()> {
        tokens::Entity::insert(tokens::ActiveModel {
            hash: Set(token.hash.clone()),
            user_id: Set(token.user_id),
            expiry: Set(storage_timestamp(token.expiry)),
            scope: Set(token.scope.as_str().to_string()),
        })
        .exec_without_returning(&self.conn)
        .await?;

        Ok(())
    }

    pub async fn delete_all_for_user(&self, scope: TokenScope, user_id: i32) -> StoreResult<u64> {
        let result = tokens::Entity::delete_many()
            .filter(tokens::Column::Scope.eq(scope.as_str()))
            .filter(tokens::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn count_with_hash(&self, scope: TokenScope, hash: &str) -> StoreResult<u64> {
        let count = tokens::Entity::find()
            .filter(tokens::Column::Hash.eq(hash))
            .filter(tokens::Column::Scope.eq(scope.as_str()))
            .count(&self.conn)
            .await?;

        Ok(count)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = tokens::Entity::delete_many()
            .filter(tokens::Column::Expiry.lte(storage_timestamp(now)))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }
}
