use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, JoinType, QueryFilter,
    QuerySelect, RelationTrait, Set, SqlErr,
};

use crate::auth::token::{TokenScope, storage_timestamp};
use crate::db::{StoreError, StoreResult};
use crate::entities::{tokens, users};
use crate::models::InvariantViolation;
use crate::models::user::User;

pub struct UserRepository {
    conn: DatabaseConnection,
}

fn map_unique_email(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::DuplicateEmail,
        _ => StoreError::Database(err),
    }
}

fn password_hash(user: &User) -> StoreResult<String> {
    user.password
        .hash()
        .map(str::to_string)
        .ok_or_else(|| InvariantViolation::new("user persisted without a password hash").into())
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, user: &User) -> StoreResult<User> {
        let model = users::ActiveModel {
            created_at: Set(Utc::now().to_rfc3339()),
            name: Set(user.name.clone()),
            email: Set(user.email.clone()),
            password_hash: Set(password_hash(user)?),
            activated: Set(user.activated),
            version: Set(1),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .map_err(map_unique_email)?;

        Ok(User::from(model))
    }

    pub async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await?;

        Ok(user.map(User::from))
    }

    /// Writes every mutable column, conditioned on the version the caller
    /// read. A missing row or a moved version is an edit conflict.
    pub async fn update(&self, user: &User) -> StoreResult<User> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::Name, Expr::value(user.name.clone()))
            .col_expr(users::Column::Email, Expr::value(user.email.clone()))
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash(user)?))
            .col_expr(users::Column::Activated, Expr::value(user.activated))
            .col_expr(
                users::Column::Version,
                Expr::col(users::Column::Version).add(1),
            )
            .filter(users::Column::Id.eq(user.id))
            .filter(users::Column::Version.eq(user.version))
            .exec(&self.conn)
            .await
            .map_err(map_unique_email)?;

        if result.rows_affected == 0 {
            return Err(StoreError::EditConflict);
        }

        let mut updated = user.clone();
        updated.version += 1;
        Ok(updated)
    }

    pub async fn get_for_token(
        &self,
        scope: TokenScope,
        hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let user = users::Entity::find()
            .join(JoinType::InnerJoin, users::Relation::Tokens.def())
            .filter(tokens::Column::Hash.eq(hash))
            .filter(tokens::Column::Scope.eq(scope.as_str()))
            .filter(tokens::Column::Expiry.gt(storage_timestamp(now)))
            .one(&self.conn)
            .await?;

        Ok(user.map(User::from))
    }
}
