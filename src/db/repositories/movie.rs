use chrono::Utc;
use sea_orm::sea_query::{Expr, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};

use crate::db::{StoreError, StoreResult};
use crate::entities::movies;
use crate::models::InvariantViolation;
use crate::models::filters::{Filters, Metadata, SortDirection};
use crate::models::movie::Movie;

pub struct MovieRepository {
    conn: DatabaseConnection,
}

fn encode_genres(genres: &[String]) -> StoreResult<String> {
    serde_json::to_string(genres)
        .map_err(|e| InvariantViolation::new(format!("genres not encodable: {e}")).into())
}

/// `%needle%` with LIKE wildcards in the needle taken literally.
fn contains_pattern(needle: &str) -> LikeExpr {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    LikeExpr::new(format!("%{escaped}%")).escape('\\')
}

fn sort_column(filters: &Filters) -> StoreResult<movies::Column> {
    match filters.sort_column()? {
        "id" => Ok(movies::Column::Id),
        "title" => Ok(movies::Column::Title),
        "year" => Ok(movies::Column::Year),
        "runtime" => Ok(movies::Column::Runtime),
        other => Err(InvariantViolation::new(format!("no movie column for sort {other}")).into()),
    }
}

impl MovieRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, movie: &Movie) -> StoreResult<Movie> {
        let model = movies::ActiveModel {
            created_at: Set(Utc::now().to_rfc3339()),
            title: Set(movie.title.clone()),
            year: Set(movie.year),
            runtime: Set(movie.runtime.0),
            genres: Set(encode_genres(&movie.genres)?),
            version: Set(1),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        Ok(Movie::try_from(model)?)
    }

    pub async fn get(&self, id: i32) -> StoreResult<Option<Movie>> {
        if id < 1 {
            return Ok(None);
        }

        let movie = movies::Entity::find_by_id(id).one(&self.conn).await?;
        Ok(movie.map(Movie::try_from).transpose()?)
    }

    /// Conditional on `movie.version`; on success the returned movie carries
    /// the bumped version. Zero matched rows means someone else got there
    /// first (or the movie is gone).
    pub async fn update(&self, movie: &Movie) -> StoreResult<Movie> {
        let result = movies::Entity::update_many()
            .col_expr(movies::Column::Title, Expr::value(movie.title.clone()))
            .col_expr(movies::Column::Year, Expr::value(movie.year))
            .col_expr(movies::Column::Runtime, Expr::value(movie.runtime.0))
            .col_expr(
                movies::Column::Genres,
                Expr::value(encode_genres(&movie.genres)?),
            )
            .col_expr(
                movies::Column::Version,
                Expr::col(movies::Column::Version).add(1),
            )
            .filter(movies::Column::Id.eq(movie.id))
            .filter(movies::Column::Version.eq(movie.version))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::EditConflict);
        }

        let mut updated = movie.clone();
        updated.version += 1;
        Ok(updated)
    }

    pub async fn delete(&self, id: i32) -> StoreResult<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }

        let result = movies::Entity::delete_by_id(id).exec(&self.conn).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn filtered(title: &str, genres: &[String]) -> StoreResult<Select<movies::Entity>> {
        let mut query = movies::Entity::find();

        if !title.is_empty() {
            query = query.filter(movies::Column::Title.like(contains_pattern(title)));
        }

        // Every requested genre must be present in the stored JSON array.
        for genre in genres {
            let quoted = serde_json::to_string(genre)
                .map_err(|e| InvariantViolation::new(format!("genre not encodable: {e}")))?;
            query = query.filter(movies::Column::Genres.like(contains_pattern(&quoted)));
        }

        Ok(query)
    }

    pub async fn get_all(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> StoreResult<(Vec<Movie>, Metadata)> {
        let column = sort_column(filters)?;
        let order = match filters.sort_direction() {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };

        let total = Self::filtered(title, genres)?.count(&self.conn).await?;

        let rows = Self::filtered(title, genres)?
            .order_by(column, order)
            .order_by_asc(movies::Column::Id)
            .limit(filters.limit())
            .offset(filters.offset())
            .all(&self.conn)
            .await?;

        let movies = rows
            .into_iter()
            .map(Movie::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((
            movies,
            Metadata::calculate(total, filters.page, filters.page_size),
        ))
    }
}
