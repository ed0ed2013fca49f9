use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub created_at: String,
    pub title: String,
    pub year: i32,
    /// Minutes
    pub runtime: i32,
    /// JSON array of genre names, e.g. ["drama","romance"]
    pub genres: String,
    /// Starts at 1, bumped by every successful update.
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
