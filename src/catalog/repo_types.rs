use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CategoryType {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub type_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subcategory {
    pub id: i32,
    pub name: String,
    pub category_id: i32,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub type_id: i32,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub type_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewSubcategory {
    pub name: String,
    pub category_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct SubcategoryChanges {
    pub name: Option<String>,
    pub category_id: Option<i32>,
}
