use serde::Deserialize;

use super::repo_types::{CategoryChanges, NewCategory, NewSubcategory, SubcategoryChanges};
use crate::{
    rest::ApiError,
    validation::{ensure, is_valid_catalog_name, Validate},
};

const NAME_MAX: usize = 30;
const SUBCATEGORY_NAME_MAX: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CategoryTypeRequest {
    pub name: String,
}

impl Validate for CategoryTypeRequest {
    fn validate(&self) -> Result<(), ApiError> {
        ensure(is_valid_catalog_name(&self.name, NAME_MAX))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub type_id: i32,
}

impl Validate for CreateCategoryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        ensure(is_valid_catalog_name(&self.name, NAME_MAX) && self.type_id > 0)
    }
}

impl From<CreateCategoryRequest> for NewCategory {
    fn from(req: CreateCategoryRequest) -> Self {
        Self {
            name: req.name,
            type_id: req.type_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub type_id: Option<i32>,
}

impl Validate for UpdateCategoryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let name_ok = self
            .name
            .as_deref()
            .map_or(true, |n| is_valid_catalog_name(n, NAME_MAX));
        ensure(name_ok && self.type_id.map_or(true, |id| id > 0))
    }
}

impl From<UpdateCategoryRequest> for CategoryChanges {
    fn from(req: UpdateCategoryRequest) -> Self {
        Self {
            name: req.name,
            type_id: req.type_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSubcategoryRequest {
    pub name: String,
    pub category_id: i32,
}

impl Validate for CreateSubcategoryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        ensure(is_valid_catalog_name(&self.name, SUBCATEGORY_NAME_MAX) && self.category_id > 0)
    }
}

impl From<CreateSubcategoryRequest> for NewSubcategory {
    fn from(req: CreateSubcategoryRequest) -> Self {
        Self {
            name: req.name,
            category_id: req.category_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubcategoryRequest {
    pub name: Option<String>,
    pub category_id: Option<i32>,
}

impl Validate for UpdateSubcategoryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let name_ok = self
            .name
            .as_deref()
            .map_or(true, |n| is_valid_catalog_name(n, SUBCATEGORY_NAME_MAX));
        ensure(name_ok && self.category_id.map_or(true, |id| id > 0))
    }
}

impl From<UpdateSubcategoryRequest> for SubcategoryChanges {
    fn from(req: UpdateSubcategoryRequest) -> Self {
        Self {
            name: req.name,
            category_id: req.category_id,
        }
    }
}
