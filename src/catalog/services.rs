use std::sync::Arc;

use tracing::{info, warn};

use super::{
    repo::{CategoryRepository, CategoryTypeRepository, SubcategoryRepository},
    repo_types::{
        Category, CategoryChanges, CategoryType, NewCategory, NewSubcategory, Subcategory,
        SubcategoryChanges,
    },
};
use crate::{db::RepoError, pagination::Page, rest::ApiError};

pub const MSG_NAME_TAKEN: &str = "This name is already taken";
pub const MSG_NO_CHANGES: &str = "No changes";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Category type not found")]
    CategoryTypeNotFound,
    #[error("Category not found")]
    CategoryNotFound,
    #[error("Subcategory not found")]
    SubcategoryNotFound,
    #[error("name is already taken")]
    NameTaken,
    #[error("no changes")]
    NoChanges,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::CategoryTypeNotFound
            | CatalogError::CategoryNotFound
            | CatalogError::SubcategoryNotFound => ApiError::not_found(err.to_string()),
            CatalogError::NameTaken => ApiError::conflict(MSG_NAME_TAKEN),
            CatalogError::NoChanges => ApiError::bad_request(MSG_NO_CHANGES),
            CatalogError::Repo(e) => ApiError::Internal(e.into()),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Maps write failures. `missing_parent` is what a dangling foreign key means for this entity.
fn classify_write(err: RepoError, missing_parent: CatalogError) -> CatalogError {
    match err {
        e if e.is_conflict() => CatalogError::NameTaken,
        RepoError::ForeignKeyViolation => missing_parent,
        e => CatalogError::Repo(e),
    }
}

#[derive(Clone)]
pub struct CategoryTypeService {
    repo: Arc<dyn CategoryTypeRepository>,
}

impl CategoryTypeService {
    pub fn new(repo: Arc<dyn CategoryTypeRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, name: &str) -> CatalogResult<CategoryType> {
        let created = self.repo.create(name).await.map_err(|e| {
            classify_write(e, CatalogError::CategoryTypeNotFound)
        })?;
        info!(type_id = created.id, name = %created.name, "category type created");
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> CatalogResult<CategoryType> {
        self.repo
            .get(id)
            .await?
            .ok_or(CatalogError::CategoryTypeNotFound)
    }

    pub async fn list(&self, page: Page) -> CatalogResult<Vec<CategoryType>> {
        Ok(self.repo.list(page).await?)
    }

    pub async fn update(&self, id: i32, name: &str) -> CatalogResult<CategoryType> {
        self.repo
            .update(id, name)
            .await
            .map_err(|e| classify_write(e, CatalogError::CategoryTypeNotFound))?
            .ok_or(CatalogError::CategoryTypeNotFound)
    }

    pub async fn delete(&self, id: i32) -> CatalogResult<()> {
        if !self.repo.delete(id).await? {
            warn!(type_id = id, "delete of missing category type");
            return Err(CatalogError::CategoryTypeNotFound);
        }
        info!(type_id = id, "category type deleted");
        Ok(())
    }
}

#[derive(Clone)]
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, new: NewCategory) -> CatalogResult<Category> {
        let created = self
            .repo
            .create(&new)
            .await
            .map_err(|e| classify_write(e, CatalogError::CategoryTypeNotFound))?;
        info!(category_id = created.id, type_id = created.type_id, "category created");
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> CatalogResult<Category> {
        self.repo.get(id).await?.ok_or(CatalogError::CategoryNotFound)
    }

    pub async fn list(&self, page: Page) -> CatalogResult<Vec<Category>> {
        Ok(self.repo.list(page).await?)
    }

    pub async fn list_by_type(&self, type_id: i32, page: Page) -> CatalogResult<Vec<Category>> {
        Ok(self.repo.list_by_type(type_id, page).await?)
    }

    pub async fn update(&self, id: i32, changes: CategoryChanges) -> CatalogResult<Category> {
        if changes.name.is_none() && changes.type_id.is_none() {
            return Err(CatalogError::NoChanges);
        }
        self.repo
            .update(id, &changes)
            .await
            .map_err(|e| classify_write(e, CatalogError::CategoryTypeNotFound))?
            .ok_or(CatalogError::CategoryNotFound)
    }

    pub async fn delete(&self, id: i32) -> CatalogResult<()> {
        if !self.repo.delete(id).await? {
            return Err(CatalogError::CategoryNotFound);
        }
        info!(category_id = id, "category deleted");
        Ok(())
    }
}

#[derive(Clone)]
pub struct SubcategoryService {
    repo: Arc<dyn SubcategoryRepository>,
}

impl SubcategoryService {
    pub fn new(repo: Arc<dyn SubcategoryRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, new: NewSubcategory) -> CatalogResult<Subcategory> {
        let created = self
            .repo
            .create(&new)
            .await
            .map_err(|e| classify_write(e, CatalogError::CategoryNotFound))?;
        info!(
            subcategory_id = created.id,
            category_id = created.category_id,
            "subcategory created"
        );
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> CatalogResult<Subcategory> {
        self.repo
            .get(id)
            .await?
            .ok_or(CatalogError::SubcategoryNotFound)
    }

    pub async fn list(&self, page: Page) -> CatalogResult<Vec<Subcategory>> {
        Ok(self.repo.list(page).await?)
    }

    pub async fn list_by_type(&self, type_id: i32, page: Page) -> CatalogResult<Vec<Subcategory>> {
        Ok(self.repo.list_by_type(type_id, page).await?)
    }

    pub async fn list_by_category(
        &self,
        category_id: i32,
        page: Page,
    ) -> CatalogResult<Vec<Subcategory>> {
        Ok(self.repo.list_by_category(category_id, page).await?)
    }

    pub async fn update(
        &self,
        id: i32,
        changes: SubcategoryChanges,
    ) -> CatalogResult<Subcategory> {
        if changes.name.is_none() && changes.category_id.is_none() {
            return Err(CatalogError::NoChanges);
        }
        self.repo
            .update(id, &changes)
            .await
            .map_err(|e| classify_write(e, CatalogError::CategoryNotFound))?
            .ok_or(CatalogError::SubcategoryNotFound)
    }

    pub async fn delete(&self, id: i32) -> CatalogResult<()> {
        if !self.repo.delete(id).await? {
            return Err(CatalogError::SubcategoryNotFound);
        }
        info!(subcategory_id = id, "subcategory deleted");
        Ok(())
    }
}
