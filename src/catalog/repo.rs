use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{
    Category, CategoryChanges, CategoryType, NewCategory, NewSubcategory, Subcategory,
    SubcategoryChanges,
};
use crate::{db::RepoResult, pagination::Page};

#[async_trait]
pub trait CategoryTypeRepository: Send + Sync {
    async fn create(&self, name: &str) -> RepoResult<CategoryType>;
    async fn get(&self, id: i32) -> RepoResult<Option<CategoryType>>;
    async fn list(&self, page: Page) -> RepoResult<Vec<CategoryType>>;
    async fn update(&self, id: i32, name: &str) -> RepoResult<Option<CategoryType>>;
    async fn delete(&self, id: i32) -> RepoResult<bool>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, new: &NewCategory) -> RepoResult<Category>;
    async fn get(&self, id: i32) -> RepoResult<Option<Category>>;
    async fn list(&self, page: Page) -> RepoResult<Vec<Category>>;
    async fn list_by_type(&self, type_id: i32, page: Page) -> RepoResult<Vec<Category>>;
    async fn update(&self, id: i32, changes: &CategoryChanges) -> RepoResult<Option<Category>>;
    async fn delete(&self, id: i32) -> RepoResult<bool>;
}

#[async_trait]
pub trait SubcategoryRepository: Send + Sync {
    async fn create(&self, new: &NewSubcategory) -> RepoResult<Subcategory>;
    async fn get(&self, id: i32) -> RepoResult<Option<Subcategory>>;
    async fn list(&self, page: Page) -> RepoResult<Vec<Subcategory>>;
    async fn list_by_type(&self, type_id: i32, page: Page) -> RepoResult<Vec<Subcategory>>;
    async fn list_by_category(&self, category_id: i32, page: Page)
        -> RepoResult<Vec<Subcategory>>;
    async fn update(
        &self,
        id: i32,
        changes: &SubcategoryChanges,
    ) -> RepoResult<Option<Subcategory>>;
    async fn delete(&self, id: i32) -> RepoResult<bool>;
}

#[derive(Clone)]
pub struct PgCatalogRepository {
    db: PgPool,
}

impl PgCatalogRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoryTypeRepository for PgCatalogRepository {
    async fn create(&self, name: &str) -> RepoResult<CategoryType> {
        let row = sqlx::query_as::<_, CategoryType>(
            r#"
            INSERT INTO category_types (name)
            VALUES ($1)
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn get(&self, id: i32) -> RepoResult<Option<CategoryType>> {
        let row = sqlx::query_as::<_, CategoryType>(
            r#"SELECT id, name FROM category_types WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list(&self, page: Page) -> RepoResult<Vec<CategoryType>> {
        let rows = sqlx::query_as::<_, CategoryType>(
            r#"
            SELECT id, name
            FROM category_types
            ORDER BY id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update(&self, id: i32, name: &str) -> RepoResult<Option<CategoryType>> {
        let row = sqlx::query_as::<_, CategoryType>(
            r#"
            UPDATE category_types
            SET name = $2
            WHERE id = $1
            RETURNING id, name
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i32) -> RepoResult<bool> {
        let res = sqlx::query(r#"DELETE FROM category_types WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl CategoryRepository for PgCatalogRepository {
    async fn create(&self, new: &NewCategory) -> RepoResult<Category> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (type_id, name)
            VALUES ($1, $2)
            RETURNING id, name, type_id
            "#,
        )
        .bind(new.type_id)
        .bind(&new.name)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn get(&self, id: i32) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"SELECT id, name, type_id FROM categories WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list(&self, page: Page) -> RepoResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, type_id
            FROM categories
            ORDER BY id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_by_type(&self, type_id: i32, page: Page) -> RepoResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, type_id
            FROM categories
            WHERE type_id = $1
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(type_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update(&self, id: i32, changes: &CategoryChanges) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                type_id = COALESCE($3, type_id)
            WHERE id = $1
            RETURNING id, name, type_id
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.type_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i32) -> RepoResult<bool> {
        let res = sqlx::query(r#"DELETE FROM categories WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl SubcategoryRepository for PgCatalogRepository {
    async fn create(&self, new: &NewSubcategory) -> RepoResult<Subcategory> {
        let row = sqlx::query_as::<_, Subcategory>(
            r#"
            INSERT INTO subcategories (category_id, name)
            VALUES ($1, $2)
            RETURNING id, name, category_id
            "#,
        )
        .bind(new.category_id)
        .bind(&new.name)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn get(&self, id: i32) -> RepoResult<Option<Subcategory>> {
        let row = sqlx::query_as::<_, Subcategory>(
            r#"SELECT id, name, category_id FROM subcategories WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list(&self, page: Page) -> RepoResult<Vec<Subcategory>> {
        let rows = sqlx::query_as::<_, Subcategory>(
            r#"
            SELECT id, name, category_id
            FROM subcategories
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_by_type(&self, type_id: i32, page: Page) -> RepoResult<Vec<Subcategory>> {
        let rows = sqlx::query_as::<_, Subcategory>(
            r#"
            SELECT s.id, s.name, s.category_id
            FROM subcategories s
            JOIN categories c ON c.id = s.category_id
            WHERE c.type_id = $1
            ORDER BY s.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(type_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_by_category(
        &self,
        category_id: i32,
        page: Page,
    ) -> RepoResult<Vec<Subcategory>> {
        let rows = sqlx::query_as::<_, Subcategory>(
            r#"
            SELECT id, name, category_id
            FROM subcategories
            WHERE category_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(category_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update(
        &self,
        id: i32,
        changes: &SubcategoryChanges,
    ) -> RepoResult<Option<Subcategory>> {
        let row = sqlx::query_as::<_, Subcategory>(
            r#"
            UPDATE subcategories
            SET name = COALESCE($2, name),
                category_id = COALESCE($3, category_id)
            WHERE id = $1
            RETURNING id, name, category_id
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.category_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i32) -> RepoResult<bool> {
        let res = sqlx::query(r#"DELETE FROM subcategories WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
