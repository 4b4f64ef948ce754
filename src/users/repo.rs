use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::repo_types::{NewProvider, NewUser, User, UserChanges};
use crate::{db::RepoResult, snowflake::SnowflakeNode};

const USER_COLUMNS: &str =
    "id, first_name, last_name, phone_number, email, picture_name, hash, role, verified, created_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, new: &NewUser) -> RepoResult<User>;
    /// Inserts the user and its provider row in one transaction.
    async fn create_provider(&self, new: &NewUser, provider: &NewProvider) -> RepoResult<User>;
    async fn get(&self, id: i64) -> RepoResult<Option<User>>;
    async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn update(&self, id: i64, changes: &UserChanges) -> RepoResult<Option<User>>;
    async fn set_picture(&self, id: i64, picture_name: Option<&str>) -> RepoResult<bool>;
    async fn set_verified(&self, id: i64) -> RepoResult<bool>;
    async fn set_hash(&self, id: i64, hash: &str) -> RepoResult<bool>;
    async fn delete(&self, id: i64) -> RepoResult<bool>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
    ids: Arc<SnowflakeNode>,
}

impl PgUserRepository {
    pub fn new(db: PgPool, ids: Arc<SnowflakeNode>) -> Self {
        Self { db, ids }
    }
}

pub async fn insert_user_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    new: &NewUser,
) -> RepoResult<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, first_name, last_name, phone_number, email, hash, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.phone_number)
    .bind(&new.email)
    .bind(&new.hash)
    .bind(new.role)
    .fetch_one(&mut **tx)
    .await?;
    Ok(user)
}

pub async fn insert_provider_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    provider: &NewProvider,
) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO providers (user_id, personal_id_number, personal_id_preview)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(&provider.encrypted_personal_id)
    .bind(&provider.personal_id_preview)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, new: &NewUser) -> RepoResult<User> {
        let mut tx = self.db.begin().await?;
        let user = insert_user_tx(&mut tx, self.ids.generate(), new).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn create_provider(&self, new: &NewUser, provider: &NewProvider) -> RepoResult<User> {
        // dropping `tx` on an early return rolls it back
        let mut tx = self.db.begin().await?;
        let user = insert_user_tx(&mut tx, self.ids.generate(), new).await?;
        insert_provider_tx(&mut tx, user.id, provider).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn get(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> RepoResult<Option<User>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        {
            let mut set = qb.separated(", ");
            let fields = [
                ("first_name", &changes.first_name),
                ("last_name", &changes.last_name),
                ("phone_number", &changes.phone_number),
                ("email", &changes.email),
            ];
            for (column, value) in fields {
                if let Some(value) = value {
                    set.push(format!("{column} = "));
                    set.push_bind_unseparated(value.clone());
                }
            }
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {USER_COLUMNS}"));

        let user = qb
            .build_query_as::<User>()
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn set_picture(&self, id: i64, picture_name: Option<&str>) -> RepoResult<bool> {
        let res = sqlx::query(r#"UPDATE users SET picture_name = $2 WHERE id = $1"#)
            .bind(id)
            .bind(picture_name)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_verified(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query(r#"UPDATE users SET verified = TRUE WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_hash(&self, id: i64, hash: &str) -> RepoResult<bool> {
        let res = sqlx::query(r#"UPDATE users SET hash = $2 WHERE id = $1"#)
            .bind(id)
            .bind(hash)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
