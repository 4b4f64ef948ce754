//! In-memory stand-ins for Postgres, Redis, S3 and SMTP used by unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;

use crate::{
    auth::{JwtKeys, PasswordHasher, Role},
    catalog::{
        repo::{CategoryRepository, CategoryTypeRepository, SubcategoryRepository},
        repo_types::{
            Category, CategoryChanges, CategoryType, NewCategory, NewSubcategory, Subcategory,
            SubcategoryChanges,
        },
    },
    config::{Argon2Config, JwtConfig},
    db::{RepoError, RepoResult},
    encryption::Encryptor,
    mailer::{Letter, Mailer},
    pagination::Page,
    snowflake::SnowflakeNode,
    storage::StorageClient,
    users::{
        repo::UserRepository,
        repo_types::{NewProvider, NewUser, User, UserChanges},
        services::{AuthService, UserService},
        verification::VerificationRepository,
    },
};

pub const AES_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        issuer: "test".into(),
        audience: "test".into(),
        access_secret: "access-secret".into(),
        access_ttl_minutes: 5,
        refresh_secret: "refresh-secret".into(),
        refresh_ttl_minutes: 60,
        verification_secret: "verification-secret".into(),
        verification_ttl_minutes: 30,
    }
}

pub fn keys() -> JwtKeys {
    JwtKeys::new(&jwt_config()).expect("test keys")
}

pub fn hasher() -> PasswordHasher {
    PasswordHasher::new(&Argon2Config {
        salt_len: 16,
        key_len: 32,
        time: 1,
        memory: 8 * 1024,
        threads: 1,
    })
    .expect("valid argon2 params")
}

pub fn encryptor() -> Encryptor {
    Encryptor::new(AES_KEY).expect("valid aes key")
}

pub fn bearer(keys: &JwtKeys, id: i64, role: Role, verified: bool) -> String {
    let token = keys.sign_access(id, role, verified).expect("sign access");
    format!("Bearer {token}")
}

fn paginate<T: Clone>(rows: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    rows.skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

#[derive(Default)]
struct CatalogTables {
    next_id: i32,
    types: Vec<CategoryType>,
    categories: Vec<Category>,
    subcategories: Vec<Subcategory>,
}

impl CatalogTables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn category_name_taken(&self, type_id: i32, name: &str, except: i32) -> bool {
        self.categories
            .iter()
            .any(|c| c.type_id == type_id && c.name == name && c.id != except)
    }

    fn subcategory_name_taken(&self, category_id: i32, name: &str, except: i32) -> bool {
        self.subcategories
            .iter()
            .any(|s| s.category_id == category_id && s.name == name && s.id != except)
    }
}

/// Catalog tables with the same constraint behaviour as the migrations.
#[derive(Default)]
pub struct InMemoryCatalog {
    tables: Mutex<CatalogTables>,
}

#[async_trait]
impl CategoryTypeRepository for InMemoryCatalog {
    async fn create(&self, name: &str) -> RepoResult<CategoryType> {
        let mut t = self.tables.lock().unwrap();
        if t.types.iter().any(|ct| ct.name == name) {
            return Err(RepoError::UniqueViolation);
        }
        let row = CategoryType {
            id: t.next_id(),
            name: name.to_string(),
        };
        t.types.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: i32) -> RepoResult<Option<CategoryType>> {
        let t = self.tables.lock().unwrap();
        Ok(t.types.iter().find(|ct| ct.id == id).cloned())
    }

    async fn list(&self, page: Page) -> RepoResult<Vec<CategoryType>> {
        let t = self.tables.lock().unwrap();
        Ok(paginate(t.types.iter().rev().cloned(), page))
    }

    async fn update(&self, id: i32, name: &str) -> RepoResult<Option<CategoryType>> {
        let mut t = self.tables.lock().unwrap();
        if t.types.iter().any(|ct| ct.name == name && ct.id != id) {
            return Err(RepoError::UniqueViolation);
        }
        Ok(t.types.iter_mut().find(|ct| ct.id == id).map(|ct| {
            ct.name = name.to_string();
            ct.clone()
        }))
    }

    async fn delete(&self, id: i32) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.types.len();
        t.types.retain(|ct| ct.id != id);
        let removed: HashSet<i32> = t
            .categories
            .iter()
            .filter(|c| c.type_id == id)
            .map(|c| c.id)
            .collect();
        t.categories.retain(|c| c.type_id != id);
        t.subcategories.retain(|s| !removed.contains(&s.category_id));
        Ok(t.types.len() < before)
    }
}

#[async_trait]
impl CategoryRepository for InMemoryCatalog {
    async fn create(&self, new: &NewCategory) -> RepoResult<Category> {
        let mut t = self.tables.lock().unwrap();
        if !t.types.iter().any(|ct| ct.id == new.type_id) {
            return Err(RepoError::ForeignKeyViolation);
        }
        if t.category_name_taken(new.type_id, &new.name, 0) {
            return Err(RepoError::RaisedException("category name is taken".into()));
        }
        let row = Category {
            id: t.next_id(),
            name: new.name.clone(),
            type_id: new.type_id,
        };
        t.categories.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: i32) -> RepoResult<Option<Category>> {
        let t = self.tables.lock().unwrap();
        Ok(t.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn list(&self, page: Page) -> RepoResult<Vec<Category>> {
        let t = self.tables.lock().unwrap();
        Ok(paginate(t.categories.iter().rev().cloned(), page))
    }

    async fn list_by_type(&self, type_id: i32, page: Page) -> RepoResult<Vec<Category>> {
        let t = self.tables.lock().unwrap();
        let rows = t
            .categories
            .iter()
            .rev()
            .filter(|c| c.type_id == type_id)
            .cloned();
        Ok(paginate(rows, page))
    }

    async fn update(&self, id: i32, changes: &CategoryChanges) -> RepoResult<Option<Category>> {
        let mut t = self.tables.lock().unwrap();
        let Some(current) = t.categories.iter().find(|c| c.id == id).cloned() else {
            return Ok(None);
        };
        let type_id = changes.type_id.unwrap_or(current.type_id);
        let name = changes.name.clone().unwrap_or(current.name);
        if !t.types.iter().any(|ct| ct.id == type_id) {
            return Err(RepoError::ForeignKeyViolation);
        }
        if t.category_name_taken(type_id, &name, id) {
            return Err(RepoError::RaisedException("category name is taken".into()));
        }
        let row = t.categories.iter_mut().find(|c| c.id == id).map(|c| {
            c.name = name;
            c.type_id = type_id;
            c.clone()
        });
        Ok(row)
    }

    async fn delete(&self, id: i32) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.categories.len();
        t.categories.retain(|c| c.id != id);
        t.subcategories.retain(|s| s.category_id != id);
        Ok(t.categories.len() < before)
    }
}

#[async_trait]
impl SubcategoryRepository for InMemoryCatalog {
    async fn create(&self, new: &NewSubcategory) -> RepoResult<Subcategory> {
        let mut t = self.tables.lock().unwrap();
        if !t.categories.iter().any(|c| c.id == new.category_id) {
            return Err(RepoError::ForeignKeyViolation);
        }
        if t.subcategory_name_taken(new.category_id, &new.name, 0) {
            return Err(RepoError::UniqueViolation);
        }
        let row = Subcategory {
            id: t.next_id(),
            name: new.name.clone(),
            category_id: new.category_id,
        };
        t.subcategories.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: i32) -> RepoResult<Option<Subcategory>> {
        let t = self.tables.lock().unwrap();
        Ok(t.subcategories.iter().find(|s| s.id == id).cloned())
    }

    async fn list(&self, page: Page) -> RepoResult<Vec<Subcategory>> {
        let t = self.tables.lock().unwrap();
        Ok(paginate(t.subcategories.iter().cloned(), page))
    }

    async fn list_by_type(&self, type_id: i32, page: Page) -> RepoResult<Vec<Subcategory>> {
        let t = self.tables.lock().unwrap();
        let in_type: HashSet<i32> = t
            .categories
            .iter()
            .filter(|c| c.type_id == type_id)
            .map(|c| c.id)
            .collect();
        let rows = t
            .subcategories
            .iter()
            .filter(|s| in_type.contains(&s.category_id))
            .cloned();
        Ok(paginate(rows, page))
    }

    async fn list_by_category(
        &self,
        category_id: i32,
        page: Page,
    ) -> RepoResult<Vec<Subcategory>> {
        let t = self.tables.lock().unwrap();
        let rows = t
            .subcategories
            .iter()
            .filter(|s| s.category_id == category_id)
            .cloned();
        Ok(paginate(rows, page))
    }

    async fn update(
        &self,
        id: i32,
        changes: &SubcategoryChanges,
    ) -> RepoResult<Option<Subcategory>> {
        let mut t = self.tables.lock().unwrap();
        let Some(current) = t.subcategories.iter().find(|s| s.id == id).cloned() else {
            return Ok(None);
        };
        let category_id = changes.category_id.unwrap_or(current.category_id);
        let name = changes.name.clone().unwrap_or(current.name);
        if !t.categories.iter().any(|c| c.id == category_id) {
            return Err(RepoError::ForeignKeyViolation);
        }
        if t.subcategory_name_taken(category_id, &name, id) {
            return Err(RepoError::UniqueViolation);
        }
        let row = t.subcategories.iter_mut().find(|s| s.id == id).map(|s| {
            s.name = name;
            s.category_id = category_id;
            s.clone()
        });
        Ok(row)
    }

    async fn delete(&self, id: i32) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.subcategories.len();
        t.subcategories.retain(|s| s.id != id);
        Ok(t.subcategories.len() < before)
    }
}

/// Users table keyed by snowflake id, with a unique email.
pub struct InMemoryUsers {
    ids: SnowflakeNode,
    users: Mutex<Vec<User>>,
    providers: Mutex<HashMap<i64, NewProvider>>,
}

impl Default for InMemoryUsers {
    fn default() -> Self {
        Self {
            ids: SnowflakeNode::new(1).expect("valid node"),
            users: Mutex::new(Vec::new()),
            providers: Mutex::new(HashMap::new()),
        }
    }
}

impl InMemoryUsers {
    pub fn provider(&self, user_id: i64) -> Option<NewProvider> {
        self.providers.lock().unwrap().get(&user_id).cloned()
    }

    pub fn force_verified(&self, user_id: i64) {
        let mut users = self.users.lock().unwrap();
        if let Some(u) = users.iter_mut().find(|u| u.id == user_id) {
            u.verified = true;
        }
    }

    fn insert(&self, new: &NewUser) -> RepoResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new.email) {
            return Err(RepoError::UniqueViolation);
        }
        let user = User {
            id: self.ids.generate(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            phone_number: new.phone_number.clone(),
            email: new.email.clone(),
            picture_name: None,
            hash: new.hash.clone(),
            role: new.role,
            verified: false,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    fn modify(&self, id: i64, f: impl FnOnce(&mut User)) -> bool {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                f(u);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn create(&self, new: &NewUser) -> RepoResult<User> {
        self.insert(new)
    }

    async fn create_provider(&self, new: &NewUser, provider: &NewProvider) -> RepoResult<User> {
        let user = self.insert(new)?;
        self.providers
            .lock()
            .unwrap()
            .insert(user.id, provider.clone());
        Ok(user)
    }

    async fn get(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> RepoResult<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if let Some(email) = &changes.email {
            if users.iter().any(|u| &u.email == email && u.id != id) {
                return Err(RepoError::UniqueViolation);
            }
        }
        Ok(users.iter_mut().find(|u| u.id == id).map(|u| {
            if let Some(v) = &changes.first_name {
                u.first_name = v.clone();
            }
            if let Some(v) = &changes.last_name {
                u.last_name = v.clone();
            }
            if let Some(v) = &changes.phone_number {
                u.phone_number = v.clone();
            }
            if let Some(v) = &changes.email {
                u.email = v.clone();
            }
            u.clone()
        }))
    }

    async fn set_picture(&self, id: i64, picture_name: Option<&str>) -> RepoResult<bool> {
        let name = picture_name.map(str::to_string);
        Ok(self.modify(id, |u| u.picture_name = name))
    }

    async fn set_verified(&self, id: i64) -> RepoResult<bool> {
        Ok(self.modify(id, |u| u.verified = true))
    }

    async fn set_hash(&self, id: i64, hash: &str) -> RepoResult<bool> {
        Ok(self.modify(id, |u| u.hash = hash.to_string()))
    }

    async fn delete(&self, id: i64) -> RepoResult<bool> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        self.providers.lock().unwrap().remove(&id);
        Ok(users.len() < before)
    }
}

#[derive(Default)]
pub struct InMemoryVerification {
    used: Mutex<HashSet<String>>,
}

#[async_trait]
impl VerificationRepository for InMemoryVerification {
    async fn mark_token_used(&self, token: &str, _ttl: Duration) -> anyhow::Result<bool> {
        Ok(self.used.lock().unwrap().insert(token.to_string()))
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, Letter)>>,
}

impl RecordingMailer {
    pub fn sent_to(&self, to: &str) -> Vec<Letter> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(addr, _)| addr == to)
            .map(|(_, letter)| letter.clone())
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, letter: Letter) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((to.to_string(), letter));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashSet<String>>,
}

impl FakeStorage {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains(key)
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().insert(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
        Ok(format!("https://storage.test/{key}"))
    }
}

/// Services wired to in-memory backends, with handles to inspect them.
pub struct UserKit {
    pub auth: AuthService,
    pub users_svc: UserService,
    pub users: Arc<InMemoryUsers>,
    pub storage: Arc<FakeStorage>,
    pub keys: JwtKeys,
}

pub fn user_kit() -> UserKit {
    user_kit_with_mailer(Arc::new(RecordingMailer::default()))
}

pub fn user_kit_with_mailer(mailer: Arc<RecordingMailer>) -> UserKit {
    let users = Arc::new(InMemoryUsers::default());
    let storage = Arc::new(FakeStorage::default());
    let keys = keys();
    let auth = AuthService::new(
        users.clone(),
        Arc::new(InMemoryVerification::default()),
        mailer,
        hasher(),
        encryptor(),
        keys.clone(),
        "http://localhost/v1/auth/verify".into(),
    );
    let users_svc = UserService::new(users.clone(), storage.clone(), hasher(), 60);
    UserKit {
        auth,
        users_svc,
        users,
        storage,
        keys,
    }
}
