use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{
        CategoryTypeRequest, CreateCategoryRequest, CreateSubcategoryRequest,
        UpdateCategoryRequest, UpdateSubcategoryRequest,
    },
    repo_types::{Category, CategoryType, Subcategory},
};
use crate::{
    auth::AdminUser,
    pagination::{Page, PageQuery, MSG_INVALID_PAGE},
    rest::{self, ApiError, ApiResponse, ValidatedJson, MSG_INVALID_ID},
    state::CatalogState,
};

type Reply<T> = Result<Json<ApiResponse<T>>, ApiError>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn read_routes() -> Router<CatalogState> {
    Router::new()
        .route("/category-types", get(list_category_types))
        .route("/category-types/:type_id", get(get_category_type))
        .route(
            "/category-types/:type_id/categories",
            get(list_categories_by_type),
        )
        .route(
            "/category-types/:type_id/subcategories",
            get(list_subcategories_by_type),
        )
        .route("/categories", get(list_categories))
        .route("/categories/:category_id", get(get_category))
        .route(
            "/categories/:category_id/subcategories",
            get(list_subcategories_by_category),
        )
        .route("/subcategories", get(list_subcategories))
        .route("/subcategories/:subcategory_id", get(get_subcategory))
}

pub fn write_routes() -> Router<CatalogState> {
    Router::new()
        .route("/category-types", post(create_category_type))
        .route(
            "/category-types/:type_id",
            patch(update_category_type).delete(delete_category_type),
        )
        .route("/categories", post(create_category))
        .route(
            "/categories/:category_id",
            patch(update_category).delete(delete_category),
        )
        .route("/subcategories", post(create_subcategory))
        .route(
            "/subcategories/:subcategory_id",
            patch(update_subcategory).delete(delete_subcategory),
        )
}

fn parse_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request(MSG_INVALID_ID))
}

fn page(
    state: &CatalogState,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Page, ApiError> {
    let Query(query) = query.map_err(|e| {
        warn!(error = %e, "page query rejected");
        ApiError::bad_request(MSG_INVALID_PAGE)
    })?;
    query.resolve(&state.config.pagination)
}

// --- category types ---

#[instrument(skip(state))]
pub async fn list_category_types(
    State(state): State<CatalogState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Reply<Vec<CategoryType>> {
    let rows = state.category_types.list(page(&state, query)?).await?;
    Ok(rest::ok(rows))
}

#[instrument(skip(state))]
pub async fn get_category_type(
    State(state): State<CatalogState>,
    Path(type_id): Path<String>,
) -> Reply<CategoryType> {
    let row = state.category_types.get(parse_id(&type_id)?).await?;
    Ok(rest::ok(row))
}

#[instrument(skip(state, body), fields(admin_id = admin.0.id))]
pub async fn create_category_type(
    State(state): State<CatalogState>,
    admin: AdminUser,
    ValidatedJson(body): ValidatedJson<CategoryTypeRequest>,
) -> Created<CategoryType> {
    let row = state.category_types.create(&body.name).await?;
    Ok(rest::created(row))
}

#[instrument(skip(state, body), fields(admin_id = admin.0.id))]
pub async fn update_category_type(
    State(state): State<CatalogState>,
    admin: AdminUser,
    Path(type_id): Path<String>,
    ValidatedJson(body): ValidatedJson<CategoryTypeRequest>,
) -> Reply<CategoryType> {
    let id = parse_id(&type_id)?;
    let row = state.category_types.update(id, &body.name).await?;
    Ok(rest::ok(row))
}

#[instrument(skip(state), fields(admin_id = admin.0.id))]
pub async fn delete_category_type(
    State(state): State<CatalogState>,
    admin: AdminUser,
    Path(type_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.category_types.delete(parse_id(&type_id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_categories_by_type(
    State(state): State<CatalogState>,
    Path(type_id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Reply<Vec<Category>> {
    let id = parse_id(&type_id)?;
    let rows = state.categories.list_by_type(id, page(&state, query)?).await?;
    Ok(rest::ok(rows))
}

#[instrument(skip(state))]
pub async fn list_subcategories_by_type(
    State(state): State<CatalogState>,
    Path(type_id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Reply<Vec<Subcategory>> {
    let id = parse_id(&type_id)?;
    let rows = state
        .subcategories
        .list_by_type(id, page(&state, query)?)
        .await?;
    Ok(rest::ok(rows))
}

// --- categories ---

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<CatalogState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Reply<Vec<Category>> {
    let rows = state.categories.list(page(&state, query)?).await?;
    Ok(rest::ok(rows))
}

#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<CatalogState>,
    Path(category_id): Path<String>,
) -> Reply<Category> {
    let row = state.categories.get(parse_id(&category_id)?).await?;
    Ok(rest::ok(row))
}

#[instrument(skip(state, body), fields(admin_id = admin.0.id))]
pub async fn create_category(
    State(state): State<CatalogState>,
    admin: AdminUser,
    ValidatedJson(body): ValidatedJson<CreateCategoryRequest>,
) -> Created<Category> {
    let row = state.categories.create(body.into()).await?;
    Ok(rest::created(row))
}

#[instrument(skip(state, body), fields(admin_id = admin.0.id))]
pub async fn update_category(
    State(state): State<CatalogState>,
    admin: AdminUser,
    Path(category_id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateCategoryRequest>,
) -> Reply<Category> {
    let id = parse_id(&category_id)?;
    let row = state.categories.update(id, body.into()).await?;
    Ok(rest::ok(row))
}

#[instrument(skip(state), fields(admin_id = admin.0.id))]
pub async fn delete_category(
    State(state): State<CatalogState>,
    admin: AdminUser,
    Path(category_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.categories.delete(parse_id(&category_id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_subcategories_by_category(
    State(state): State<CatalogState>,
    Path(category_id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Reply<Vec<Subcategory>> {
    let id = parse_id(&category_id)?;
    let rows = state
        .subcategories
        .list_by_category(id, page(&state, query)?)
        .await?;
    Ok(rest::ok(rows))
}

// --- subcategories ---

#[instrument(skip(state))]
pub async fn list_subcategories(
    State(state): State<CatalogState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Reply<Vec<Subcategory>> {
    let rows = state.subcategories.list(page(&state, query)?).await?;
    Ok(rest::ok(rows))
}

#[instrument(skip(state))]
pub async fn get_subcategory(
    State(state): State<CatalogState>,
    Path(subcategory_id): Path<String>,
) -> Reply<Subcategory> {
    let row = state.subcategories.get(parse_id(&subcategory_id)?).await?;
    Ok(rest::ok(row))
}

#[instrument(skip(state, body), fields(admin_id = admin.0.id))]
pub async fn create_subcategory(
    State(state): State<CatalogState>,
    admin: AdminUser,
    ValidatedJson(body): ValidatedJson<CreateSubcategoryRequest>,
) -> Created<Subcategory> {
    let row = state.subcategories.create(body.into()).await?;
    Ok(rest::created(row))
}

#[instrument(skip(state, body), fields(admin_id = admin.0.id))]
pub async fn update_subcategory(
    State(state): State<CatalogState>,
    admin: AdminUser,
    Path(subcategory_id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateSubcategoryRequest>,
) -> Reply<Subcategory> {
    let id = parse_id(&subcategory_id)?;
    let row = state.subcategories.update(id, body.into()).await?;
    Ok(rest::ok(row))
}

#[instrument(skip(state), fields(admin_id = admin.0.id))]
pub async fn delete_subcategory(
    State(state): State<CatalogState>,
    admin: AdminUser,
    Path(subcategory_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .subcategories
        .delete(parse_id(&subcategory_id)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
