use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use chrono::Utc;

use market_backend::config;
use market_backend::models::{
    validate_description, validate_price, validate_title, CreateListingRequest, ListingItem,
    ListingStatus, SearchEnvelope, UpdateListingRequest,
};
use market_backend::search::{self, SearchParams};
use market_backend::utils::{build_search_text, generate_listing_code};

use crate::state::AppState;

/// 统一的存储错误响应
fn store_error(e: sqlx::Error) -> (StatusCode, Json<Value>) {
    tracing::error!("数据库操作失败: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "服务器错误"})),
    )
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message})))
}

fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": "商品不存在"})))
}

/// 从 X-User-Id 头取当前用户，会话签发由上游认证服务负责
async fn require_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<String, (StatusCode, Json<Value>)> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, Json(json!({"error": "未登录"}))))?;

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(store_error)?;

    if exists.is_none() {
        return Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "用户不存在"}))));
    }
    Ok(user_id)
}

/// GET /listings/search - 商品搜索
///
/// 畸形参数一律退化为默认值，不会因为参数形状报错；
/// 零命中（包括分类不存在）是正常的空结果，不是错误。
pub async fn search_listings(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<SearchEnvelope>, (StatusCode, Json<Value>)> {
    let cfg = config::config();
    let params = SearchParams::from_query(&raw, &cfg.search);

    let envelope = search::run_search(&state.db, &params)
        .await
        .map_err(store_error)?;

    Ok(Json(envelope))
}

/// GET /listings/:id - 商品详情（已售商品仍可访问）
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ListingItem>, (StatusCode, Json<Value>)> {
    let item = search::fetch_listing(&state.db, &id)
        .await
        .map_err(store_error)?;

    match item {
        Some(item) => Ok(Json(item)),
        None => Err(not_found()),
    }
}

/// POST /listings - 发布商品
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateListingRequest>,
) -> Result<Json<ListingItem>, (StatusCode, Json<Value>)> {
    let user_id = require_user(&state, &headers).await?;

    let title = validate_title(&req.title).map_err(|e| bad_request(&e))?;
    let description = validate_description(&req.description).map_err(|e| bad_request(&e))?;
    let price = validate_price(req.price).map_err(|e| bad_request(&e))?;

    let category: Option<(String,)> = sqlx::query_as("SELECT id FROM categories WHERE id = ?")
        .bind(&req.category_id)
        .fetch_optional(&state.db)
        .await
        .map_err(store_error)?;
    if category.is_none() {
        return Err(bad_request("分类不存在"));
    }

    let id = Uuid::new_v4().to_string();
    let listing_code = generate_listing_code();
    let now = Utc::now().to_rfc3339();
    let photos = serde_json::to_string(&req.photos).unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        "INSERT INTO listings (id, listing_id, user_id, category_id, title, description, price, status, photos, search_text, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&listing_code)
    .bind(&user_id)
    .bind(&req.category_id)
    .bind(&title)
    .bind(&description)
    .bind(price)
    .bind(ListingStatus::Active.as_str())
    .bind(&photos)
    .bind(build_search_text(&title, &description))
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(store_error)?;

    tracing::info!("Listing created: {} ({}) by {}", title, listing_code, user_id);

    let item = search::fetch_listing(&state.db, &id)
        .await
        .map_err(store_error)?;
    item.map(Json).ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "服务器错误"})),
        )
    })
}

/// 写路径校验用的商品行
#[derive(Debug, sqlx::FromRow)]
struct ListingOwnerRow {
    user_id: String,
    title: String,
    description: String,
    price: f64,
    category_id: String,
}

/// POST /listings/:id - 修改商品（仅限卖家本人）
///
/// 标题/描述/价格改动后重算 search_text，时间戳由服务端维护。
pub async fn update_listing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateListingRequest>,
) -> Result<Json<ListingItem>, (StatusCode, Json<Value>)> {
    let user_id = require_user(&state, &headers).await?;

    let existing: Option<ListingOwnerRow> = sqlx::query_as(
        "SELECT user_id, title, description, price, category_id FROM listings WHERE id = ?",
    )
    .bind(&id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?;

    let existing = existing.ok_or_else(not_found)?;
    if existing.user_id != user_id {
        return Err((StatusCode::FORBIDDEN, Json(json!({"error": "无权限操作"}))));
    }

    let title = match &req.title {
        Some(raw) => validate_title(raw).map_err(|e| bad_request(&e))?,
        None => existing.title,
    };
    let description = match &req.description {
        Some(raw) => validate_description(raw).map_err(|e| bad_request(&e))?,
        None => existing.description,
    };
    let price = match req.price {
        Some(p) => validate_price(p).map_err(|e| bad_request(&e))?,
        None => existing.price,
    };
    let category_id = match &req.category_id {
        Some(cid) => {
            let category: Option<(String,)> =
                sqlx::query_as("SELECT id FROM categories WHERE id = ?")
                    .bind(cid)
                    .fetch_optional(&state.db)
                    .await
                    .map_err(store_error)?;
            if category.is_none() {
                return Err(bad_request("分类不存在"));
            }
            cid.clone()
        }
        None => existing.category_id,
    };

    let now = Utc::now().to_rfc3339();

    if let Some(photos) = &req.photos {
        let photos = serde_json::to_string(photos).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            "UPDATE listings SET title = ?, description = ?, price = ?, category_id = ?, photos = ?, search_text = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&title)
        .bind(&description)
        .bind(price)
        .bind(&category_id)
        .bind(&photos)
        .bind(build_search_text(&title, &description))
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await
        .map_err(store_error)?;
    } else {
        sqlx::query(
            "UPDATE listings SET title = ?, description = ?, price = ?, category_id = ?, search_text = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&title)
        .bind(&description)
        .bind(price)
        .bind(&category_id)
        .bind(build_search_text(&title, &description))
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await
        .map_err(store_error)?;
    }

    let item = search::fetch_listing(&state.db, &id)
        .await
        .map_err(store_error)?;
    item.map(Json).ok_or_else(not_found)
}

/// POST /listings/:id/sold - 标记已售（仅限卖家本人，幂等）
///
/// 下架后详情页保留；重新上架属于管理端操作，这里不提供。
pub async fn mark_sold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let user_id = require_user(&state, &headers).await?;

    let owner: Option<(String,)> = sqlx::query_as("SELECT user_id FROM listings WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await
        .map_err(store_error)?;

    let owner = owner.ok_or_else(not_found)?;
    if owner.0 != user_id {
        return Err((StatusCode::FORBIDDEN, Json(json!({"error": "无权限操作"}))));
    }

    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE listings SET status = ?, updated_at = ? WHERE id = ?")
        .bind(ListingStatus::Sold.as_str())
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await
        .map_err(store_error)?;

    tracing::info!("Listing {} marked as sold by {}", id, user_id);

    Ok(Json(json!({
        "success": true,
        "status": ListingStatus::Sold.as_str(),
    })))
}
