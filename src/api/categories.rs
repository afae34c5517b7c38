use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use market_backend::models::CategoryInfo;

use crate::state::AppState;

/// GET /listings/categories - 分类列表，按名称排序
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryInfo>>, (StatusCode, Json<Value>)> {
    let categories = sqlx::query_as::<_, CategoryInfo>(
        "SELECT id, name, description FROM categories ORDER BY name ASC",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("查询分类失败: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "服务器错误"})),
        )
    })?;

    Ok(Json(categories))
}
