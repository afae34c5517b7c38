use sqlx::SqlitePool;
use uuid::Uuid;

/// 分类token的解析结果 / Resolved category constraint
///
/// NotFound 必须让整个查询短路：直接返回空结果，不再触碰 listings 表。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    /// 未指定分类，不加约束
    None,
    /// 按内部分类id过滤
    Id(String),
    /// 分类不存在
    NotFound,
}

/// 解析用户提供的分类token（内部id或显示名）
///
/// token符合内部id格式时直接作为过滤条件使用；否则按显示名做
/// 不区分大小写的精确查找。只读，无副作用。
pub async fn resolve(pool: &SqlitePool, token: &str) -> Result<CategoryFilter, sqlx::Error> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(CategoryFilter::None);
    }

    if Uuid::parse_str(token).is_ok() {
        return Ok(CategoryFilter::Id(token.to_string()));
    }

    let matched: Option<(String,)> =
        sqlx::query_as("SELECT id FROM categories WHERE LOWER(name) = LOWER(?)")
            .bind(token)
            .fetch_optional(pool)
            .await?;

    Ok(match matched {
        Some((id,)) => CategoryFilter::Id(id),
        None => CategoryFilter::NotFound,
    })
}
