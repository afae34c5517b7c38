use sqlx::SqlitePool;

/// 全局应用状态 / Shared application state
///
/// 搜索引擎本身无状态，连接池是唯一跨请求共享的资源。
pub struct AppState {
    pub db: SqlitePool,
}
