use sqlx::SqlitePool;
use anyhow::Result;
use uuid::Uuid;
use chrono::Utc;

/// Run database migrations / 运行数据库迁移
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // 用户表是上游认证服务的只读投影，这里不存密码等敏感字段
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // search_text 是小写的 标题+描述，写入时维护，文本过滤只查这一列
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS listings (
            id TEXT PRIMARY KEY,
            listing_id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            price REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            photos TEXT NOT NULL DEFAULT '[]',
            search_text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (category_id) REFERENCES categories(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_listings_status ON listings(status)"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_listings_category ON listings(category_id)"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_listings_price ON listings(price)"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_listings_created_at ON listings(created_at)"
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migration completed");

    initialize_default_data(pool).await?;

    Ok(())
}

/// Initialize default data / 初始化默认数据
async fn initialize_default_data(pool: &SqlitePool) -> Result<()> {
    let category_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
        .fetch_one(pool)
        .await?;

    if category_count == 0 {
        tracing::info!("First startup, initializing default categories...");

        let now = Utc::now().to_rfc3339();
        let categories = vec![
            ("教材书籍", "课本、考研资料与课外读物"),
            ("数码电子", "手机、电脑、耳机等电子产品"),
            ("生活家电", "宿舍寝室常用家具家电"),
            ("服饰鞋包", "衣服、鞋子、箱包"),
            ("运动户外", "健身器材与户外装备"),
            ("演出票务", "演出、比赛、展览票券"),
            ("其他", "未分类的闲置物品"),
        ];

        for (name, description) in categories {
            sqlx::query(
                "INSERT INTO categories (id, name, description, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)"
            )
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .bind(description)
            .bind(&now)
            .bind(&now)
            .execute(pool)
            .await?;
        }

        tracing::info!("Default categories created");
    }

    // 账号由上游认证服务同步，首次启动插入两个演示账号方便联调
    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if user_count == 0 {
        let now = Utc::now().to_rfc3339();
        let demo_users = vec![
            ("张伟", "zhangwei@campus.edu"),
            ("李娜", "lina@campus.edu"),
        ];

        for (name, email) in demo_users {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO users (id, name, email, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)"
            )
            .bind(&id)
            .bind(name)
            .bind(email)
            .bind(&now)
            .bind(&now)
            .execute(pool)
            .await?;

            tracing::info!("Demo user created: {} <{}> id={}", name, email, id);
        }
    }

    Ok(())
}
