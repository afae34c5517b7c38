use sqlx::SqlitePool;

use crate::models::{CategorySummary, ListingItem, PageMeta, Photo, SearchEnvelope, SellerSummary};

use super::category::{self, CategoryFilter};
use super::filter::{compile, BindValue, CompiledFilter};
use super::params::SearchParams;

/// 连表查询的列集合
const LISTING_COLUMNS: &str = "l.id, l.listing_id, l.user_id, l.category_id, l.title, l.description, \
     l.price, l.status, l.photos, l.created_at, l.updated_at, \
     c.name AS category_name, u.name AS seller_name, u.email AS seller_email";

/// 连表后的商品行 / Joined listing row straight from the store
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRecord {
    pub id: String,
    pub listing_id: String,
    pub user_id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub status: String,
    pub photos: String,
    pub created_at: String,
    pub updated_at: String,
    pub category_name: String,
    pub seller_name: String,
    pub seller_email: String,
}

impl ListingRecord {
    /// 转为响应条目，photos解析失败时退化为空列表
    pub fn into_item(self) -> ListingItem {
        let photos: Vec<Photo> = serde_json::from_str(&self.photos).unwrap_or_default();
        ListingItem {
            id: self.id,
            listing_id: self.listing_id,
            title: self.title,
            description: self.description,
            price: self.price,
            status: self.status,
            photos,
            category: CategorySummary {
                id: self.category_id,
                name: self.category_name,
            },
            seller: SellerSummary {
                id: self.user_id,
                name: self.seller_name,
                email: self.seller_email,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// 执行一次完整搜索 / Run the whole pipeline
///
/// 分类解析必须先于主查询完成：NotFound直接短路返回空结果，
/// 不再触碰 listings 表。
pub async fn run_search(
    pool: &SqlitePool,
    params: &SearchParams,
) -> Result<SearchEnvelope, sqlx::Error> {
    let resolved = category::resolve(pool, &params.category).await?;
    let category_id = match resolved {
        CategoryFilter::NotFound => return Ok(empty_envelope(params)),
        CategoryFilter::Id(id) => Some(id),
        CategoryFilter::None => None,
    };

    let filter = compile(params, category_id.as_deref());

    // 取数与计数没有数据依赖，并发执行；任一失败则整个请求失败
    let (records, total) = tokio::try_join!(
        fetch_page(pool, &filter, params),
        count_matching(pool, &filter)
    )?;

    Ok(SearchEnvelope {
        items: records.into_iter().map(ListingRecord::into_item).collect(),
        page: PageMeta {
            current: params.page,
            page_size: params.page_size,
            total,
            total_pages: params.total_pages(total),
        },
    })
}

/// 按内部id取单个商品（已售商品详情页仍可访问）
pub async fn fetch_listing(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<ListingItem>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM listings l \
         JOIN categories c ON c.id = l.category_id \
         JOIN users u ON u.id = l.user_id \
         WHERE l.id = ?",
        LISTING_COLUMNS
    );
    let record = sqlx::query_as::<_, ListingRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(record.map(ListingRecord::into_item))
}

/// 零结果的响应骨架
fn empty_envelope(params: &SearchParams) -> SearchEnvelope {
    SearchEnvelope {
        items: Vec::new(),
        page: PageMeta {
            current: params.page,
            page_size: params.page_size,
            total: 0,
            total_pages: 0,
        },
    }
}

/// 按过滤条件取一页数据
async fn fetch_page(
    pool: &SqlitePool,
    filter: &CompiledFilter,
    params: &SearchParams,
) -> Result<Vec<ListingRecord>, sqlx::Error> {
    let (field, direction) = params.sort.order();
    // id升序兜底，时间戳或价格相同时分页顺序保持稳定
    let sql = format!(
        "SELECT {} FROM listings l \
         JOIN categories c ON c.id = l.category_id \
         JOIN users u ON u.id = l.user_id \
         WHERE {} ORDER BY l.{} {}, l.id ASC LIMIT ? OFFSET ?",
        LISTING_COLUMNS,
        filter.where_sql(),
        field,
        direction
    );

    let mut query = sqlx::query_as::<_, ListingRecord>(&sql);
    for bind in &filter.binds {
        query = match bind {
            BindValue::Text(v) => query.bind(v.clone()),
            BindValue::Real(v) => query.bind(*v),
        };
    }
    query
        .bind(params.page_size)
        .bind(params.offset())
        .fetch_all(pool)
        .await
}

/// 相同过滤条件下的总命中数（不带分页）
async fn count_matching(pool: &SqlitePool, filter: &CompiledFilter) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM listings WHERE {}", filter.where_sql());
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for bind in &filter.binds {
        query = match bind {
            BindValue::Text(v) => query.bind(v.clone()),
            BindValue::Real(v) => query.bind(*v),
        };
    }
    query.fetch_one(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::db;
    use crate::utils::{build_search_text, generate_listing_code};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashMap;
    use uuid::Uuid;

    async fn setup_pool() -> SqlitePool {
        // 内存库限制单连接，所有查询落在同一个库上
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    fn params(pairs: &[(&str, &str)]) -> SearchParams {
        let raw: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SearchParams::from_query(&raw, &SearchConfig::default())
    }

    async fn seed_user(pool: &SqlitePool, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let now = "2024-03-01T08:00:00+00:00";
        sqlx::query("INSERT INTO users (id, name, email, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(format!("{}@campus.edu", id))
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    async fn seed_category(pool: &SqlitePool, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let now = "2024-03-01T08:00:00+00:00";
        sqlx::query("INSERT INTO categories (id, name, description, created_at, updated_at) VALUES (?, ?, NULL, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    async fn seed_listing(
        pool: &SqlitePool,
        user_id: &str,
        category_id: &str,
        title: &str,
        price: f64,
        status: &str,
        created_at: &str,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let description = format!("{} 的详细描述", title);
        sqlx::query(
            "INSERT INTO listings (id, listing_id, user_id, category_id, title, description, price, status, photos, search_text, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?, ?)",
        )
        .bind(&id)
        .bind(generate_listing_code())
        .bind(user_id)
        .bind(category_id)
        .bind(title)
        .bind(&description)
        .bind(price)
        .bind(status)
        .bind(build_search_text(title, &description))
        .bind(created_at)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    const PRICES: [f64; 12] = [
        25.0, 35.0, 45.0, 75.0, 80.0, 120.0, 150.0, 200.0, 300.0, 400.0, 600.0, 1200.0,
    ];

    /// 12个在售商品轮流落在3个分类，创建时间随序号递增
    async fn seed_marketplace(pool: &SqlitePool) -> (String, String, String) {
        let seller = seed_user(pool, "seller").await;
        let books = seed_category(pool, "Books").await;
        let electronics = seed_category(pool, "Electronics").await;
        let furniture = seed_category(pool, "Furniture").await;
        for (i, price) in PRICES.iter().enumerate() {
            let category = match i % 3 {
                0 => &books,
                1 => &electronics,
                _ => &furniture,
            };
            let created = format!("2024-03-{:02}T10:00:00+00:00", i + 1);
            seed_listing(
                pool,
                &seller,
                category,
                &format!("item-{:02}", i),
                *price,
                "ACTIVE",
                &created,
            )
            .await;
        }
        (books, electronics, furniture)
    }

    #[tokio::test]
    async fn test_price_sort_and_pagination() {
        let pool = setup_pool().await;
        seed_marketplace(&pool).await;

        let first = run_search(
            &pool,
            &params(&[("page", "1"), ("pageSize", "6"), ("sort", "price_asc")]),
        )
        .await
        .unwrap();
        let prices: Vec<f64> = first.items.iter().map(|i| i.price).collect();
        assert_eq!(prices, vec![25.0, 35.0, 45.0, 75.0, 80.0, 120.0]);
        assert_eq!(first.page.current, 1);
        assert_eq!(first.page.page_size, 6);
        assert_eq!(first.page.total, 12);
        assert_eq!(first.page.total_pages, 2);

        let second = run_search(
            &pool,
            &params(&[("page", "2"), ("pageSize", "6"), ("sort", "price_asc")]),
        )
        .await
        .unwrap();
        let prices: Vec<f64> = second.items.iter().map(|i| i.price).collect();
        assert_eq!(prices, vec![150.0, 200.0, 300.0, 400.0, 600.0, 1200.0]);

        // 相邻项单调不减
        for pair in first.items.windows(2) {
            assert!(pair[0].price <= pair[1].price);
        }
    }

    #[tokio::test]
    async fn test_empty_params_return_all_active() {
        let pool = setup_pool().await;
        seed_marketplace(&pool).await;

        let envelope = run_search(&pool, &params(&[])).await.unwrap();
        assert_eq!(envelope.items.len(), 12);
        assert_eq!(envelope.page.total, 12);
        assert_eq!(envelope.page.total_pages, 1);
        assert_eq!(envelope.page.page_size, 20);
    }

    #[tokio::test]
    async fn test_only_active_listings_returned() {
        let pool = setup_pool().await;
        let seller = seed_user(&pool, "seller").await;
        let books = seed_category(&pool, "Books").await;
        seed_listing(&pool, &seller, &books, "高等数学教材", 20.0, "ACTIVE", "2024-03-01T10:00:00+00:00").await;
        seed_listing(&pool, &seller, &books, "线性代数教材", 25.0, "SOLD", "2024-03-02T10:00:00+00:00").await;

        let envelope = run_search(&pool, &params(&[])).await.unwrap();
        assert_eq!(envelope.items.len(), 1);
        assert!(envelope.items.iter().all(|i| i.status == "ACTIVE"));
        assert_eq!(envelope.page.total, 1);
    }

    #[tokio::test]
    async fn test_price_bounds_inclusive_and_independent() {
        let pool = setup_pool().await;
        seed_marketplace(&pool).await;

        // 两边都设：闭区间
        let envelope = run_search(&pool, &params(&[("minPrice", "25"), ("maxPrice", "45")]))
            .await
            .unwrap();
        let mut prices: Vec<f64> = envelope.items.iter().map(|i| i.price).collect();
        prices.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(prices, vec![25.0, 35.0, 45.0]);

        // 只设下界
        let envelope = run_search(&pool, &params(&[("minPrice", "600")])).await.unwrap();
        assert_eq!(envelope.page.total, 2);

        // 只设上界
        let envelope = run_search(&pool, &params(&[("maxPrice", "35")])).await.unwrap();
        assert_eq!(envelope.page.total, 2);

        // 畸形下界只丢掉那一边
        let envelope = run_search(&pool, &params(&[("minPrice", "abc"), ("maxPrice", "35")]))
            .await
            .unwrap();
        assert_eq!(envelope.page.total, 2);
    }

    #[tokio::test]
    async fn test_category_name_case_insensitive() {
        let pool = setup_pool().await;
        seed_marketplace(&pool).await;

        let lower = run_search(&pool, &params(&[("category", "books")])).await.unwrap();
        let upper = run_search(&pool, &params(&[("category", "Books")])).await.unwrap();

        let lower_ids: Vec<&str> = lower.items.iter().map(|i| i.id.as_str()).collect();
        let upper_ids: Vec<&str> = upper.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(lower_ids, upper_ids);
        assert_eq!(lower.page.total, 4);
        assert!(lower.items.iter().all(|i| i.category.name == "Books"));
    }

    #[tokio::test]
    async fn test_category_token_accepts_internal_id() {
        let pool = setup_pool().await;
        let (books, _, _) = seed_marketplace(&pool).await;

        let by_id = run_search(&pool, &params(&[("category", &books)])).await.unwrap();
        let by_name = run_search(&pool, &params(&[("category", "Books")])).await.unwrap();

        let id_set: Vec<&str> = by_id.items.iter().map(|i| i.id.as_str()).collect();
        let name_set: Vec<&str> = by_name.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(id_set, name_set);
    }

    #[tokio::test]
    async fn test_unknown_category_short_circuits() {
        let pool = setup_pool().await;
        seed_marketplace(&pool).await;

        // 删掉listings表：若短路失效，查询会报错而不是返回空结果
        sqlx::query("DROP TABLE listings").execute(&pool).await.unwrap();

        let envelope = run_search(&pool, &params(&[("category", "NotARealCategory")]))
            .await
            .unwrap();
        assert!(envelope.items.is_empty());
        assert_eq!(envelope.page.total, 0);
        assert_eq!(envelope.page.total_pages, 0);
    }

    #[tokio::test]
    async fn test_category_with_price_window() {
        let pool = setup_pool().await;
        seed_marketplace(&pool).await;

        // Books 分类的价格是 25/75/150/400
        let envelope = run_search(
            &pool,
            &params(&[("category", "Books"), ("minPrice", "50"), ("maxPrice", "150")]),
        )
        .await
        .unwrap();

        let mut prices: Vec<f64> = envelope.items.iter().map(|i| i.price).collect();
        prices.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(prices, vec![75.0, 150.0]);
        assert!(envelope.items.iter().all(|i| i.category.name == "Books"));
    }

    #[tokio::test]
    async fn test_text_filter_substring_case_insensitive() {
        let pool = setup_pool().await;
        let seller = seed_user(&pool, "seller").await;
        let cat = seed_category(&pool, "Electronics").await;
        seed_listing(&pool, &seller, &cat, "MacBook Pro 2021", 5200.0, "ACTIVE", "2024-03-01T10:00:00+00:00").await;
        seed_listing(&pool, &seller, &cat, "iPad mini 6", 1800.0, "ACTIVE", "2024-03-02T10:00:00+00:00").await;

        // 子串即可命中，大小写不敏感
        let envelope = run_search(&pool, &params(&[("q", "Mac")])).await.unwrap();
        assert_eq!(envelope.items.len(), 1);
        assert_eq!(envelope.items[0].title, "MacBook Pro 2021");

        let envelope = run_search(&pool, &params(&[("q", "MACBOOK")])).await.unwrap();
        assert_eq!(envelope.items.len(), 1);

        // 无匹配词 -> 空结果但正常返回
        let envelope = run_search(&pool, &params(&[("q", "Thinkpad")])).await.unwrap();
        assert!(envelope.items.is_empty());
        assert_eq!(envelope.page.total, 0);
    }

    #[tokio::test]
    async fn test_like_wildcards_match_literally() {
        let pool = setup_pool().await;
        let seller = seed_user(&pool, "seller").await;
        let cat = seed_category(&pool, "Other").await;
        seed_listing(&pool, &seller, &cat, "Poster 50%_off", 10.0, "ACTIVE", "2024-03-01T10:00:00+00:00").await;
        seed_listing(&pool, &seller, &cat, "Poster 500 off", 10.0, "ACTIVE", "2024-03-02T10:00:00+00:00").await;

        // 未转义时 "%"/"_" 会当通配符把第二条也带进来
        let envelope = run_search(&pool, &params(&[("q", "50%_off")])).await.unwrap();
        assert_eq!(envelope.items.len(), 1);
        assert_eq!(envelope.items[0].title, "Poster 50%_off");

        let envelope = run_search(&pool, &params(&[("q", "_")])).await.unwrap();
        assert_eq!(envelope.items.len(), 1);
    }

    #[tokio::test]
    async fn test_page_beyond_range_keeps_true_totals() {
        let pool = setup_pool().await;
        seed_marketplace(&pool).await;

        let envelope = run_search(&pool, &params(&[("page", "5"), ("pageSize", "6")]))
            .await
            .unwrap();
        // 不做服务端页码钳制，越界页返回空条目但保留真实总数
        assert!(envelope.items.is_empty());
        assert_eq!(envelope.page.current, 5);
        assert_eq!(envelope.page.total, 12);
        assert_eq!(envelope.page.total_pages, 2);
    }

    #[tokio::test]
    async fn test_equal_price_pagination_is_deterministic() {
        let pool = setup_pool().await;
        let seller = seed_user(&pool, "seller").await;
        let cat = seed_category(&pool, "Books").await;
        let mut seeded = vec![
            seed_listing(&pool, &seller, &cat, "同价商品A", 50.0, "ACTIVE", "2024-03-01T10:00:00+00:00").await,
            seed_listing(&pool, &seller, &cat, "同价商品B", 50.0, "ACTIVE", "2024-03-01T10:00:00+00:00").await,
            seed_listing(&pool, &seller, &cat, "同价商品C", 50.0, "ACTIVE", "2024-03-01T10:00:00+00:00").await,
        ];
        seeded.sort();

        let first = run_search(&pool, &params(&[("sort", "price_asc"), ("pageSize", "2"), ("page", "1")]))
            .await
            .unwrap();
        let second = run_search(&pool, &params(&[("sort", "price_asc"), ("pageSize", "2"), ("page", "2")]))
            .await
            .unwrap();

        // 价格全部相同，id升序兜底：两页拼起来恰好是全部3条，无重复无遗漏
        let mut paged: Vec<String> = first
            .items
            .iter()
            .chain(second.items.iter())
            .map(|i| i.id.clone())
            .collect();
        assert_eq!(paged.len(), 3);
        let ordered = paged.clone();
        paged.sort();
        assert_eq!(paged, seeded);
        assert_eq!(ordered, paged);

        // 重复同一请求得到同样的第一页
        let again = run_search(&pool, &params(&[("sort", "price_asc"), ("pageSize", "2"), ("page", "1")]))
            .await
            .unwrap();
        let a: Vec<&str> = first.items.iter().map(|i| i.id.as_str()).collect();
        let b: Vec<&str> = again.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_created_at_sort_directions() {
        let pool = setup_pool().await;
        seed_marketplace(&pool).await;

        // 默认：最新发布在前
        let envelope = run_search(&pool, &params(&[])).await.unwrap();
        assert_eq!(envelope.items[0].title, "item-11");

        let envelope = run_search(&pool, &params(&[("sort", "createdAt_asc")])).await.unwrap();
        assert_eq!(envelope.items[0].title, "item-00");

        // 未知排序键回退默认
        let envelope = run_search(&pool, &params(&[("sort", "bogus")])).await.unwrap();
        assert_eq!(envelope.items[0].title, "item-11");
    }

    #[tokio::test]
    async fn test_repeat_request_yields_identical_envelope() {
        let pool = setup_pool().await;
        seed_marketplace(&pool).await;

        let p = params(&[("q", "item"), ("sort", "price_desc"), ("pageSize", "5")]);
        let first = run_search(&pool, &p).await.unwrap();
        let second = run_search(&pool, &p).await.unwrap();

        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_fetch_listing_detail() {
        let pool = setup_pool().await;
        let seller = seed_user(&pool, "卖家甲").await;
        let cat = seed_category(&pool, "Books").await;
        let id = seed_listing(&pool, &seller, &cat, "考研英语真题", 30.0, "SOLD", "2024-03-01T10:00:00+00:00").await;

        // 已售商品详情页仍可访问，且带上分类与卖家摘要
        let item = fetch_listing(&pool, &id).await.unwrap().unwrap();
        assert_eq!(item.status, "SOLD");
        assert_eq!(item.category.name, "Books");
        assert_eq!(item.seller.name, "卖家甲");
        assert!(item.seller.email.ends_with("@campus.edu"));

        let missing = fetch_listing(&pool, &Uuid::new_v4().to_string()).await.unwrap();
        assert!(missing.is_none());
    }
}
