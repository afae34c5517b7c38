use std::collections::HashMap;

use crate::config::SearchConfig;

/// 排序方式 / Sort strategy
/// 未知的排序键一律回退到最新发布优先
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
    PriceAsc,
    PriceDesc,
}

impl SortKey {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "createdAt_asc" => SortKey::CreatedAtAsc,
            "price_asc" => SortKey::PriceAsc,
            "price_desc" => SortKey::PriceDesc,
            // createdAt_desc 以及一切无法识别的值
            _ => SortKey::CreatedAtDesc,
        }
    }

    /// 排序字段与方向 / Field + direction pair
    pub fn order(&self) -> (&'static str, &'static str) {
        match self {
            SortKey::CreatedAtDesc => ("created_at", "DESC"),
            SortKey::CreatedAtAsc => ("created_at", "ASC"),
            SortKey::PriceAsc => ("price", "ASC"),
            SortKey::PriceDesc => ("price", "DESC"),
        }
    }
}

/// 规范化后的搜索参数 / Normalized, defaulted search parameters
///
/// 畸形输入一律退化为默认值或未设置，搜索接口绝不因参数形状报错。
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// 文本关键词，空串表示不过滤
    pub q: String,
    /// 分类token原样透传（id或显示名），由分类解析器消化
    pub category: String,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: SortKey,
    pub page: i64,
    pub page_size: i64,
}

impl SearchParams {
    /// 解析原始查询参数 / Parse raw query-string values
    pub fn from_query(raw: &HashMap<String, String>, cfg: &SearchConfig) -> Self {
        let q = raw.get("q").map(|v| v.trim().to_string()).unwrap_or_default();
        let category = raw.get("category").cloned().unwrap_or_default();
        let sort = raw
            .get("sort")
            .map(|v| SortKey::parse(v.trim()))
            .unwrap_or_default();
        let page = parse_positive_int(raw.get("page")).unwrap_or(1);
        let page_size = parse_positive_int(raw.get("pageSize"))
            .unwrap_or(cfg.default_page_size)
            .min(cfg.max_page_size);

        Self {
            q,
            category,
            min_price: parse_price(raw.get("minPrice")),
            max_price: parse_price(raw.get("maxPrice")),
            sort,
            page,
            page_size,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// 总页数向上取整，0条结果为0页 / ceil(total / page_size), zero matches mean zero pages
    pub fn total_pages(&self, total: i64) -> i64 {
        if total == 0 {
            0
        } else {
            (total + self.page_size - 1) / self.page_size
        }
    }
}

/// 价格上下界只接受显式给出且可解析为有限数的值，其余视为未设置（不是0）
fn parse_price(raw: Option<&String>) -> Option<f64> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// 页码与页大小：非法或缺失返回None，由调用方取默认值
fn parse_positive_int(raw: Option<&String>) -> Option<i64> {
    raw?.trim().parse::<i64>().ok().filter(|n| *n >= 1)
}
