use serde::{Deserialize, Serialize};

/// 商品状态 / Listing lifecycle status
///
/// 正常流程只允许 ACTIVE -> SOLD，公开搜索只返回 ACTIVE。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    Active,
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Sold => "SOLD",
        }
    }
}

/// 商品图片 / Listing photo
/// 约定第一张为主图，由前端消费，这里不做强制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
    #[serde(default)]
    pub alt: String,
}

/// 分类摘要（列表接口用）/ Category projection for the categories endpoint
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryInfo {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// 商品条目里内嵌的分类摘要
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// 卖家摘要 / Minimal seller projection, never carries sensitive fields
#[derive(Debug, Clone, Serialize)]
pub struct SellerSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

/// 对外返回的商品条目 / Joined listing as returned by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub listing_id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub status: String,
    pub photos: Vec<Photo>,
    pub category: CategorySummary,
    pub seller: SellerSummary,
    pub created_at: String,
    pub updated_at: String,
}

/// 分页信息 / Pagination envelope
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// 搜索响应 / Search response envelope
#[derive(Debug, Clone, Serialize)]
pub struct SearchEnvelope {
    pub items: Vec<ListingItem>,
    pub page: PageMeta,
}

/// 发布商品请求 / Create listing request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category_id: String,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

/// 修改商品请求（字段均可选）/ Partial update request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<String>,
    pub photos: Option<Vec<Photo>>,
}

/// 校验标题：去除首尾空白后按字符数计，需在1-100之间
pub fn validate_title(raw: &str) -> Result<String, String> {
    let title = raw.trim();
    let len = title.chars().count();
    if len == 0 || len > 100 {
        return Err("标题长度需为1-100个字符".to_string());
    }
    Ok(title.to_string())
}

/// 校验描述：去除首尾空白后按字符数计，需在1-1000之间
pub fn validate_description(raw: &str) -> Result<String, String> {
    let description = raw.trim();
    let len = description.chars().count();
    if len == 0 || len > 1000 {
        return Err("描述长度需为1-1000个字符".to_string());
    }
    Ok(description.to_string())
}

/// 校验价格：必须是有限数且不为负
pub fn validate_price(price: f64) -> Result<f64, String> {
    if !price.is_finite() || price < 0.0 {
        return Err("价格无效".to_string());
    }
    Ok(price)
}
