use crate::models::ListingStatus;

use super::params::SearchParams;

/// WHERE子句对应的绑定值，按子句顺序排列
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Real(f64),
}

/// 编译后的过滤条件 / The single composed predicate over the listings table
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub clauses: Vec<String>,
    pub binds: Vec<BindValue>,
}

impl CompiledFilter {
    pub fn where_sql(&self) -> String {
        self.clauses.join(" AND ")
    }
}

/// 组合所有搜索约束 / Compose all constraints into one predicate
///
/// status = 'ACTIVE' 无条件注入且不接受调用方开关，防止通过参数
/// 篡改泄露已售商品。空参数编译为"全部在售商品"，永不失败。
pub fn compile(params: &SearchParams, category_id: Option<&str>) -> CompiledFilter {
    let mut clauses = vec![format!("status = '{}'", ListingStatus::Active.as_str())];
    let mut binds: Vec<BindValue> = Vec::new();

    // 文本匹配：对 search_text（小写的标题+描述）做子串匹配
    let q = params.q.trim();
    if !q.is_empty() {
        clauses.push(r"search_text LIKE ? ESCAPE '\'".to_string());
        binds.push(BindValue::Text(format!(
            "%{}%",
            escape_like(&q.to_lowercase())
        )));
    }

    if let Some(id) = category_id {
        clauses.push("category_id = ?".to_string());
        binds.push(BindValue::Text(id.to_string()));
    }

    // 价格上下界各自独立，均为闭区间
    if let Some(min) = params.min_price {
        clauses.push("price >= ?".to_string());
        binds.push(BindValue::Real(min));
    }
    if let Some(max) = params.max_price {
        clauses.push("price <= ?".to_string());
        binds.push(BindValue::Real(max));
    }

    CompiledFilter { clauses, binds }
}

/// 转义LIKE通配符，用户输入按字面匹配
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
