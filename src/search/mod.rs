//! 商品搜索引擎 / Listing search and filtering query engine
//!
//! 流水线：参数规范化 -> 分类解析 -> 过滤编译 -> 排序分页 -> 取数组装。
//! 每次请求无状态，除连接池外不共享任何可变状态，纯读路径。

pub mod category;
pub mod filter;
pub mod params;
pub mod query;

pub use category::CategoryFilter;
pub use params::{SearchParams, SortKey};
pub use query::{fetch_listing, run_search};
