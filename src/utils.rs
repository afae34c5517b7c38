use rand::Rng;

/// 生成商品展示编号，如 LST-7K2MQ4 / Generate the human-facing listing code
/// 字符集去掉了易混淆的 I/L/O/0/1
pub fn generate_listing_code() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let code: String = (0..6)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();
    format!("LST-{}", code)
}

/// 构建搜索文本：标题+描述拼接后统一转小写
/// 每次插入/更新商品时都要重算，文本过滤依赖这一列
pub fn build_search_text(title: &str, description: &str) -> String {
    format!("{} {}", title, description).to_lowercase()
}
