use unicode_normalization::UnicodeNormalization;

/// 產生與 Mealie 相同規則的 slug：NFKD 正規化後去掉非 ASCII 部分，
/// 再轉小寫並以單一連字號分隔
pub fn slugify(text: &str) -> String {
    let folded: String = text.nfkd().filter(char::is_ascii).collect();

    let mut slug = String::with_capacity(folded.len());
    let mut last_was_hyphen = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if (c.is_ascii_whitespace() || c == '-' || c == '_')
            && !slug.is_empty()
            && !last_was_hyphen
        {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
