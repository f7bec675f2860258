//! URLスラッグの生成と検証
//!
//! スラッグは英小文字・数字・ハイフンのみで構成し、先頭と末尾にハイフンを置かない。

/// スラッグの最大長
pub const MAX_SLUG_LEN: usize = 120;

/// スラッグとして有効か
pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SLUG_LEN
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

/// タイトルからスラッグを生成する
///
/// 英数字以外は区切りとみなしてハイフン1つにまとめる。ASCII以外の文字は落とすため、
/// 結果が空文字列になることがある。
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_ascii() {
            pending_hyphen = true;
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}
