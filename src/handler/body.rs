/// Content-Typeの主タイプ部分を小文字で取り出す
fn main_type(ct: &str) -> String {
    ct.split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// JSONとして扱うContent-Typeかを判定
pub fn is_json_like_content_type(ct: &str) -> bool {
    let main_type = main_type(ct);
    main_type == "application/json" || main_type.ends_with("+json")
}

/// HTMLフォーム送信（urlencoded）かを判定
pub fn is_form_content_type(ct: &str) -> bool {
    main_type(ct) == "application/x-www-form-urlencoded"
}
