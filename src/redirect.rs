//! ログイン後のリダイレクト先の検証

/// 管理画面のルートパス。認証後に遷移してよい唯一のプレフィックス
pub const ADMIN_ROOT: &str = "/admin";

/// 要求されたリダイレクト先が `safe_root` 配下ならそのまま、そうでなければ `safe_root` を返す
///
/// 許可されるのは `safe_root` と完全一致するか、`safe_root` の直後が `/` のパスのみ。
/// ホスト付きURLや `/adminx` のような紛らわしいパスはすべて `safe_root` に置き換わる。
pub fn sanitize_redirect(requested: &str, safe_root: &str) -> String {
    if is_within(requested, safe_root) {
        requested.to_string()
    } else {
        safe_root.to_string()
    }
}

/// `path` が `root` そのものか、`root/` 配下か
pub fn is_within(path: &str, root: &str) -> bool {
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// 管理画面向けの省略形
pub fn sanitize_admin_redirect(requested: Option<&str>) -> String {
    sanitize_redirect(requested.unwrap_or_default(), ADMIN_ROOT)
}
