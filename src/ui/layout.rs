//! ページ全体の骨組み（公開サイト・管理画面）

use serde::Serialize;
use tera::Context;

use crate::auth::AdminUser;
use crate::class_names;
use crate::redirect::is_within;

use super::styles::NAV;

/// スタイルシートのパス
pub const STYLESHEET_PATH: &str = "/assets/site.css";

const PUBLIC_NAV: &[(&str, &str)] = &[
    ("/", "Home"),
    ("/services", "Services"),
    ("/testimonials", "Testimonials"),
    ("/blog", "Blog"),
];

const ADMIN_NAV: &[(&str, &str)] = &[
    ("/admin", "Dashboard"),
    ("/admin/blog", "Blog"),
    ("/admin/services", "Services"),
    ("/admin/testimonials", "Testimonials"),
];

/// 1ページ分の見出し情報
#[derive(Debug, Clone, Serialize)]
pub struct Page<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    /// ナビゲーションの現在位置の判定に使う
    #[serde(skip)]
    pub current_path: &'a str,
    /// 正規URL（公開ページのみ）
    pub canonical_url: Option<String>,
}

impl<'a> Page<'a> {
    pub fn new(title: &'a str, current_path: &'a str) -> Self {
        Self { title, description: None, current_path, canonical_url: None }
    }

    pub fn with_description(mut self, description: &'a str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_canonical(mut self, url: String) -> Self {
        self.canonical_url = Some(url);
        self
    }
}

/// ナビゲーションの1項目
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NavLink {
    pub href: &'static str,
    pub label: &'static str,
    pub class: String,
    pub active: bool,
}

/// ナビゲーションのリンクが現在のページを指すか
fn is_active(href: &str, current: &str, exact_root: &str) -> bool {
    if href == exact_root {
        current == href
    } else {
        is_within(current, href)
    }
}

fn nav(links: &[(&'static str, &'static str)], current: &str, exact_root: &str) -> Vec<NavLink> {
    links
        .iter()
        .map(|&(href, label)| {
            let active = is_active(href, current, exact_root);
            NavLink {
                href,
                label,
                class: class_names!(NAV.link, active.then_some(NAV.active)),
                active,
            }
        })
        .collect()
}

fn base_context(site_name: &str, page: &Page<'_>, links: Vec<NavLink>) -> Context {
    let mut context = Context::new();
    context.insert("site_name", site_name);
    context.insert("page", page);
    context.insert("nav", &links);
    context
}

/// 公開サイトのレイアウトに渡す値
pub fn public_context(site_name: &str, page: &Page<'_>) -> Context {
    base_context(site_name, page, nav(PUBLIC_NAV, page.current_path, "/"))
}

/// 管理画面のレイアウトに渡す値（ログイン中の管理者を含む）
pub fn admin_context(site_name: &str, page: &Page<'_>, user: &AdminUser) -> Context {
    let mut context = base_context(site_name, page, nav(ADMIN_NAV, page.current_path, "/admin"));
    context.insert("admin_email", &user.email);
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_labels(links: &[NavLink]) -> Vec<&str> {
        links.iter().filter(|l| l.active).map(|l| l.label).collect()
    }

    #[test]
    fn test_public_nav_marks_section() {
        let links = nav(PUBLIC_NAV, "/blog/first-visit", "/");
        assert_eq!(active_labels(&links), vec!["Blog"]);
        assert_eq!(links[3].class, "nav-link nav-link--active");
        // ホームはトップページでのみアクティブ
        assert_eq!(links[0].class, "nav-link");
        assert_eq!(active_labels(&nav(PUBLIC_NAV, "/", "/")), vec!["Home"]);
        assert!(active_labels(&nav(PUBLIC_NAV, "/blogroll", "/")).is_empty());
    }

    #[test]
    fn test_admin_nav_marks_section() {
        assert_eq!(active_labels(&nav(ADMIN_NAV, "/admin/services/3", "/admin")), vec!["Services"]);
        assert_eq!(active_labels(&nav(ADMIN_NAV, "/admin", "/admin")), vec!["Dashboard"]);
    }

    #[test]
    fn test_contexts() {
        let page = Page::new("Blog", "/blog").with_description("Tips & news");
        let context = public_context("Bright Smile", &page).into_json();
        assert_eq!(context["site_name"], "Bright Smile");
        assert_eq!(context["page"]["description"], "Tips & news");
        assert!(context["page"].get("current_path").is_none());
        assert!(context.get("admin_email").is_none());

        let user = AdminUser { id: "u".into(), email: "dr@example.com".into() };
        let context = admin_context("S", &Page::new("Services", "/admin/services"), &user).into_json();
        assert_eq!(context["admin_email"], "dr@example.com");
        assert_eq!(context["nav"][2]["active"], true);
    }
}
