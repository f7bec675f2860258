//! teraテンプレート
//!
//! テンプレートはバイナリに埋め込み、起動時に一度だけパースする。
//! `.html` のテンプレートは出力時に自動でエスケープされる。

use log::debug;
use tera::{Context, Tera};

use crate::auth::AdminUser;
use crate::error::Error;

use super::layout::{admin_context, public_context, Page};

const TEMPLATES: &[(&str, &str)] = &[
    ("layouts/base.html", include_str!("../../templates/layouts/base.html")),
    ("layouts/public.html", include_str!("../../templates/layouts/public.html")),
    ("layouts/admin.html", include_str!("../../templates/layouts/admin.html")),
    ("macros.html", include_str!("../../templates/macros.html")),
    ("public/home.html", include_str!("../../templates/public/home.html")),
    ("public/services.html", include_str!("../../templates/public/services.html")),
    ("public/testimonials.html", include_str!("../../templates/public/testimonials.html")),
    ("public/blog_index.html", include_str!("../../templates/public/blog_index.html")),
    ("public/blog_post.html", include_str!("../../templates/public/blog_post.html")),
    ("public/not_found.html", include_str!("../../templates/public/not_found.html")),
    ("public/login.html", include_str!("../../templates/public/login.html")),
    ("admin/dashboard.html", include_str!("../../templates/admin/dashboard.html")),
    ("admin/editor.html", include_str!("../../templates/admin/editor.html")),
    ("admin/blog_list.html", include_str!("../../templates/admin/blog_list.html")),
    ("admin/service_list.html", include_str!("../../templates/admin/service_list.html")),
    ("admin/testimonial_list.html", include_str!("../../templates/admin/testimonial_list.html")),
    ("sitemap.xml", include_str!("../../templates/sitemap.xml")),
];

/// パース済みのテンプレート一式
pub struct Templates {
    tera: Tera,
    site_name: String,
}

impl Templates {
    pub fn new(site_name: &str) -> Result<Self, Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        // sitemap.xml は escape_xml フィルターで個別に扱う
        tera.autoescape_on(vec![".html"]);
        debug!("Loaded {} templates", TEMPLATES.len());
        Ok(Self { tera, site_name: site_name.to_string() })
    }

    /// レイアウトを使わずにレンダリング
    pub fn render(&self, template: &str, context: &Context) -> Result<String, Error> {
        Ok(self.tera.render(template, context)?)
    }

    /// 公開サイトのページ
    pub fn public(&self, template: &str, page: &Page<'_>, context: Context) -> Result<String, Error> {
        let mut full = public_context(&self.site_name, page);
        full.extend(context);
        self.render(template, &full)
    }

    /// 管理画面のページ
    pub fn admin(&self, template: &str, page: &Page<'_>, user: &AdminUser, context: Context) -> Result<String, Error> {
        let mut full = admin_context(&self.site_name, page, user);
        full.extend(context);
        self.render(template, &full)
    }
}

#[cfg(test)]
pub(crate) fn decode_slashes(html: &str) -> String {
    // テンプレートの自動エスケープは `/` も文字参照にする
    html.replace("&#x2F;", "/")
}
