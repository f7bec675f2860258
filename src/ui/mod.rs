//! HTMLレンダリング
//!
//! ページはteraテンプレート（`templates/`）で組み立てる。
//! 表示用の値は [`views`]、状態に応じたクラス名は [`class_names!`](crate::class_names) で作る。

pub mod class_names;
pub mod layout;
pub mod styles;
pub mod templates;
pub mod views;

pub use class_names::{join_class_names, ClassToken};
pub use layout::{Page, STYLESHEET_PATH};
pub use templates::Templates;

/// サイト共通のスタイルシート
pub const SITE_CSS: &str = include_str!("../../assets/site.css");
