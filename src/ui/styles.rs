//! 状態によって変わるクラス名
//!
//! 固定のクラス名はテンプレートに直接書き、ここには表示状態に応じて
//! [`class_names!`](crate::class_names) で組み立てるものだけを置く。
//! 見た目は `assets/site.css` が持つ。

/// ナビゲーションのリンク
#[derive(Debug, Clone, Copy)]
pub struct NavStyles {
    pub link: &'static str,
    pub active: &'static str,
}

pub const NAV: NavStyles = NavStyles {
    link: "nav-link",
    active: "nav-link--active",
};

/// カード
#[derive(Debug, Clone, Copy)]
pub struct CardStyles {
    pub base: &'static str,
    pub highlighted: &'static str,
}

pub const CARD: CardStyles = CardStyles {
    base: "card",
    highlighted: "card--highlighted",
};

/// フォームの入力欄
#[derive(Debug, Clone, Copy)]
pub struct FieldStyles {
    pub input: &'static str,
    pub invalid: &'static str,
}

pub const FIELD: FieldStyles = FieldStyles {
    input: "field__input",
    invalid: "field__input--invalid",
};

/// お知らせ
#[derive(Debug, Clone, Copy)]
pub struct NoticeStyles {
    pub base: &'static str,
    pub error: &'static str,
}

pub const NOTICE: NoticeStyles = NoticeStyles {
    base: "notice",
    error: "notice--error",
};

/// 状態バッジ
#[derive(Debug, Clone, Copy)]
pub struct BadgeStyles {
    pub base: &'static str,
    pub success: &'static str,
    pub muted: &'static str,
}

pub const BADGE: BadgeStyles = BadgeStyles {
    base: "badge",
    success: "badge--success",
    muted: "badge--muted",
};
