//! class属性値の組み立て
//!
//! 条件付きのクラス名を並べ、有効なものだけを空白1つで連結する。
//!
//! ```
//! use dentalsite::class_names;
//!
//! let active = false;
//! let classes = class_names!("nav-link", active.then_some("nav-link--active"), "text-sm");
//! assert_eq!(classes, "nav-link text-sm");
//! ```

use std::borrow::Cow;

/// 連結候補となる1要素
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassToken<'a> {
    /// クラス名（空文字列は出力されない）
    Class(Cow<'a, str>),
    /// 偽値（false / None / 値なし）
    Absent,
}

impl<'a> From<&'a str> for ClassToken<'a> {
    fn from(value: &'a str) -> Self {
        ClassToken::Class(Cow::Borrowed(value))
    }
}

impl<'a> From<&'a String> for ClassToken<'a> {
    fn from(value: &'a String) -> Self {
        ClassToken::Class(Cow::Borrowed(value.as_str()))
    }
}

impl<'a> From<String> for ClassToken<'a> {
    fn from(value: String) -> Self {
        ClassToken::Class(Cow::Owned(value))
    }
}

impl<'a> From<Cow<'a, str>> for ClassToken<'a> {
    fn from(value: Cow<'a, str>) -> Self {
        ClassToken::Class(value)
    }
}

impl<'a> From<Option<&'a str>> for ClassToken<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(ClassToken::Absent, ClassToken::from)
    }
}

impl<'a> From<Option<String>> for ClassToken<'a> {
    fn from(value: Option<String>) -> Self {
        value.map_or(ClassToken::Absent, ClassToken::from)
    }
}

impl<'a> From<&'a Option<String>> for ClassToken<'a> {
    fn from(value: &'a Option<String>) -> Self {
        value.as_deref().into()
    }
}

/// 真偽値はクラス名を持たないため、trueでもfalseでも出力しない
impl<'a> From<bool> for ClassToken<'a> {
    fn from(_: bool) -> Self {
        ClassToken::Absent
    }
}

impl<'a> From<()> for ClassToken<'a> {
    fn from(_: ()) -> Self {
        ClassToken::Absent
    }
}

/// 有効なクラス名だけを元の順序のまま空白1つで連結する
///
/// 文字列はトリムも検証もせずそのまま使う。候補が無ければ空文字列。
pub fn join_class_names<'a, I, T>(tokens: I) -> String
where
    I: IntoIterator<Item = T>,
    T: Into<ClassToken<'a>>,
{
    let mut out = String::new();
    for token in tokens {
        if let ClassToken::Class(name) = token.into() {
            if name.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&name);
        }
    }
    out
}

/// 型の異なる候補を並べて [`join_class_names`] を呼ぶマクロ
#[macro_export]
macro_rules! class_names {
    () => {
        ::std::string::String::new()
    };
    ($($token:expr),+ $(,)?) => {
        $crate::ui::class_names::join_class_names([
            $($crate::ui::class_names::ClassToken::from($token)),+
        ])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_falsy_inputs() {
        assert_eq!(join_class_names(Vec::<ClassToken>::new()), "");
        assert_eq!(class_names!(), "");
        assert_eq!(class_names!(false, None::<&str>, ()), "");
        assert_eq!(join_class_names([None::<&str>, None]), "");
    }

    #[test]
    fn single_string_is_unchanged() {
        assert_eq!(class_names!("btn"), "btn");
        // 空白を含む文字列もそのまま
        assert_eq!(class_names!("  btn  primary "), "  btn  primary ");
    }

    #[test]
    fn joins_in_order() {
        assert_eq!(join_class_names(["foo", "bar", "baz"]), "foo bar baz");
        assert_eq!(class_names!("foo", false, "bar"), "foo bar");
        assert_eq!(class_names!("foo", None::<&str>, "bar"), "foo bar");
        assert_eq!(class_names!("a", false, None::<&str>, (), "b"), "a b");
    }

    #[test]
    fn empty_strings_do_not_add_spaces() {
        assert_eq!(class_names!("", "a", "", "b", ""), "a b");
    }

    #[test]
    fn accepts_owned_and_optional_values() {
        let dynamic = format!("grid-cols-{}", 3);
        let maybe: Option<String> = Some("shadow".to_string());
        let none: Option<String> = None;
        let active = true;
        assert_eq!(
            class_names!(&dynamic, &maybe, &none, active.then_some("is-active"), true),
            "grid-cols-3 shadow is-active"
        );
    }

    #[test]
    fn accepts_values_by_move() {
        let n = 4;
        assert_eq!(class_names!(format!("grid-cols-{}", n)), "grid-cols-4");
        assert_eq!(
            class_names!("grid", format!("gap-{}", n * 2), Some("wide".to_string()), None::<String>),
            "grid gap-8 wide"
        );
        assert_eq!(class_names!(String::new(), "only"), "only");
        let joined = join_class_names((1..=3).map(|i| format!("step-{}", i)));
        assert_eq!(joined, "step-1 step-2 step-3");
        let optional: Vec<Option<String>> = vec![Some("a".to_string()), None, Some("b".to_string())];
        assert_eq!(join_class_names(optional), "a b");
    }

    #[test]
    fn preserves_relative_order() {
        let tokens = ["z", "", "y", "x"];
        let joined = join_class_names(tokens);
        let expected: Vec<&str> = tokens.iter().copied().filter(|t| !t.is_empty()).collect();
        assert_eq!(joined.split(' ').collect::<Vec<_>>(), expected);
    }
}
