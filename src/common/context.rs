//! リクエストコンテキストの実装
//!
//! ミドルウェアが確定させた値（ログイン中の管理者など）をハンドラーへ渡すための
//! 型をキーにした入れ物。同じ型の値は1つだけ保持する。

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// リクエストコンテキスト（ミドルウェア間でのデータ共有）
#[derive(Debug, Default)]
pub struct RequestContext {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// 新しいRequestContextを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 値を設定（同じ型の既存値は置き換え）
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// 値を取得
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// 値を削除して返却
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// 指定された型の値が存在するかチェック
    pub fn contains<T: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// コンテキストが空かどうか
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Clone for RequestContext {
    fn clone(&self) -> Self {
        // Anyはcloneできないため、複製時は空のコンテキストになる
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Viewer {
        id: String,
        email: String,
    }

    #[derive(Debug, PartialEq)]
    struct Notice(&'static str);

    #[test]
    fn test_insert_and_get_by_type() {
        let mut context = RequestContext::new();
        assert!(context.is_empty());

        let viewer = Viewer { id: "u-1".to_string(), email: "dr@example.com".to_string() };
        context.insert(viewer.clone());
        context.insert(Notice("saved"));

        assert_eq!(context.get::<Viewer>(), Some(&viewer));
        assert_eq!(context.get::<Notice>(), Some(&Notice("saved")));
        assert_eq!(context.get::<String>(), None);
        assert!(context.contains::<Viewer>());
        assert!(!context.is_empty());
    }

    #[test]
    fn test_insert_replaces_same_type() {
        let mut context = RequestContext::new();
        context.insert(Notice("first"));
        context.insert(Notice("second"));
        assert_eq!(context.get::<Notice>(), Some(&Notice("second")));
    }

    #[test]
    fn test_remove() {
        let mut context = RequestContext::new();
        context.insert(42u32);

        assert_eq!(context.remove::<u32>(), Some(42));
        assert_eq!(context.remove::<u32>(), None);
        assert!(!context.contains::<u32>());
    }

    #[test]
    fn test_clone_is_empty() {
        let mut context = RequestContext::new();
        context.insert(Notice("kept"));
        assert!(context.clone().is_empty());
    }
}
