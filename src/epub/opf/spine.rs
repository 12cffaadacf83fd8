//! 脊柱模块
//!
//! 提供EPUB包中阅读顺序（脊柱）的结构定义。

/// 脊柱项信息(阅读顺序)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    /// 引用的清单项ID
    pub idref: String,
    /// 是否线性阅读
    pub linear: bool,
    /// itemref的properties（如 page-spread-left）
    pub properties: Vec<String>,
}

impl SpineItem {
    /// 创建新的脊柱项
    pub fn new(idref: impl Into<String>) -> Self {
        Self {
            idref: idref.into(),
            linear: true,
            properties: Vec::new(),
        }
    }

    /// 创建指定线性属性的脊柱项
    pub fn with_linear(idref: impl Into<String>, linear: bool) -> Self {
        Self {
            linear,
            ..Self::new(idref)
        }
    }

    /// 检查是否为线性阅读
    pub fn is_linear(&self) -> bool {
        self.linear
    }
}

impl From<&str> for SpineItem {
    fn from(idref: &str) -> Self {
        SpineItem::new(idref)
    }
}

impl From<String> for SpineItem {
    fn from(idref: String) -> Self {
        SpineItem::new(idref)
    }
}

impl<S: Into<String>> From<(S, bool)> for SpineItem {
    fn from((idref, linear): (S, bool)) -> Self {
        SpineItem::with_linear(idref, linear)
    }
}
