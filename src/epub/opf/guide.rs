//! 指南模块
//!
//! EPUB2的 `<guide>` 引用。EPUB3中同样的信息写成导航文档里的 landmarks。

/// 一条指南引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideReference {
    /// 引用类型（如 cover、toc、text）
    pub kind: String,
    pub title: String,
    /// 引用的清单项ID
    pub item_id: String,
    /// 目标文档内的片段
    pub fragment: Option<String>,
}

impl GuideReference {
    pub fn new(kind: impl Into<String>, title: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
            item_id: item_id.into(),
            fragment: None,
        }
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// 对应的EPUB3 landmarks类型（epub:type）
    pub fn landmark_type(&self) -> &str {
        match self.kind.as_str() {
            "notes" => "rearnotes",
            "text" => "bodymatter",
            other => other,
        }
    }
}

impl<K, T, I> From<(K, T, I)> for GuideReference
where
    K: Into<String>,
    T: Into<String>,
    I: Into<String>,
{
    fn from((kind, title, item_id): (K, T, I)) -> Self {
        GuideReference::new(kind, title, item_id)
    }
}
