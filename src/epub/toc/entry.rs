//! 目录条目
//!
//! 目录是 [`TocEntry`] 组成的有序森林，与清单和脊柱相互独立，
//! 同一棵树既能写成NCX也能写成导航文档。

use crate::epub::path;
use crate::epub::xml;

/// 目录条目指向的位置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TocTarget {
    /// 清单条目的文件名（相对于包文档目录）
    pub href: String,
    /// 文档内的片段
    pub anchor: Option<String>,
}

impl TocTarget {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            anchor: None,
        }
    }

    /// 解析 `file.xhtml#anchor` 形式的引用
    pub fn parse(href: &str) -> Self {
        let (file, anchor) = path::split_fragment(href);
        Self {
            href: file.to_string(),
            anchor: anchor.filter(|a| !a.is_empty()).map(str::to_string),
        }
    }

    /// 拼接回带片段的引用
    pub fn to_href(&self) -> String {
        match &self.anchor {
            Some(anchor) => format!("{}#{}", self.href, anchor),
            None => self.href.clone(),
        }
    }
}

/// 目录条目
///
/// 标签中的连续空白折叠为一个空格并去掉首尾空白：构造函数和 `Package::set_toc`
/// 都会这样处理，读取NCX和导航文档时也一样，因此写出再读取后标签保持相等。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocEntry {
    /// 指向内容的叶子条目
    Link { label: String, target: TocTarget },
    /// 分组标题，可以带有自己的目标，也可以只用于分组
    Section {
        label: String,
        target: Option<TocTarget>,
        children: Vec<TocEntry>,
    },
}

impl TocEntry {
    /// 创建链接条目
    ///
    /// # 参数
    /// * `href` - 文件名，可以带 `#片段`
    /// * `label` - 显示的标题
    pub fn link(href: &str, label: impl Into<String>) -> Self {
        TocEntry::Link {
            label: normalize_label(label),
            target: TocTarget::parse(href),
        }
    }

    /// 创建不带目标的分组
    pub fn section(label: impl Into<String>, children: Vec<TocEntry>) -> Self {
        TocEntry::Section {
            label: normalize_label(label),
            target: None,
            children,
        }
    }

    /// 创建带目标的分组
    pub fn section_with_target(label: impl Into<String>, href: &str, children: Vec<TocEntry>) -> Self {
        TocEntry::Section {
            label: normalize_label(label),
            target: Some(TocTarget::parse(href)),
            children,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TocEntry::Link { label, .. } | TocEntry::Section { label, .. } => label,
        }
    }

    pub fn target(&self) -> Option<&TocTarget> {
        match self {
            TocEntry::Link { target, .. } => Some(target),
            TocEntry::Section { target, .. } => target.as_ref(),
        }
    }

    pub fn children(&self) -> &[TocEntry] {
        match self {
            TocEntry::Link { .. } => &[],
            TocEntry::Section { children, .. } => children,
        }
    }

    /// 带有自身目标但没有子条目的分组，写出时需要额外标记才能与链接区分
    pub fn is_childless_section(&self) -> bool {
        matches!(self, TocEntry::Section { target: Some(_), children, .. } if children.is_empty())
    }

    /// 自身或最先出现的后代的目标
    pub fn first_target(&self) -> Option<&TocTarget> {
        self.target()
            .or_else(|| self.children().iter().find_map(TocEntry::first_target))
    }
}

/// 折叠标签中的空白
pub fn normalize_label(label: impl Into<String>) -> String {
    xml::collapse_whitespace(&label.into())
}

/// 规范化整个目录森林的标签
pub(crate) fn normalize_labels(forest: &mut [TocEntry]) {
    for entry in forest {
        match entry {
            TocEntry::Link { label, .. } => *label = normalize_label(label.as_str()),
            TocEntry::Section {
                label, children, ..
            } => {
                *label = normalize_label(label.as_str());
                normalize_labels(children);
            }
        }
    }
}

/// 先序展开目录森林，得到 `(深度, 条目)` 序列，根的深度为0
pub fn flatten(forest: &[TocEntry]) -> Vec<(usize, &TocEntry)> {
    fn walk<'a>(entries: &'a [TocEntry], depth: usize, out: &mut Vec<(usize, &'a TocEntry)>) {
        for entry in entries {
            out.push((depth, entry));
            walk(entry.children(), depth + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(forest, 0, &mut out);
    out
}

/// 目录森林的层数，空目录为0
pub fn depth(forest: &[TocEntry]) -> usize {
    flatten(forest)
        .iter()
        .map(|(depth, _)| depth + 1)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<TocEntry> {
        vec![
            TocEntry::link("intro.xhtml", "Introduction"),
            TocEntry::section(
                "Part I",
                vec![
                    TocEntry::link("c1.xhtml", "Chapter 1"),
                    TocEntry::section_with_target(
                        "Chapter 2",
                        "c2.xhtml",
                        vec![TocEntry::link("c2.xhtml#s1", "Section 2.1")],
                    ),
                ],
            ),
        ]
    }

    #[test]
    fn test_flatten_is_preorder() {
        let forest = sample();
        let flat: Vec<(usize, &str)> = flatten(&forest)
            .into_iter()
            .map(|(depth, entry)| (depth, entry.label()))
            .collect();

        assert_eq!(
            flat,
            vec![
                (0, "Introduction"),
                (0, "Part I"),
                (1, "Chapter 1"),
                (1, "Chapter 2"),
                (2, "Section 2.1"),
            ]
        );
        assert_eq!(depth(&forest), 3);
        assert_eq!(depth(&[]), 0);
    }

    #[test]
    fn test_target_parse() {
        let target = TocTarget::parse("c2.xhtml#s1");
        assert_eq!(target.href, "c2.xhtml");
        assert_eq!(target.anchor.as_deref(), Some("s1"));
        assert_eq!(target.to_href(), "c2.xhtml#s1");
        assert_eq!(TocTarget::parse("c1.xhtml#").anchor, None);
    }

    #[test]
    fn test_labels_are_normalized() {
        assert_eq!(TocEntry::link("c1.xhtml", " Part  One \n").label(), "Part One");
        assert_eq!(TocEntry::section("A\u{a0} B", vec![]).label(), "A\u{a0} B");

        let mut forest = vec![TocEntry::Section {
            label: "  Part\tI ".to_string(),
            target: None,
            children: vec![TocEntry::Link {
                label: "Chapter   1".to_string(),
                target: TocTarget::new("c1.xhtml"),
            }],
        }];
        normalize_labels(&mut forest);
        assert_eq!(forest[0].label(), "Part I");
        assert_eq!(forest[0].children()[0].label(), "Chapter 1");
    }

    #[test]
    fn test_childless_section() {
        assert!(TocEntry::section_with_target("S", "c1.xhtml", vec![]).is_childless_section());
        assert!(!TocEntry::section("S", vec![]).is_childless_section());
        assert!(!TocEntry::link("c1.xhtml", "S").is_childless_section());
        assert!(!sample()[1].children()[1].is_childless_section());
    }

    #[test]
    fn test_first_target() {
        let forest = sample();
        assert_eq!(forest[1].target(), None);
        assert_eq!(forest[1].first_target().unwrap().href, "c1.xhtml");
    }
}
