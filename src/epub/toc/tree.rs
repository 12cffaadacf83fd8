//! 目录树（Table of Contents Tree）模块
//!
//! 把目录森林转换为带播放顺序编号的树，用于在终端中显示。

use crate::epub::toc::entry::TocEntry;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// 目录树显示样式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TocTreeStyle {
    /// 使用树状符号（├── └──）
    TreeSymbols,
    /// 使用缩进和符号（• ）
    Indented,
}

/// 目录树节点
#[derive(Debug, Clone)]
pub struct TocTreeNode {
    /// 播放顺序
    pub play_order: u32,
    /// 标题
    pub title: String,
    /// 目标路径，只用于分组的节点为None
    pub src: Option<String>,
    /// 子节点
    pub children: Vec<TocTreeNode>,
    /// 节点深度
    pub depth: u32,
}

impl TocTreeNode {
    /// 获取节点的最大深度
    pub fn get_max_depth(&self) -> u32 {
        self.children
            .iter()
            .map(TocTreeNode::get_max_depth)
            .fold(self.depth, u32::max)
    }

    /// 获取节点及其所有子节点的数量
    pub fn get_total_nodes(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(TocTreeNode::get_total_nodes)
            .sum::<usize>()
    }

    /// 叶子节点数量
    pub fn get_leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(TocTreeNode::get_leaf_count).sum()
        }
    }

    /// 根据目标路径查找节点
    pub fn find_by_src(&self, src: &str) -> Option<&TocTreeNode> {
        if self.src.as_deref() == Some(src) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_src(src))
    }

    /// 根据路径数组获取子节点
    /// 路径数组表示从当前节点开始的索引路径，`[]` 表示当前节点本身
    pub fn get_node_by_path(&self, path: &[usize]) -> Option<&TocTreeNode> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.children.get(*first)?.get_node_by_path(rest),
        }
    }

    fn label(&self, show_paths: bool) -> String {
        match (&self.src, show_paths) {
            (Some(src), true) => format!("[{}] {} → {}", self.play_order, self.title, src),
            _ => format!("[{}] {}", self.play_order, self.title),
        }
    }
}

/// 目录树结构
#[derive(Debug, Clone)]
pub struct TocTree {
    /// 文档标题
    pub title: Option<String>,
    /// 根节点列表
    pub roots: Vec<TocTreeNode>,
    /// 显示样式
    pub style: TocTreeStyle,
    /// 是否显示文件路径
    pub show_paths: bool,
    /// 最大显示深度（None表示显示所有）
    pub max_depth: Option<u32>,
}

impl TocTree {
    /// 从目录森林创建目录树，播放顺序按先序从1开始编号
    ///
    /// # 使用示例
    ///
    /// ```rust
    /// use epubforge::{TocEntry, TocTree};
    ///
    /// let toc = vec![TocEntry::link("chap_01.xhtml", "Introduction")];
    /// let tree = TocTree::from_entries(Some("Sample book".to_string()), &toc);
    /// assert_eq!(tree.get_statistics().total_nodes, 1);
    /// ```
    pub fn from_entries(title: Option<String>, entries: &[TocEntry]) -> Self {
        let mut play_order = 0;
        let roots = entries
            .iter()
            .map(|entry| convert_entry(entry, 0, &mut play_order))
            .collect();

        Self {
            title,
            roots,
            style: TocTreeStyle::TreeSymbols,
            show_paths: true,
            max_depth: None,
        }
    }

    /// 设置显示样式
    pub fn with_style(mut self, style: TocTreeStyle) -> Self {
        self.style = style;
        self
    }

    /// 设置是否显示文件路径
    pub fn with_show_paths(mut self, show_paths: bool) -> Self {
        self.show_paths = show_paths;
        self
    }

    /// 设置最大显示深度
    pub fn with_max_depth(mut self, max_depth: Option<u32>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 获取目录树的统计信息
    pub fn get_statistics(&self) -> TocStatistics {
        TocStatistics {
            total_nodes: self.roots.iter().map(TocTreeNode::get_total_nodes).sum(),
            max_depth: self
                .roots
                .iter()
                .map(TocTreeNode::get_max_depth)
                .max()
                .unwrap_or(0),
            leaf_count: self.roots.iter().map(TocTreeNode::get_leaf_count).sum(),
            root_count: self.roots.len(),
        }
    }

    /// 根据目标路径查找节点
    pub fn find_by_src(&self, src: &str) -> Option<&TocTreeNode> {
        self.roots.iter().find_map(|root| root.find_by_src(src))
    }

    /// 根据路径数组获取节点
    /// - `[0]` 表示第一个根节点
    /// - `[1, 0, 2]` 表示第二个根节点的第一个子节点的第三个子节点
    pub fn get_node_by_path(&self, path: &[usize]) -> Option<&TocTreeNode> {
        let (first, rest) = path.split_first()?;
        self.roots.get(*first)?.get_node_by_path(rest)
    }

    fn within_depth(&self, depth: u32) -> bool {
        self.max_depth.is_none_or(|max_depth| depth < max_depth)
    }

    /// 渲染树状符号风格
    fn render_tree_style(&self, node: &TocTreeNode, is_last: bool, prefix: &str, result: &mut String) {
        if !self.within_depth(node.depth) {
            return;
        }

        let branch = if is_last { "└── " } else { "├── " };
        result.push_str(&format!("{}{}{}\n", prefix, branch, node.label(self.show_paths)));

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        for (index, child) in node.children.iter().enumerate() {
            let is_child_last = index == node.children.len() - 1;
            self.render_tree_style(child, is_child_last, &child_prefix, result);
        }
    }

    /// 渲染缩进风格
    fn render_indent_style(&self, node: &TocTreeNode, result: &mut String) {
        if !self.within_depth(node.depth) {
            return;
        }

        let indent = "  ".repeat(node.depth as usize);
        result.push_str(&format!("{}• {}\n", indent, node.label(self.show_paths)));

        for child in &node.children {
            self.render_indent_style(child, result);
        }
    }
}

impl Display for TocTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut result = String::new();

        if let Some(ref title) = self.title {
            let depth_info = match self.max_depth {
                Some(max_depth) => format!(" (深度限制: {})", max_depth),
                None => String::new(),
            };
            result.push_str(&format!("📖 {}{}\n", title, depth_info));
            result.push_str("═══════════════════════════════════════\n\n");
        }

        for (index, root) in self.roots.iter().enumerate() {
            match self.style {
                TocTreeStyle::TreeSymbols => {
                    let is_last = index == self.roots.len() - 1;
                    self.render_tree_style(root, is_last, "", &mut result);
                }
                TocTreeStyle::Indented => self.render_indent_style(root, &mut result),
            }
        }

        write!(f, "{}", result)
    }
}

/// 目录树统计信息
#[derive(Debug, Clone, PartialEq)]
pub struct TocStatistics {
    /// 总节点数
    pub total_nodes: usize,
    /// 最大深度
    pub max_depth: u32,
    /// 叶子节点数
    pub leaf_count: usize,
    /// 根节点数
    pub root_count: usize,
}

impl Display for TocStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "目录统计: {} 个章节, {} 个根节点, {} 个叶子节点, 最大深度: {}",
            self.total_nodes, self.root_count, self.leaf_count, self.max_depth
        )
    }
}

/// 递归转换目录条目为目录树节点
fn convert_entry(entry: &TocEntry, depth: u32, play_order: &mut u32) -> TocTreeNode {
    *play_order += 1;
    let mut node = TocTreeNode {
        play_order: *play_order,
        title: entry.label().to_string(),
        src: entry.target().map(|target| target.to_href()),
        children: Vec::new(),
        depth,
    };

    for child in entry.children() {
        node.children.push(convert_entry(child, depth + 1, play_order));
    }

    node
}
