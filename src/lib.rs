pub mod epub;

// === 核心API重新导出 ===

/// 读取与写出（主要接口）
pub use epub::{EpubReader, EpubWriter, read_epub, read_epub_from_bytes, write_epub, write_epub_to_vec};

/// 错误处理
pub use epub::{EpubError, Result};

/// 配置
pub use epub::{EpubConfig, MediaTypes, WriterOptions};

// === 数据结构 ===

/// 条目模型
pub use epub::{Content, HtmlDoc, HtmlLink, Item, ItemKind, ItemType};

/// 包模型
pub use epub::{
    Creator,
    DcElement,
    Direction,
    EpubVersion,
    GuideReference,
    Identifier,
    MetaValue,
    Metadata,
    MetadataValue,
    Package,
    SpineItem,
};

/// 目录模型
pub use epub::{Landmark, TocEntry, TocStatistics, TocTarget, TocTree, TocTreeNode, TocTreeStyle};

// === 底层组件（高级用法） ===

/// 归档适配层
pub use epub::{ArchiveEntry, ArchiveSink, ArchiveSource, ZipSink, ZipSource};

/// 容器组件
pub use epub::{Container, RootFile};

/// 插件
pub use epub::{HookResult, Plugin};

// === 库信息 ===

/// epubforge库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// epubforge库的描述
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_description() {
        assert!(!DESCRIPTION.is_empty());
    }

    #[test]
    fn test_build_write_read() {
        let mut package = Package::new();
        package.set_random_identifier();
        package.set_title("示例");
        package.set_language("zh");
        let id = package
            .add_item(Item::html("", "text/ch1.xhtml", "第一章", "<p>正文</p>"))
            .unwrap()
            .id()
            .to_string();
        package.add_spine_item(id);
        package.set_toc(vec![TocEntry::link("text/ch1.xhtml", "第一章")]);

        let bytes = write_epub_to_vec(&package).unwrap();
        let read = read_epub_from_bytes(bytes).unwrap();
        assert_eq!(read.title(), Some("示例"));
        assert_eq!(read.toc, package.toc);
        assert_eq!(read.chapters().count(), 1);
    }
}
