pub mod archive;
pub mod config;
pub mod container;
pub mod error;
pub mod item;
pub mod opf;
pub mod path;
pub mod plugin;
pub mod reader;
pub mod toc;
pub mod writer;
mod xml;

// 重新导出错误处理
pub use error::{EpubError, Result};

// 重新导出配置
pub use config::{EpubConfig, MediaTypes, WriterOptions};

// 重新导出归档适配层
pub use archive::{ArchiveEntry, ArchiveSink, ArchiveSource, ZipSink, ZipSource};

// 重新导出容器相关
pub use container::{Container, RootFile};

// 重新导出条目模型
pub use item::{Content, HtmlDoc, HtmlLink, Item, ItemKind, ItemType};

// 重新导出包模型
pub use opf::{
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

// 重新导出目录模型
pub use toc::{Landmark, TocEntry, TocStatistics, TocTarget, TocTree, TocTreeNode, TocTreeStyle};

// 重新导出读写器
pub use plugin::{HookResult, Plugin};
pub use reader::{EpubReader, read_epub, read_epub_from_bytes};
pub use writer::{EpubWriter, write_epub, write_epub_to_vec};
