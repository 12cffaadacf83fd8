//! 目录模块
//!
//! 目录模型、NCX和导航文档两种方言的读写，以及终端显示用的目录树。

pub mod entry;
pub mod nav;
pub mod ncx;
pub mod tree;

pub use entry::{TocEntry, TocTarget, flatten};
pub use nav::Landmark;
pub use tree::{TocStatistics, TocTree, TocTreeNode, TocTreeStyle};
