//! OPF（Open Packaging Format）模块
//!
//! 包模型（元数据、清单、脊柱、指南）以及包文档的解析与生成。

pub mod guide;
pub mod manifest;
pub mod metadata;
pub mod package;
pub mod parser;
pub mod spine;
pub mod writer;

pub use guide::GuideReference;
pub use manifest::Manifest;
pub use metadata::{Creator, DcElement, Identifier, MetaValue, Metadata, MetadataValue};
pub use package::{DEFAULT_PACKAGE_PATH, Direction, EpubVersion, Package};
pub use parser::PackageDocument;
pub use spine::SpineItem;
