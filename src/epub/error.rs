use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EpubError>;

/// Epub相关的错误类型
///
/// 读取和写出都在遇到第一个错误时立即终止，错误不会被降级为警告。
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("缺少mimetype文件")]
    MissingMimetype,

    #[error("无效的mimetype: {expected}, 找到: {found}")]
    InvalidMimetype { expected: String, found: String },

    #[error("归档中不存在条目: {0}")]
    EntryNotFound(String),

    #[error("container.xml解析错误: {0}")]
    MalformedContainer(String),

    #[error("包文档 {path} 无效: {reason}")]
    MalformedPackage { path: String, reason: String },

    #[error("目录文件 {path} 无效: {reason}")]
    MalformedToc { path: String, reason: String },

    #[error("清单中已存在ID: {0}")]
    DuplicateId(String),

    #[error("清单中已存在文件名: {0}")]
    DuplicateFileName(String),

    #[error("{context} 引用了不存在的清单项: {target}")]
    UnresolvedReference { context: String, target: String },

    #[error("缺少唯一标识符元数据 (unique-identifier={0})")]
    MissingIdentifier(String),

    #[error("字符编码错误: {0}")]
    Encoding(String),

    #[error("配置文件错误: {0}")]
    ConfigError(String),

    #[error("插件 {name} 执行失败: {reason}")]
    Plugin { name: String, reason: String },
}

impl EpubError {
    pub(crate) fn malformed_package(path: &str, reason: impl Into<String>) -> Self {
        EpubError::MalformedPackage {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_toc(path: &str, reason: impl Into<String>) -> Self {
        EpubError::MalformedToc {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(context: impl Into<String>, target: impl Into<String>) -> Self {
        EpubError::UnresolvedReference {
            context: context.into(),
            target: target.into(),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for EpubError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        EpubError::XmlError(quick_xml::Error::InvalidAttr(err))
    }
}
