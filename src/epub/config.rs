//! 配置模块
//!
//! 提供媒体类型映射表和写出选项，支持从YAML文件加载。
//! 配置总是显式传入读取器和写出器，不存在进程级的全局注册表。

use crate::epub::error::{EpubError, Result};
use crate::epub::item::ItemType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// 无法识别扩展名时使用的媒体类型
pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// 媒体类型映射表
///
/// * `extensions`：文件扩展名到媒体类型的猜测表
/// * `kinds`：媒体类型到条目类型的分类表
/// * `aliases`：读取时需要规范化的错误媒体类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaTypes {
    pub extensions: BTreeMap<String, String>,
    pub kinds: BTreeMap<String, ItemType>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl MediaTypes {
    /// 内置的默认映射表
    pub fn default_table() -> Self {
        let extensions = [
            ("xhtml", "application/xhtml+xml"),
            ("html", "application/xhtml+xml"),
            ("htm", "application/xhtml+xml"),
            ("css", "text/css"),
            ("ncx", "application/x-dtbncx+xml"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("png", "image/png"),
            ("gif", "image/gif"),
            ("svg", "image/svg+xml"),
            ("webp", "image/webp"),
            ("ttf", "font/ttf"),
            ("otf", "font/otf"),
            ("woff", "font/woff"),
            ("woff2", "font/woff2"),
            ("js", "application/javascript"),
            ("smil", "application/smil+xml"),
            ("mp3", "audio/mpeg"),
            ("mp4", "video/mp4"),
        ];
        let kinds = [
            ("application/xhtml+xml", ItemType::Html),
            ("text/html", ItemType::Html),
            ("text/css", ItemType::Css),
            ("application/x-dtbncx+xml", ItemType::Ncx),
            ("application/vnd.ms-opentype", ItemType::Font),
            ("application/font-woff", ItemType::Font),
            ("application/x-font-ttf", ItemType::Font),
        ];
        let aliases = [("image/jpg", "image/jpeg")];

        Self {
            extensions: extensions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            kinds: kinds.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            aliases: aliases
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// 根据文件名猜测媒体类型
    pub fn guess(&self, file_name: &str) -> String {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        self.extensions
            .get(&extension)
            .cloned()
            .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string())
    }

    /// 规范化媒体类型（如 `image/jpg` → `image/jpeg`）
    pub fn normalize(&self, media_type: &str) -> String {
        self.aliases
            .get(media_type)
            .cloned()
            .unwrap_or_else(|| media_type.to_string())
    }

    /// 根据媒体类型和清单属性决定条目类型
    pub fn classify(&self, media_type: &str, properties: &[String]) -> ItemType {
        let has = |name: &str| properties.iter().any(|p| p == name);

        let base = match self.kinds.get(media_type) {
            Some(kind) => *kind,
            None if media_type.starts_with("image/") => ItemType::Image,
            None if media_type.starts_with("font/") => ItemType::Font,
            None => ItemType::Generic,
        };

        match base {
            ItemType::Html if has("nav") => ItemType::Nav,
            ItemType::Image if has("cover-image") => ItemType::Cover,
            other => other,
        }
    }
}

impl Default for MediaTypes {
    fn default() -> Self {
        Self::default_table()
    }
}

/// 写出选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// 在包文档中写出EPUB2 guide
    pub epub2_guide: bool,
    /// 在导航文档中写出landmarks
    pub epub3_landmarks: bool,
    /// landmarks 的标题
    pub landmark_title: String,
    /// 写出 spine/@page-progression-direction
    pub spine_direction: bool,
    /// 写出 package/@dir
    pub package_direction: bool,
    /// 校验目录条目的片段是否存在于目标文档中
    pub validate_anchors: bool,
    /// 指定 dcterms:modified 的值，不指定时使用当前时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    /// 包装HTML正文片段时使用的XHTML模板，取其根元素属性和head内容
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_template: Option<String>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            epub2_guide: true,
            epub3_landmarks: true,
            landmark_title: "Guide".to_string(),
            spine_direction: true,
            package_direction: false,
            validate_anchors: true,
            modified: None,
            chapter_template: None,
        }
    }
}

/// 完整配置：媒体类型表 + 写出选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpubConfig {
    #[serde(default)]
    pub media_types: MediaTypes,
    #[serde(default)]
    pub writer: WriterOptions,
}

impl EpubConfig {
    /// 从YAML文件加载配置
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use epubforge::EpubConfig;
    /// let config = EpubConfig::from_path("epubforge.yaml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| EpubError::ConfigError(format!("无法读取配置文件 {}: {}", path.display(), e)))?;

        let config = Self::from_yaml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// 从YAML字符串解析配置
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yml::from_str(content)
            .map_err(|e| EpubError::ConfigError(format!("配置文件格式错误: {}", e)))
    }

    /// 序列化为带注释头的YAML
    pub fn to_yaml(&self) -> Result<String> {
        let yaml_content = serde_yml::to_string(self)
            .map_err(|e| EpubError::ConfigError(format!("序列化配置失败: {}", e)))?;

        Ok(format!(
            "# epubforge 配置文件\n# media_types: 扩展名猜测、媒体类型分类和别名\n# writer: EPUB写出选项\n\n{}",
            yaml_content
        ))
    }

    /// 把默认配置写入指定路径
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let content = Self::default().to_yaml()?;
        fs::write(path.as_ref(), content)
            .map_err(|e| EpubError::ConfigError(format!("写入配置文件失败: {}", e)))
    }
}
