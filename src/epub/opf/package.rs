//! 包模型
//!
//! [`Package`] 聚合清单、脊柱、指南、元数据和目录，是读取和写出的基本单位。
//! 结构上的约束（标识符、引用完整性）在写出前由 [`Package::validate`] 统一检查，
//! 因此允许先声明脊柱顺序、后加入条目。

use crate::epub::config::MediaTypes;
use crate::epub::error::{EpubError, Result};
use crate::epub::item::{Item, ItemKind, ItemType, RenderDefaults, html};
use crate::epub::opf::guide::GuideReference;
use crate::epub::opf::manifest::Manifest;
use crate::epub::opf::metadata::{self, DcElement, MetaValue, Metadata, MetadataValue};
use crate::epub::opf::spine::SpineItem;
use crate::epub::path;
use crate::epub::toc::entry::{self, TocEntry};
use std::fmt;
use uuid::Uuid;

/// 默认的包文档位置
pub const DEFAULT_PACKAGE_PATH: &str = "EPUB/content.opf";

/// 默认的唯一标识符元素id
pub const DEFAULT_IDENTIFIER_ID: &str = "id";

/// EPUB版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpubVersion {
    pub major: u32,
    pub minor: u32,
}

impl EpubVersion {
    pub const V2: EpubVersion = EpubVersion { major: 2, minor: 0 };
    pub const V3: EpubVersion = EpubVersion { major: 3, minor: 0 };

    /// 解析 `2.0`、`3.0`、`3.3` 这样的版本号
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (major, minor) = text.split_once('.').unwrap_or((text, "0"));
        Some(Self {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }

    pub fn is_epub3(&self) -> bool {
        self.major >= 3
    }
}

impl Default for EpubVersion {
    fn default() -> Self {
        Self::V3
    }
}

impl fmt::Display for EpubVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// 阅读方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "ltr" => Some(Direction::Ltr),
            "rtl" => Some(Direction::Rtl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// 整本书
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    /// 决定写出的方言
    pub version: EpubVersion,
    pub metadata: Metadata,
    manifest: Manifest,
    pub spine: Vec<SpineItem>,
    pub guide: Vec<GuideReference>,
    pub toc: Vec<TocEntry>,
    /// EPUB3中同时写出NCX
    pub legacy_ncx: bool,
    pub direction: Option<Direction>,
    /// package/@prefix 中的自定义前缀
    pub prefixes: Vec<(String, String)>,
    unique_identifier_id: String,
    /// 包文档在归档中的路径
    pub package_path: String,
    media_types: MediaTypes,
}

impl Default for Package {
    fn default() -> Self {
        Self::new()
    }
}

impl Package {
    /// 创建空包，使用默认的媒体类型表
    pub fn new() -> Self {
        Self::with_media_types(MediaTypes::default())
    }

    /// 创建空包，使用指定的媒体类型表猜测和规范化媒体类型
    pub fn with_media_types(media_types: MediaTypes) -> Self {
        Self {
            version: EpubVersion::default(),
            metadata: Metadata::new(),
            manifest: Manifest::new(),
            spine: Vec::new(),
            guide: Vec::new(),
            toc: Vec::new(),
            legacy_ncx: false,
            direction: None,
            prefixes: Vec::new(),
            unique_identifier_id: DEFAULT_IDENTIFIER_ID.to_string(),
            package_path: DEFAULT_PACKAGE_PATH.to_string(),
            media_types,
        }
    }

    pub fn media_types(&self) -> &MediaTypes {
        &self.media_types
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// 包文档所在目录，条目的文件名相对于这个目录
    pub fn base_dir(&self) -> &str {
        path::parent_dir(&self.package_path)
    }

    // ---- 清单 ----

    /// 加入条目
    ///
    /// ID为空时根据文件名生成，媒体类型为空时根据扩展名猜测。
    /// ID或文件名冲突时返回错误，清单保持不变。不会自动加入脊柱。
    pub fn add_item(&mut self, mut item: Item) -> Result<&Item> {
        if item.file_name.is_empty() {
            return Err(EpubError::malformed_package(
                &self.package_path,
                format!("条目 '{}' 缺少文件名", item.id),
            ));
        }
        if item.id.is_empty() {
            item.id = self.manifest.unique_id_for(&item.file_name);
        }
        item.media_type = if item.media_type.is_empty() {
            self.media_types.guess(&item.file_name)
        } else {
            self.media_types.normalize(&item.media_type)
        };

        self.manifest.insert(item)
    }

    /// 按ID删除条目，脊柱、指南和目录中的引用需要调用方自行处理
    pub fn remove_item(&mut self, id: &str) -> Option<Item> {
        self.manifest.remove(id)
    }

    pub fn get_item_with_id(&self, id: &str) -> Option<&Item> {
        self.manifest.get(id)
    }

    pub fn get_item_with_id_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.manifest.get_mut(id)
    }

    pub fn get_item_with_href(&self, file_name: &str) -> Option<&Item> {
        self.manifest.get_by_file_name(file_name)
    }

    /// 按插入顺序遍历全部条目
    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.manifest.iter()
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut Item> + '_ {
        self.manifest.iter_mut()
    }

    /// 指定类型的条目，按插入顺序；每次调用都重新遍历当前清单
    pub fn get_items_by_type(&self, item_type: ItemType) -> impl Iterator<Item = &Item> + '_ {
        self.manifest.of_type(item_type)
    }

    pub fn get_items_of_media_type<'a>(&'a self, media_type: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.manifest
            .iter()
            .filter(move |item| item.media_type() == media_type)
    }

    // ---- 脊柱、指南、目录 ----

    /// 整体替换脊柱
    ///
    /// 引用在写出时校验，这里不要求条目已经存在。
    pub fn set_spine<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<SpineItem>,
    {
        self.spine = entries.into_iter().map(Into::into).collect();
    }

    pub fn add_spine_item(&mut self, entry: impl Into<SpineItem>) {
        self.spine.push(entry.into());
    }

    /// 整体替换指南，引用在写出时校验
    pub fn set_guide<I, G>(&mut self, references: I)
    where
        I: IntoIterator<Item = G>,
        G: Into<GuideReference>,
    {
        self.guide = references.into_iter().map(Into::into).collect();
    }

    /// 整体替换目录，引用在写出时校验，标签中的空白被折叠
    pub fn set_toc(&mut self, mut toc: Vec<TocEntry>) {
        entry::normalize_labels(&mut toc);
        self.toc = toc;
    }

    /// 先序展开目录，同时校验每个目标都指向清单中的文件
    pub fn flatten_toc(&self) -> Result<Vec<(usize, &TocEntry)>> {
        let flat = entry::flatten(&self.toc);
        for (_, entry) in &flat {
            if let Some(target) = entry.target() {
                if !self.manifest.contains_file_name(&target.href) {
                    return Err(EpubError::unresolved(
                        format!("目录条目 '{}'", entry.label()),
                        target.href.clone(),
                    ));
                }
            }
        }
        Ok(flat)
    }

    /// 检查写出前必须满足的约束
    ///
    /// 依次检查：唯一标识符、脊柱引用、指南引用、目录引用。遇到第一个错误即返回。
    pub fn validate(&self) -> Result<()> {
        let identifiers = self
            .metadata
            .identifiers()
            .into_iter()
            .filter(|identifier| identifier.id.as_deref() == Some(self.unique_identifier_id.as_str()))
            .count();
        if identifiers != 1 {
            return Err(EpubError::MissingIdentifier(self.unique_identifier_id.clone()));
        }

        for spine_item in &self.spine {
            if !self.manifest.contains_id(&spine_item.idref) {
                return Err(EpubError::unresolved("spine", spine_item.idref.clone()));
            }
        }

        for reference in &self.guide {
            if !self.manifest.contains_id(&reference.item_id) {
                return Err(EpubError::unresolved(
                    format!("guide '{}'", reference.kind),
                    reference.item_id.clone(),
                ));
            }
        }

        self.flatten_toc()?;
        Ok(())
    }

    // ---- 元数据 ----

    /// 唯一标识符元素的id（package/@unique-identifier）
    pub fn unique_identifier_id(&self) -> &str {
        &self.unique_identifier_id
    }

    pub(crate) fn set_unique_identifier_id(&mut self, id: impl Into<String>) {
        self.unique_identifier_id = id.into();
    }

    /// 唯一标识符的值
    pub fn identifier(&self) -> Option<String> {
        self.metadata
            .identifier_with_id(&self.unique_identifier_id)
            .map(|identifier| identifier.value)
    }

    /// 设置唯一标识符，替换已有的同id标识符
    ///
    /// # 参数
    /// * `value` - 标识符值
    /// * `scheme` - 标识符类型（如 ISBN、UUID）；EPUB3写成 identifier-type 精化
    pub fn set_unique_identifier(&mut self, value: impl Into<String>, scheme: Option<&str>) {
        let id = self.unique_identifier_id.clone();
        self.metadata.remove_where(|entry| match entry {
            MetadataValue::DublinCore {
                element: DcElement::Identifier,
                ..
            } => entry.id() == Some(id.as_str()),
            MetadataValue::Meta(meta) => {
                meta.refines_id() == Some(id.as_str()) && meta.property() == Some("identifier-type")
            }
            _ => false,
        });

        let mut attributes = vec![("id".to_string(), id.clone())];
        if let Some(scheme) = scheme {
            if self.version.is_epub3() {
                self.metadata
                    .add_meta(MetaValue::refines(&id, "identifier-type", scheme, None));
            } else {
                attributes.push(("opf:scheme".to_string(), scheme.to_string()));
            }
        }

        self.metadata.insert_first(MetadataValue::DublinCore {
            element: DcElement::Identifier,
            value: value.into(),
            attributes,
        });
    }

    /// 使用随机UUID作为唯一标识符，返回生成的值
    pub fn set_random_identifier(&mut self) -> String {
        let value = format!("urn:uuid:{}", Uuid::new_v4());
        self.set_unique_identifier(value.clone(), None);
        value
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.title()
    }

    /// 设置书名（覆盖）
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.metadata.set_dublin_core(DcElement::Title, title, Vec::new());
    }

    pub fn language(&self) -> Option<&str> {
        self.metadata.language()
    }

    /// 设置语言（覆盖）
    pub fn set_language(&mut self, language: impl Into<String>) {
        self.metadata
            .set_dublin_core(DcElement::Language, language, Vec::new());
    }

    /// 添加作者，可重复调用，返回生成的元素id
    ///
    /// EPUB3中角色和排序名写成 refines 精化，EPUB2中写成 `opf:role`、`opf:file-as` 属性。
    pub fn add_author(&mut self, name: impl Into<String>, file_as: Option<&str>, role: Option<&str>) -> String {
        self.add_person(DcElement::Creator, "creator", name, file_as, role)
    }

    /// 添加贡献者，可重复调用，返回生成的元素id
    pub fn add_contributor(
        &mut self,
        name: impl Into<String>,
        file_as: Option<&str>,
        role: Option<&str>,
    ) -> String {
        self.add_person(DcElement::Contributor, "contributor", name, file_as, role)
    }

    fn add_person(
        &mut self,
        element: DcElement,
        id_prefix: &str,
        name: impl Into<String>,
        file_as: Option<&str>,
        role: Option<&str>,
    ) -> String {
        let id = self.unused_metadata_id(id_prefix);
        let mut attributes = vec![("id".to_string(), id.clone())];
        let epub3 = self.version.is_epub3();

        if !epub3 {
            if let Some(role) = role {
                attributes.push(("opf:role".to_string(), role.to_string()));
            }
            if let Some(file_as) = file_as {
                attributes.push(("opf:file-as".to_string(), file_as.to_string()));
            }
        }
        self.metadata.add_dublin_core(element, name, attributes);

        if epub3 {
            if let Some(role) = role {
                self.metadata
                    .add_meta(MetaValue::refines(&id, "role", role, Some("marc:relators")));
            }
            if let Some(file_as) = file_as {
                self.metadata.add_meta(MetaValue::refines(&id, "file-as", file_as, None));
            }
        }
        id
    }

    fn unused_metadata_id(&self, prefix: &str) -> String {
        metadata::unused_id(&self.metadata.element_ids(), prefix)
    }

    /// 添加主题，可重复调用
    pub fn add_subject(&mut self, subject: impl Into<String>) {
        self.metadata
            .add_dublin_core(DcElement::Subject, subject, Vec::new());
    }

    pub fn set_publisher(&mut self, publisher: impl Into<String>) {
        self.metadata
            .set_dublin_core(DcElement::Publisher, publisher, Vec::new());
    }

    pub fn set_date(&mut self, date: impl Into<String>) {
        self.metadata.set_dublin_core(DcElement::Date, date, Vec::new());
    }

    pub fn set_rights(&mut self, rights: impl Into<String>) {
        self.metadata.set_dublin_core(DcElement::Rights, rights, Vec::new());
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.metadata
            .set_dublin_core(DcElement::Description, description, Vec::new());
    }

    /// 添加任意元数据（如 `dc:source` 或厂商自定义的meta）
    pub fn add_metadata(&mut self, value: MetadataValue) {
        self.metadata.push(value);
    }

    /// 添加 package/@prefix 前缀声明
    pub fn add_prefix(&mut self, name: impl Into<String>, uri: impl Into<String>) {
        self.prefixes.push((name.into(), uri.into()));
    }

    pub fn set_direction(&mut self, direction: Option<Direction>) {
        self.direction = direction;
    }

    /// 设置封面
    ///
    /// 加入ID为 `cover-img` 的封面图片和 `<meta name="cover">`；
    /// `create_page` 为真时再加入ID为 `cover` 的封面页和指南引用。
    pub fn set_cover(&mut self, file_name: &str, bytes: Vec<u8>, create_page: bool) -> Result<()> {
        self.add_item(Item::cover("cover-img", file_name, "", bytes))?;

        if create_page {
            let page_name = path::join(path::parent_dir(file_name), "cover.xhtml");
            let image_href = path::relative(path::parent_dir(&page_name), file_name);
            let body = html::cover_body(&path::encode_href(&image_href), "Cover")?;
            self.add_item(Item::html("cover", page_name.as_str(), "Cover", body))?;
            self.guide.push(GuideReference::new("cover", "Cover", "cover"));
        }

        self.metadata.add_meta(MetaValue::name_based("cover", "cover-img"));
        Ok(())
    }

    /// HTML条目写出时使用的包级默认值
    pub fn render_defaults(&self) -> RenderDefaults<'_> {
        RenderDefaults {
            title: self.title(),
            language: self.language(),
            direction: self.direction.map(|d| d.as_str()),
            template: None,
        }
    }

    /// 内容文档（HTML）条目
    pub fn chapters(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items()
            .filter(|item| matches!(item.kind, ItemKind::Html(_)))
    }
}
