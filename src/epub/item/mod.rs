//! 清单条目模块
//!
//! 每个 [`Item`] 对应归档中的一个文件。条目的种类 [`ItemKind`] 是封闭的枚举，
//! 种类特有的字段（如HTML文档的标题和语言）在构造时就已确定。

pub mod content;
pub mod html;

pub use content::Content;
pub use html::{HtmlLink, PageTemplate};

use crate::epub::error::Result;
use encoding_rs::UTF_8;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 条目种类的判别值，用于按类型查询和配置映射表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Html,
    Image,
    Cover,
    Css,
    Font,
    Ncx,
    Nav,
    Generic,
}

impl ItemType {
    /// 是否为文本类条目
    pub fn is_text(&self) -> bool {
        matches!(self, ItemType::Html | ItemType::Css | ItemType::Ncx | ItemType::Nav)
    }
}

/// HTML内容文档的专有字段
///
/// 未设置的标题和语言在写出时回退到包级元数据。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlDoc {
    pub title: Option<String>,
    pub language: Option<String>,
    pub direction: Option<String>,
    /// 包装正文片段时引用的样式表（相对于本文档）
    pub stylesheets: Vec<String>,
}

/// 条目种类
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Html(HtmlDoc),
    Image,
    Cover,
    Css,
    Font,
    Ncx,
    Nav,
    Generic,
}

impl ItemKind {
    /// 按判别值创建种类，HTML使用空的专有字段
    pub fn from_type(item_type: ItemType) -> Self {
        match item_type {
            ItemType::Html => ItemKind::Html(HtmlDoc::default()),
            ItemType::Image => ItemKind::Image,
            ItemType::Cover => ItemKind::Cover,
            ItemType::Css => ItemKind::Css,
            ItemType::Font => ItemKind::Font,
            ItemType::Ncx => ItemKind::Ncx,
            ItemType::Nav => ItemKind::Nav,
            ItemType::Generic => ItemKind::Generic,
        }
    }

    pub fn item_type(&self) -> ItemType {
        match self {
            ItemKind::Html(_) => ItemType::Html,
            ItemKind::Image => ItemType::Image,
            ItemKind::Cover => ItemType::Cover,
            ItemKind::Css => ItemType::Css,
            ItemKind::Font => ItemType::Font,
            ItemKind::Ncx => ItemType::Ncx,
            ItemKind::Nav => ItemType::Nav,
            ItemKind::Generic => ItemType::Generic,
        }
    }
}

/// 写出HTML条目时使用的包级默认值
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderDefaults<'a> {
    pub title: Option<&'a str>,
    pub language: Option<&'a str>,
    pub direction: Option<&'a str>,
    /// 包装正文片段时使用的页面模板
    pub template: Option<&'a PageTemplate>,
}

/// 清单中的一个条目
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub(crate) id: String,
    pub(crate) file_name: String,
    pub(crate) media_type: String,
    pub content: Content,
    pub kind: ItemKind,
    /// 除 `nav`、`cover-image` 以外的清单属性（如 `scripted`、`svg`）
    pub properties: Vec<String>,
}

impl Item {
    /// 创建条目
    ///
    /// # 参数
    /// * `id` - 清单ID，为空时在加入包时根据文件名自动生成
    /// * `file_name` - 相对于包文档目录的路径
    /// * `media_type` - 媒体类型，为空时在加入包时根据扩展名猜测
    /// * `content` - 条目内容
    /// * `kind` - 条目种类
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        content: impl Into<Content>,
        kind: ItemKind,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            media_type: media_type.into(),
            content: content.into(),
            kind,
            properties: Vec::new(),
        }
    }

    /// 创建HTML章节
    pub fn html(
        id: impl Into<String>,
        file_name: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<Content>,
    ) -> Self {
        let title = title.into();
        let doc = HtmlDoc {
            title: (!title.is_empty()).then_some(title),
            ..HtmlDoc::default()
        };
        Self::new(id, file_name, "application/xhtml+xml", content, ItemKind::Html(doc))
    }

    /// 创建样式表
    pub fn css(id: impl Into<String>, file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, file_name, "text/css", Content::text(content), ItemKind::Css)
    }

    /// 创建图片，媒体类型为空时按扩展名猜测
    pub fn image(
        id: impl Into<String>,
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(id, file_name, media_type, Content::binary(bytes), ItemKind::Image)
    }

    /// 创建封面图片
    pub fn cover(
        id: impl Into<String>,
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(id, file_name, media_type, Content::binary(bytes), ItemKind::Cover)
    }

    /// 创建字体
    pub fn font(
        id: impl Into<String>,
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(id, file_name, media_type, Content::binary(bytes), ItemKind::Font)
    }

    /// 创建NCX占位条目，内容在写出时根据目录重新生成
    pub fn ncx(id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self::new(
            id,
            file_name,
            "application/x-dtbncx+xml",
            Content::text(""),
            ItemKind::Ncx,
        )
    }

    /// 创建导航文档占位条目，内容在写出时根据目录重新生成
    pub fn nav(id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self::new(id, file_name, "application/xhtml+xml", Content::text(""), ItemKind::Nav)
    }

    /// 创建通用二进制条目
    pub fn generic(
        id: impl Into<String>,
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(id, file_name, media_type, Content::binary(bytes), ItemKind::Generic)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn item_type(&self) -> ItemType {
        self.kind.item_type()
    }

    /// HTML专有字段
    pub fn html_doc(&self) -> Option<&HtmlDoc> {
        match &self.kind {
            ItemKind::Html(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn html_doc_mut(&mut self) -> Option<&mut HtmlDoc> {
        match &mut self.kind {
            ItemKind::Html(doc) => Some(doc),
            _ => None,
        }
    }

    /// 追加一个清单属性
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.properties.push(property.into());
        self
    }

    /// 写入包文档的清单属性：种类隐含的属性在前，其余属性按原顺序
    pub fn manifest_properties(&self) -> Vec<String> {
        let implied = match self.kind {
            ItemKind::Nav => Some("nav"),
            ItemKind::Cover => Some("cover-image"),
            _ => None,
        };

        implied
            .map(str::to_string)
            .into_iter()
            .chain(
                self.properties
                    .iter()
                    .filter(|p| Some(p.as_str()) != implied)
                    .cloned(),
            )
            .collect()
    }

    /// 输出条目写入归档时的字节
    ///
    /// 文本按声明的编码输出；HTML正文片段先包装为完整文档（XML声明写明条目自己的编码），
    /// 未设置的标题、语言和方向取自 `defaults`。
    pub fn render(&self, defaults: &RenderDefaults<'_>) -> Result<Vec<u8>> {
        let (doc, body, encoding) = match (&self.kind, &self.content) {
            (ItemKind::Html(doc), Content::Text { text, encoding }) if !html::is_document(text) => {
                (doc, text, *encoding)
            }
            _ => return Ok(self.content.encode()),
        };

        let template = html::ChapterTemplate {
            title: doc.title.as_deref().or(defaults.title),
            language: doc.language.as_deref().or(defaults.language),
            direction: doc.direction.as_deref().or(defaults.direction),
            stylesheets: &doc.stylesheets,
            encoding: if encoding == UTF_8 { "utf-8" } else { encoding.name() },
            page: defaults.template,
        };
        let wrapped = html::wrap_fragment(body, &template)?;
        Ok(content::encode_with(&wrapped, encoding))
    }

    /// HTML章节 `<body>` 的内部HTML，非HTML条目返回None
    pub fn body_content(&self) -> Option<String> {
        match self.kind {
            ItemKind::Html(_) => Some(html::body_content(&self.content.to_text_lossy())),
            _ => None,
        }
    }

    /// 文档中的全部超链接，非HTML条目返回空集
    pub fn get_links(&self) -> BTreeSet<HtmlLink> {
        match self.kind {
            ItemKind::Html(_) | ItemKind::Nav => html::links(&self.content.to_text_lossy()),
            _ => BTreeSet::new(),
        }
    }

    /// 文档中可作为片段目标的id，非HTML条目返回空集
    pub fn anchor_ids(&self) -> BTreeSet<String> {
        match self.kind {
            ItemKind::Html(_) | ItemKind::Nav => html::anchor_ids(&self.content.to_text_lossy()),
            _ => BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_constructor() {
        let item = Item::html("chapter_1", "chap_01.xhtml", "Intro", "<h1>Intro heading</h1>");
        assert_eq!(item.item_type(), ItemType::Html);
        assert_eq!(item.media_type(), "application/xhtml+xml");
        assert_eq!(item.html_doc().unwrap().title.as_deref(), Some("Intro"));
    }

    #[test]
    fn test_render_wraps_fragment_with_defaults() {
        let mut item = Item::html("c1", "c1.xhtml", "", "<h1>Intro heading</h1>");
        item.html_doc_mut().unwrap().direction = Some("rtl".to_string());

        let defaults = RenderDefaults {
            title: Some("Sample book"),
            language: Some("en"),
            direction: Some("ltr"),
            template: None,
        };
        let rendered = String::from_utf8(item.render(&defaults).unwrap()).unwrap();

        assert!(rendered.contains(r#"lang="en""#));
        assert!(rendered.contains(r#"dir="rtl""#));
        assert!(rendered.contains("<title>Sample book</title>"));
        assert!(rendered.contains("<h1>Intro heading</h1>"));
    }

    #[test]
    fn test_render_fragment_in_legacy_encoding() {
        let content = Content::text_with_encoding("<p>caf\u{e9}</p>", "windows-1252").unwrap();
        let item = Item::html("c1", "c1.xhtml", "Caf\u{e9}", content);
        let bytes = item.render(&RenderDefaults::default()).unwrap();

        assert!(bytes.starts_with(br#"<?xml version="1.0" encoding="windows-1252"?>"#));
        assert!(bytes.windows(2).any(|w| w == b"f\xe9"));

        let decoded = Content::decode(bytes);
        let text = decoded.as_text().unwrap();
        assert!(text.contains("<p>caf\u{e9}</p>"));
        assert!(matches!(decoded, Content::Text { encoding, .. } if encoding.name() == "windows-1252"));
    }

    #[test]
    fn test_render_with_page_template() {
        let page = PageTemplate::parse(r#"<html xmlns:ibooks="urn:ibooks"><head><style>p{}</style></head></html>"#).unwrap();
        let defaults = RenderDefaults {
            template: Some(&page),
            ..RenderDefaults::default()
        };
        let item = Item::html("c1", "c1.xhtml", "One", "<p>x</p>");
        let rendered = String::from_utf8(item.render(&defaults).unwrap()).unwrap();
        assert!(rendered.contains(r#"xmlns:ibooks="urn:ibooks""#));
        assert!(rendered.contains("<style>p{}</style>"));
    }

    #[test]
    fn test_body_content() {
        let doc = "<html><head><title>x</title></head><body><h1>Intro heading</h1></body></html>";
        let item = Item::html("c1", "c1.xhtml", "", doc);
        assert_eq!(item.body_content().as_deref(), Some("<h1>Intro heading</h1>"));
        assert_eq!(Item::css("s", "s.css", "p {}").body_content(), None);
    }

    #[test]
    fn test_render_passes_complete_document() {
        let doc = "<html><head><title>x</title></head><body/></html>";
        let item = Item::html("c1", "c1.xhtml", "", doc);
        assert_eq!(item.render(&RenderDefaults::default()).unwrap(), doc.as_bytes());
    }

    #[test]
    fn test_render_binary_passthrough() {
        let item = Item::image("img", "a.png", "image/png", vec![0x89, b'P', b'N', b'G']);
        assert_eq!(
            item.render(&RenderDefaults::default()).unwrap(),
            vec![0x89, b'P', b'N', b'G']
        );
    }

    #[test]
    fn test_manifest_properties() {
        let nav = Item::nav("nav", "nav.xhtml").with_property("scripted");
        assert_eq!(nav.manifest_properties(), vec!["nav", "scripted"]);

        let cover = Item::cover("cover-img", "cover.jpg", "image/jpeg", vec![]).with_property("cover-image");
        assert_eq!(cover.manifest_properties(), vec!["cover-image"]);

        assert!(Item::css("style", "style.css", "").manifest_properties().is_empty());
    }

    #[test]
    fn test_links_only_for_documents() {
        let html = Item::html("c1", "c1.xhtml", "", r#"<p><a href="c2.xhtml#a">next</a></p>"#);
        assert_eq!(html.get_links().len(), 1);

        let css = Item::css("s", "s.css", r#"a[href] { color: red }"#);
        assert!(css.get_links().is_empty());
    }
}
