//! XHTML内容文档的辅助函数
//!
//! 解析侧使用 scraper 提取标题、语言和链接，写出侧使用 quick-xml 生成章节模板。

use crate::epub::error::{EpubError, Result};
use crate::epub::xml;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use scraper::{Html, Selector};
use std::collections::BTreeSet;

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("静态选择器"));
static HTML_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("html").expect("静态选择器"));
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("静态选择器"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("静态选择器"));
static ID_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("[id]").expect("静态选择器"));
static NAMED_ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[name]").expect("静态选择器"));

/// 文档中的一个超链接
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HtmlLink {
    /// 链接目标（原样保留，可能带片段）
    pub href: String,
    /// `<a>` 元素自身的id
    pub id: Option<String>,
}

/// 判断文本是否为完整的HTML文档（而不是正文片段）
pub(crate) fn is_document(text: &str) -> bool {
    text.to_ascii_lowercase().contains("<html")
}

/// 由写出器生成的根元素属性，模板中的同名属性被忽略
const GENERATED_ROOT_ATTRIBUTES: [&str; 5] = ["xmlns", "xmlns:epub", "lang", "xml:lang", "dir"];

/// 调用方提供的页面模板
///
/// 模板是一份XHTML文档：根元素 `<html>` 上的属性（如额外的命名空间、`epub:prefix`）
/// 和 `<head>` 中除 `<title>` 以外的内容会出现在每个包装后的章节中。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageTemplate {
    root_attributes: Vec<(String, String)>,
    head: Vec<Event<'static>>,
}

impl PageTemplate {
    /// 解析模板
    ///
    /// # 返回值
    /// * `Result<PageTemplate>` - 模板不是合法XML时返回 `XmlError`，缺少 `<html>` 根元素时返回 `ConfigError`
    pub fn parse(source: &str) -> Result<Self> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(true);

        let mut template = PageTemplate::default();
        let mut saw_root = false;
        // head内的元素嵌套层数，0表示不在head内
        let mut head_depth = 0usize;
        // 被跳过的title内的嵌套层数
        let mut skip_depth = 0usize;

        loop {
            let event = reader.read_event()?;
            match event {
                Event::Eof => break,
                Event::Start(ref e) | Event::Empty(ref e) if !saw_root => {
                    if xml::local_name(e) == "html" {
                        saw_root = true;
                        template.root_attributes = xml::attributes(e)?
                            .into_iter()
                            .filter(|(key, _)| !GENERATED_ROOT_ATTRIBUTES.contains(&key.as_str()))
                            .collect();
                    }
                }
                _ if !saw_root => {}
                Event::Start(ref e) if head_depth == 0 => {
                    if xml::local_name(e) == "head" {
                        head_depth = 1;
                    }
                }
                _ if head_depth == 0 => {}
                Event::Start(ref e) if skip_depth > 0 || xml::local_name(e) == "title" => {
                    skip_depth += 1;
                }
                Event::End(_) if skip_depth > 0 => skip_depth -= 1,
                _ if skip_depth > 0 => {}
                Event::Empty(ref e) if xml::local_name(e) == "title" => {}
                Event::Start(_) => {
                    head_depth += 1;
                    template.head.push(event.into_owned());
                }
                Event::End(_) => {
                    head_depth -= 1;
                    if head_depth == 0 {
                        break;
                    }
                    template.head.push(event.into_owned());
                }
                _ => template.head.push(event.into_owned()),
            }
        }

        if !saw_root {
            return Err(EpubError::ConfigError("章节模板缺少html根元素".to_string()));
        }
        Ok(template)
    }
}

/// 章节模板的参数
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChapterTemplate<'a> {
    pub title: Option<&'a str>,
    pub language: Option<&'a str>,
    pub direction: Option<&'a str>,
    pub stylesheets: &'a [String],
    /// 写入XML声明的字符编码名称
    pub encoding: &'a str,
    pub page: Option<&'a PageTemplate>,
}

/// 把正文片段包装为完整的XHTML文档
pub(crate) fn wrap_fragment(body: &str, template: &ChapterTemplate<'_>) -> Result<String> {
    let mut writer = xml::new_writer_with_encoding(template.encoding)?;
    writer.write_event(Event::DocType(BytesText::from_escaped("html")))?;

    let mut html = BytesStart::new("html");
    html.push_attribute(("xmlns", "http://www.w3.org/1999/xhtml"));
    html.push_attribute(("xmlns:epub", "http://www.idpf.org/2007/ops"));
    if let Some(page) = template.page {
        for (key, value) in &page.root_attributes {
            html.push_attribute((key.as_str(), value.as_str()));
        }
    }
    if let Some(language) = template.language {
        html.push_attribute(("lang", language));
        html.push_attribute(("xml:lang", language));
    }
    if let Some(direction) = template.direction {
        html.push_attribute(("dir", direction));
    }
    writer.write_event(Event::Start(html))?;

    writer.write_event(Event::Start(BytesStart::new("head")))?;
    xml::write_text_element(&mut writer, "title", &[], template.title.unwrap_or_default())?;
    for stylesheet in template.stylesheets {
        xml::write_empty_element(
            &mut writer,
            "link",
            &[("href", stylesheet.as_str()), ("rel", "stylesheet"), ("type", "text/css")],
        )?;
    }
    if let Some(page) = template.page {
        for event in &page.head {
            writer.write_event(event.clone())?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::Text(BytesText::from_escaped(body.trim())))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("html")))?;

    Ok(String::from_utf8_lossy(&xml::finish(writer)).into_owned())
}

/// 封面页的正文片段
pub(crate) fn cover_body(image_href: &str, alt: &str) -> Result<String> {
    let mut writer = quick_xml::Writer::new(std::io::Cursor::new(Vec::new()));

    let mut div = BytesStart::new("div");
    div.push_attribute(("id", "cover-image"));
    writer.write_event(Event::Start(div))?;
    xml::write_empty_element(
        &mut writer,
        "img",
        &[("src", image_href), ("alt", alt), ("style", "height:100%")],
    )?;
    writer.write_event(Event::End(BytesEnd::new("div")))?;

    Ok(String::from_utf8_lossy(&xml::finish(writer)).into_owned())
}

/// 提取 `<title>` 文本
pub(crate) fn extract_title(text: &str) -> Option<String> {
    let document = Html::parse_document(text);
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|title| xml::collapse_whitespace(&title.text().collect::<String>()))
        .filter(|title| !title.is_empty())
}

/// 提取根元素上的语言声明
pub(crate) fn extract_language(text: &str) -> Option<String> {
    let document = Html::parse_document(text);
    let html = document.select(&HTML_SELECTOR).next()?;
    html.value()
        .attr("lang")
        .or_else(|| html.value().attr("xml:lang"))
        .map(str::to_string)
        .filter(|lang| !lang.is_empty())
}

/// `<body>` 元素的内部HTML，正文片段按片段本身处理
pub(crate) fn body_content(text: &str) -> String {
    let document = Html::parse_document(text);
    document
        .select(&BODY_SELECTOR)
        .next()
        .map(|body| body.inner_html().trim().to_string())
        .unwrap_or_default()
}

/// 收集文档中全部 `<a href>` 链接
pub(crate) fn links(text: &str) -> BTreeSet<HtmlLink> {
    let document = Html::parse_fragment(text);
    document
        .select(&LINK_SELECTOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(HtmlLink {
                href: href.to_string(),
                id: a.value().id().map(str::to_string),
            })
        })
        .collect()
}

/// 收集文档中可作为片段目标的全部id
pub(crate) fn anchor_ids(text: &str) -> BTreeSet<String> {
    let document = Html::parse_fragment(text);
    let mut ids: BTreeSet<String> = document
        .select(&ID_SELECTOR)
        .filter_map(|element| element.value().id().map(str::to_string))
        .collect();
    ids.extend(
        document
            .select(&NAMED_ANCHOR_SELECTOR)
            .filter_map(|a| a.value().attr("name").map(str::to_string)),
    );
    ids
}
