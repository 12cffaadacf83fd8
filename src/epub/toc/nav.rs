//! EPUB3导航文档读写
//!
//! 写出 `nav[epub:type=toc]` 和可选的 `nav[epub:type=landmarks]`，
//! 读取时只重建第一个toc导航。

use crate::epub::error::{EpubError, Result};
use crate::epub::toc::entry::{self, TocEntry, TocTarget};
use crate::epub::toc::ncx::{HEADING_CLASS, has_class, resolve_src, target_src};
use crate::epub::xml::{self, XmlWriter};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;

/// landmarks中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landmark {
    /// epub:type（如 cover、toc、bodymatter）
    pub kind: String,
    pub title: String,
    pub target: TocTarget,
}

/// 生成导航文档所需的包级信息
#[derive(Debug, Clone, Copy)]
pub struct NavContext<'a> {
    pub title: &'a str,
    pub language: Option<&'a str>,
    /// 导航文档所在目录（相对于包文档目录）
    pub base_dir: &'a str,
    /// landmarks导航的标题
    pub landmark_title: &'a str,
}

/// 生成导航文档
pub fn render(ctx: &NavContext<'_>, forest: &[TocEntry], landmarks: &[Landmark]) -> Result<Vec<u8>> {
    let mut writer = xml::new_writer()?;
    writer.write_event(Event::DocType(BytesText::from_escaped("html")))?;

    let mut html = BytesStart::new("html");
    html.push_attribute(("xmlns", "http://www.w3.org/1999/xhtml"));
    html.push_attribute(("xmlns:epub", "http://www.idpf.org/2007/ops"));
    if let Some(language) = ctx.language {
        html.push_attribute(("lang", language));
        html.push_attribute(("xml:lang", language));
    }
    writer.write_event(Event::Start(html))?;

    writer.write_event(Event::Start(BytesStart::new("head")))?;
    xml::write_text_element(&mut writer, "title", &[], ctx.title)?;
    writer.write_event(Event::End(BytesEnd::new("head")))?;
    writer.write_event(Event::Start(BytesStart::new("body")))?;

    let mut nav = BytesStart::new("nav");
    nav.push_attribute(("epub:type", "toc"));
    nav.push_attribute(("id", "id"));
    nav.push_attribute(("role", "doc-toc"));
    writer.write_event(Event::Start(nav))?;
    xml::write_text_element(&mut writer, "h2", &[], ctx.title)?;
    write_toc_list(&mut writer, ctx.base_dir, forest)?;
    writer.write_event(Event::End(BytesEnd::new("nav")))?;

    if !landmarks.is_empty() {
        let mut nav = BytesStart::new("nav");
        nav.push_attribute(("epub:type", "landmarks"));
        writer.write_event(Event::Start(nav))?;
        xml::write_text_element(&mut writer, "h2", &[], ctx.landmark_title)?;
        writer.write_event(Event::Start(BytesStart::new("ol")))?;
        for landmark in landmarks {
            let href = target_src(ctx.base_dir, &landmark.target);
            writer.write_event(Event::Start(BytesStart::new("li")))?;
            xml::write_text_element(
                &mut writer,
                "a",
                &[("epub:type", landmark.kind.as_str()), ("href", href.as_str())],
                &landmark.title,
            )?;
            writer.write_event(Event::End(BytesEnd::new("li")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("ol")))?;
        writer.write_event(Event::End(BytesEnd::new("nav")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("html")))?;

    Ok(xml::finish(writer))
}

/// 按展开序列写出嵌套的 `<ol><li>`，用打开的 `<li>` 数量跟踪当前深度
fn write_toc_list(writer: &mut XmlWriter, base_dir: &str, forest: &[TocEntry]) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("ol")))?;

    let mut open = 0usize;
    for (depth, entry) in entry::flatten(forest) {
        if open > depth {
            writer.write_event(Event::End(BytesEnd::new("li")))?;
            open -= 1;
            while open > depth {
                writer.write_event(Event::End(BytesEnd::new("ol")))?;
                writer.write_event(Event::End(BytesEnd::new("li")))?;
                open -= 1;
            }
        } else if open == depth && depth > 0 {
            writer.write_event(Event::Start(BytesStart::new("ol")))?;
        }

        let mut li = BytesStart::new("li");
        if entry.is_childless_section() {
            li.push_attribute(("class", HEADING_CLASS));
        }
        writer.write_event(Event::Start(li))?;
        match entry.target() {
            Some(target) => {
                let href = target_src(base_dir, target);
                xml::write_text_element(writer, "a", &[("href", href.as_str())], entry.label())?;
            }
            None => xml::write_text_element(writer, "span", &[], entry.label())?,
        }
        open += 1;
    }

    if open > 0 {
        writer.write_event(Event::End(BytesEnd::new("li")))?;
        open -= 1;
        while open > 0 {
            writer.write_event(Event::End(BytesEnd::new("ol")))?;
            writer.write_event(Event::End(BytesEnd::new("li")))?;
            open -= 1;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("ol")))?;
    Ok(())
}

/// 解析中的列表项
#[derive(Default)]
struct PendingItem {
    label: String,
    href: Option<String>,
    heading: bool,
    children: Vec<TocEntry>,
}

/// 解析导航文档中的toc导航
///
/// # 参数
/// * `content` - 导航文档内容
/// * `file_path` - 导航文档在归档中的路径，用于错误信息
/// * `base_dir` - 导航文档所在目录（相对于包文档目录）
pub fn parse(content: &str, file_path: &str, base_dir: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().expand_empty_elements = true;

    let mut buf = Vec::new();
    let mut roots = Vec::new();
    let mut stack: Vec<PendingItem> = Vec::new();
    let mut found = false;
    // toc导航内部的nav嵌套层数，0表示不在toc导航内
    let mut nav_depth = 0usize;
    // 标签元素（a或span）内部的元素嵌套层数，0表示不在标签内
    let mut label_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = xml::local_name(e);

                if label_depth > 0 {
                    label_depth += 1;
                } else if nav_depth == 0 {
                    if name == "nav" && !found && is_toc_nav(e)? {
                        found = true;
                        nav_depth = 1;
                    }
                } else {
                    match name.as_str() {
                        "nav" => nav_depth += 1,
                        "li" => stack.push(PendingItem {
                            heading: has_class(e, HEADING_CLASS)?,
                            ..PendingItem::default()
                        }),
                        "a" if !stack.is_empty() => {
                            let href = xml::attribute(e, b"href")?.ok_or_else(|| {
                                EpubError::malformed_toc(file_path, "a元素缺少href属性")
                            })?;
                            if let Some(item) = stack.last_mut() {
                                item.href = Some(href);
                            }
                            label_depth = 1;
                        }
                        "span" if !stack.is_empty() => label_depth = 1,
                        _ => {}
                    }
                }
            }
            Event::Text(ref e) if label_depth > 0 => {
                if let Some(item) = stack.last_mut() {
                    item.label.push_str(&xml::text(e)?);
                }
            }
            Event::CData(ref e) if label_depth > 0 => {
                if let Some(item) = stack.last_mut() {
                    item.label.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(ref e) => {
                if label_depth > 0 {
                    label_depth -= 1;
                } else if nav_depth > 0 {
                    match xml::end_local_name(e).as_str() {
                        "nav" => nav_depth -= 1,
                        "li" => {
                            let item = stack.pop().ok_or_else(|| {
                                EpubError::malformed_toc(file_path, "li元素嵌套不匹配")
                            })?;
                            let entry = finish_item(item, base_dir);
                            match stack.last_mut() {
                                Some(parent) => parent.children.push(entry),
                                None => roots.push(entry),
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !found {
        return Err(EpubError::malformed_toc(file_path, "缺少epub:type=\"toc\"的nav元素"));
    }

    Ok(roots)
}

fn is_toc_nav(e: &BytesStart) -> Result<bool> {
    Ok(xml::attribute(e, b"type")?
        .map(|types| types.split_whitespace().any(|t| t == "toc"))
        .unwrap_or(false))
}

fn finish_item(item: PendingItem, base_dir: &str) -> TocEntry {
    let label = xml::collapse_whitespace(&item.label);
    match item.href {
        Some(href) if item.children.is_empty() && !item.heading => TocEntry::Link {
            label,
            target: resolve_src(base_dir, &href),
        },
        Some(href) => TocEntry::Section {
            label,
            target: Some(resolve_src(base_dir, &href)),
            children: item.children,
        },
        None => TocEntry::Section {
            label,
            target: None,
            children: item.children,
        },
    }
}
