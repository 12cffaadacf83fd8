//! NCX（Navigation Control file for XML）读写
//!
//! 写出时从展开后的目录序列生成 `navMap`，读取时按 `navPoint` 嵌套重建目录森林。

use crate::epub::error::{EpubError, Result};
use crate::epub::path;
use crate::epub::toc::entry::{self, TocEntry, TocTarget};
use crate::epub::xml;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;

pub const NCX_NAMESPACE: &str = "http://www.daisy.org/z3986/2005/ncx/";

/// 只用于分组、没有自身目标的导航点所带的class
pub const SECTION_CLASS: &str = "section";

/// 带有自身目标、但没有子条目的分组所带的class（NCX的navPoint和导航文档的li）
pub const HEADING_CLASS: &str = "heading";

/// 生成NCX所需的包级信息
#[derive(Debug, Clone, Copy)]
pub struct NcxContext<'a> {
    /// 唯一标识符的值（dtb:uid）
    pub uid: &'a str,
    /// 书名（docTitle）
    pub title: &'a str,
    /// NCX文件所在目录（相对于包文档目录）
    pub base_dir: &'a str,
    /// 没有任何后代目标的分组使用的src
    pub fallback_src: &'a str,
}

/// 生成NCX文档
pub fn render(ctx: &NcxContext<'_>, forest: &[TocEntry]) -> Result<Vec<u8>> {
    let mut writer = xml::new_writer()?;

    let mut ncx = BytesStart::new("ncx");
    ncx.push_attribute(("xmlns", NCX_NAMESPACE));
    ncx.push_attribute(("version", "2005-1"));
    writer.write_event(Event::Start(ncx))?;

    writer.write_event(Event::Start(BytesStart::new("head")))?;
    let depth = entry::depth(forest).max(1).to_string();
    for (name, content) in [
        ("dtb:uid", ctx.uid),
        ("dtb:depth", depth.as_str()),
        ("dtb:totalPageCount", "0"),
        ("dtb:maxPageNumber", "0"),
    ] {
        xml::write_empty_element(&mut writer, "meta", &[("name", name), ("content", content)])?;
    }
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    writer.write_event(Event::Start(BytesStart::new("docTitle")))?;
    xml::write_text_element(&mut writer, "text", &[], ctx.title)?;
    writer.write_event(Event::End(BytesEnd::new("docTitle")))?;

    writer.write_event(Event::Start(BytesStart::new("navMap")))?;

    let mut open = 0usize;
    for (play_order, (depth, entry)) in entry::flatten(forest).into_iter().enumerate() {
        while open > depth {
            writer.write_event(Event::End(BytesEnd::new("navPoint")))?;
            open -= 1;
        }

        let id = format!("navpoint-{}", play_order + 1);
        let order = (play_order + 1).to_string();
        let mut nav_point = BytesStart::new("navPoint");
        nav_point.push_attribute(("id", id.as_str()));
        if entry.target().is_none() {
            nav_point.push_attribute(("class", SECTION_CLASS));
        } else if entry.is_childless_section() {
            nav_point.push_attribute(("class", HEADING_CLASS));
        }
        nav_point.push_attribute(("playOrder", order.as_str()));
        writer.write_event(Event::Start(nav_point))?;

        writer.write_event(Event::Start(BytesStart::new("navLabel")))?;
        xml::write_text_element(&mut writer, "text", &[], entry.label())?;
        writer.write_event(Event::End(BytesEnd::new("navLabel")))?;

        let src = match entry.first_target() {
            Some(target) => target_src(ctx.base_dir, target),
            None => ctx.fallback_src.to_string(),
        };
        xml::write_empty_element(&mut writer, "content", &[("src", src.as_str())])?;
        open += 1;
    }
    while open > 0 {
        writer.write_event(Event::End(BytesEnd::new("navPoint")))?;
        open -= 1;
    }

    writer.write_event(Event::End(BytesEnd::new("navMap")))?;
    writer.write_event(Event::End(BytesEnd::new("ncx")))?;

    Ok(xml::finish(writer))
}

/// 目标相对于目录文件所在目录的引用
pub(crate) fn target_src(base_dir: &str, target: &TocTarget) -> String {
    let file = path::encode_href(&path::relative(base_dir, &target.href));
    match &target.anchor {
        Some(anchor) => format!("{}#{}", file, anchor),
        None => file,
    }
}

/// 把目录文件中的引用解析为相对于包文档目录的目标
pub(crate) fn resolve_src(base_dir: &str, src: &str) -> TocTarget {
    let (file, anchor) = path::split_fragment(src);
    TocTarget {
        href: path::join(base_dir, &path::decode_href(file)),
        anchor: anchor.filter(|a| !a.is_empty()).map(str::to_string),
    }
}

/// 解析中的导航点
#[derive(Default)]
struct PendingPoint {
    label: String,
    src: Option<String>,
    section: bool,
    heading: bool,
    children: Vec<TocEntry>,
}

/// 解析NCX文档
///
/// # 参数
/// * `content` - NCX文件内容
/// * `file_path` - NCX在归档中的路径，用于错误信息
/// * `base_dir` - NCX所在目录（相对于包文档目录）
///
/// # 返回值
/// * `Result<Vec<TocEntry>>` - 目录森林，引用已解析为相对于包文档目录的路径
pub fn parse(content: &str, file_path: &str, base_dir: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    reader.config_mut().expand_empty_elements = true;

    let mut buf = Vec::new();
    let mut roots = Vec::new();
    let mut stack: Vec<PendingPoint> = Vec::new();
    let mut saw_root = false;
    let mut in_nav_map = false;
    let mut in_label = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match xml::local_name(e).as_str() {
                "ncx" => saw_root = true,
                "navMap" => in_nav_map = true,
                "navPoint" if in_nav_map => {
                    stack.push(PendingPoint {
                        section: has_class(e, SECTION_CLASS)?,
                        heading: has_class(e, HEADING_CLASS)?,
                        ..PendingPoint::default()
                    });
                }
                "navLabel" if in_nav_map => in_label = true,
                "content" if in_nav_map => {
                    let src = xml::attribute(e, b"src")?.ok_or_else(|| {
                        EpubError::malformed_toc(file_path, "content元素缺少src属性")
                    })?;
                    let point = stack.last_mut().ok_or_else(|| {
                        EpubError::malformed_toc(file_path, "content元素不在navPoint内")
                    })?;
                    point.src = Some(src);
                }
                _ => {}
            },
            Event::Text(ref e) if in_label => {
                if let Some(point) = stack.last_mut() {
                    point.label.push_str(&xml::text(e)?);
                }
            }
            Event::End(ref e) => match xml::end_local_name(e).as_str() {
                "navMap" => in_nav_map = false,
                "navLabel" => in_label = false,
                "navPoint" if in_nav_map => {
                    let point = stack.pop().ok_or_else(|| {
                        EpubError::malformed_toc(file_path, "navPoint嵌套不匹配")
                    })?;
                    let entry = finish_point(point, file_path, base_dir)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(entry),
                        None => roots.push(entry),
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(EpubError::malformed_toc(file_path, "缺少ncx根元素"));
    }

    Ok(roots)
}

/// 元素的class属性是否包含 `wanted`
pub(crate) fn has_class(e: &BytesStart, wanted: &str) -> Result<bool> {
    Ok(xml::attribute(e, b"class")?
        .map(|class| class.split_whitespace().any(|c| c == wanted))
        .unwrap_or(false))
}

fn finish_point(point: PendingPoint, file_path: &str, base_dir: &str) -> Result<TocEntry> {
    let label = xml::collapse_whitespace(&point.label);
    let src = point
        .src
        .ok_or_else(|| EpubError::malformed_toc(file_path, format!("导航点 '{}' 缺少content", label)))?;

    if point.section {
        return Ok(TocEntry::Section {
            label,
            target: None,
            children: point.children,
        });
    }

    let target = resolve_src(base_dir, &src);
    if point.children.is_empty() && !point.heading {
        Ok(TocEntry::Link { label, target })
    } else {
        Ok(TocEntry::Section {
            label,
            target: Some(target),
            children: point.children,
        })
    }
}
