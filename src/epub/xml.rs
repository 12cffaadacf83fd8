//! XML读写的公共辅助函数
//!
//! 读取侧统一使用 quick-xml 的事件流，写出侧统一使用带缩进的 `Writer`。

use crate::epub::error::Result;
use quick_xml::Writer;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

/// 内存中的XML写出器
pub(crate) type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// 收集元素的全部属性，键保留限定名（如 `opf:scheme`、`xml:lang`）
pub(crate) fn attributes(e: &BytesStart) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr_result in e.attributes() {
        let attr = attr_result?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()?.to_string();
        attrs.push((key, value));
    }
    Ok(attrs)
}

/// 按本地名查找属性值
pub(crate) fn attribute(e: &BytesStart, local_name: &[u8]) -> Result<Option<String>> {
    for attr_result in e.attributes() {
        let attr = attr_result?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

/// 元素的本地名（去掉命名空间前缀）
pub(crate) fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

/// 元素的本地名（结束标签）
pub(crate) fn end_local_name(e: &BytesEnd) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

/// 解码文本节点：XML预定义实体之外，额外识别XHTML中常见的命名实体
pub(crate) fn text(e: &BytesText) -> Result<String> {
    let decoded = e.unescape_with(|entity| match entity {
        "nbsp" => Some("\u{a0}"),
        "ensp" => Some("\u{2002}"),
        "emsp" => Some("\u{2003}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        "copy" => Some("\u{a9}"),
        _ => resolve_predefined_entity(entity),
    })?;
    Ok(decoded.to_string())
}

/// 把连续的ASCII空白折叠为单个空格，不间断空格保留
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

/// 创建带XML声明的写出器
pub(crate) fn new_writer() -> Result<XmlWriter> {
    new_writer_with_encoding("utf-8")
}

/// 创建写出器，XML声明中写明 `encoding`
pub(crate) fn new_writer_with_encoding(encoding: &str) -> Result<XmlWriter> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some(encoding), None)))?;
    Ok(writer)
}

/// 取出写出器中的字节
pub(crate) fn finish(writer: XmlWriter) -> Vec<u8> {
    writer.into_inner().into_inner()
}

/// 写出 `<name attrs...>text</name>`
pub(crate) fn write_text_element(
    writer: &mut XmlWriter,
    name: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    for attr in attrs {
        start.push_attribute(*attr);
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// 写出空元素 `<name attrs.../>`
pub(crate) fn write_empty_element(
    writer: &mut XmlWriter,
    name: &str,
    attrs: &[(&str, &str)],
) -> Result<()> {
    let mut start = BytesStart::new(name);
    for attr in attrs {
        start.push_attribute(*attr);
    }
    writer.write_event(Event::Empty(start))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::reader::Reader;

    #[test]
    fn test_attributes_keep_qualified_names() {
        let mut reader = Reader::from_str(r#"<dc:identifier id="uid" opf:scheme="ISBN &amp; co"/>"#);
        let mut buf = Vec::new();
        match reader.read_event_into(&mut buf).unwrap() {
            Event::Empty(ref e) => {
                let attrs = attributes(e).unwrap();
                assert_eq!(attrs[0], ("id".to_string(), "uid".to_string()));
                assert_eq!(attrs[1], ("opf:scheme".to_string(), "ISBN & co".to_string()));
                assert_eq!(attribute(e, b"scheme").unwrap(), Some("ISBN & co".to_string()));
                assert_eq!(local_name(e), "identifier");
            }
            other => panic!("意外的事件: {:?}", other),
        }
    }

    #[test]
    fn test_text_resolves_xhtml_entities() {
        let mut reader = Reader::from_str("<a>Part&nbsp;One &amp; Two</a>");
        let mut buf = Vec::new();
        let mut found = String::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Text(e) => found.push_str(&text(&e).unwrap()),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        assert_eq!(found, "Part\u{a0}One & Two");
    }

    #[test]
    fn test_text_resolves_predefined_entities() {
        let mut reader = Reader::from_str("<t>&lt;b&gt; &quot;Q&quot; &apos;A&apos; &amp; &#38; &#x3C;</t>");
        let mut buf = Vec::new();
        let mut found = String::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Text(e) => found.push_str(&text(&e).unwrap()),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        assert_eq!(found, "<b> \"Q\" 'A' & & <");
    }

    #[test]
    fn test_unknown_entity_is_error() {
        let mut reader = Reader::from_str("<t>&bogus;</t>");
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Text(e) => {
                    assert!(text(&e).is_err());
                    break;
                }
                Event::Eof => panic!("没有文本事件"),
                _ => {}
            }
            buf.clear();
        }
    }

    #[test]
    fn test_write_text_element_escapes() {
        let mut writer = new_writer().unwrap();
        write_text_element(&mut writer, "dc:title", &[("id", "t")], "A & B").unwrap();
        let xml = String::from_utf8(finish(writer)).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<dc:title id=\"t\">A &amp; B</dc:title>"));
    }
}
