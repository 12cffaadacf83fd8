//! OPF写出模块
//!
//! 元数据按声明顺序写出，清单按插入顺序写出，`linear` 为真时省略。

use crate::epub::config::WriterOptions;
use crate::epub::error::{EpubError, Result};
use crate::epub::opf::metadata::MetadataValue;
use crate::epub::opf::package::Package;
use crate::epub::path;
use crate::epub::xml::{self, XmlWriter};
use quick_xml::events::{BytesEnd, BytesStart, Event};

pub const OPF_NAMESPACE: &str = "http://www.idpf.org/2007/opf";
pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

/// 生成包文档
///
/// # 参数
/// * `package` - 已通过校验的包
/// * `ncx_id` - 写出NCX时其清单ID，用于 spine/@toc
/// * `options` - 写出选项
pub fn render(package: &Package, ncx_id: Option<&str>, options: &WriterOptions) -> Result<Vec<u8>> {
    let mut writer = xml::new_writer()?;
    let version = package.version.to_string();
    let epub3 = package.version.is_epub3();

    let mut root = BytesStart::new("package");
    root.push_attribute(("xmlns", OPF_NAMESPACE));
    root.push_attribute(("unique-identifier", package.unique_identifier_id()));
    root.push_attribute(("version", version.as_str()));
    let prefix = package
        .prefixes
        .iter()
        .map(|(name, uri)| format!("{}: {}", name, uri))
        .collect::<Vec<_>>()
        .join(" ");
    if epub3 && !prefix.is_empty() {
        root.push_attribute(("prefix", prefix.as_str()));
    }
    if options.package_direction {
        if let Some(direction) = package.direction {
            root.push_attribute(("dir", direction.as_str()));
        }
    }
    writer.write_event(Event::Start(root))?;

    write_metadata(&mut writer, package)?;
    write_manifest(&mut writer, package, epub3)?;
    write_spine(&mut writer, package, ncx_id, options, epub3)?;
    if options.epub2_guide && !package.guide.is_empty() {
        write_guide(&mut writer, package)?;
    }

    writer.write_event(Event::End(BytesEnd::new("package")))?;
    Ok(xml::finish(writer))
}

fn write_metadata(writer: &mut XmlWriter, package: &Package) -> Result<()> {
    let mut metadata = BytesStart::new("metadata");
    metadata.push_attribute(("xmlns:dc", DC_NAMESPACE));
    metadata.push_attribute(("xmlns:opf", OPF_NAMESPACE));
    writer.write_event(Event::Start(metadata))?;

    let metadata = package.metadata.to_dialect(package.version.is_epub3());
    for entry in metadata.entries() {
        match entry {
            MetadataValue::DublinCore {
                element,
                value,
                attributes,
            } => {
                let attrs = borrowed(attributes);
                xml::write_text_element(writer, &element.qualified_name(), &attrs, value)?;
            }
            MetadataValue::Meta(meta) => {
                let attrs = borrowed(&meta.attributes);
                match meta.content.as_deref() {
                    Some(content) => xml::write_text_element(writer, "meta", &attrs, content)?,
                    None => xml::write_empty_element(writer, "meta", &attrs)?,
                }
            }
        }
    }

    writer.write_event(Event::End(BytesEnd::new("metadata")))?;
    Ok(())
}

fn write_manifest(writer: &mut XmlWriter, package: &Package, epub3: bool) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("manifest")))?;

    for item in package.items() {
        let href = path::encode_href(item.file_name());
        let properties = item.manifest_properties().join(" ");

        let mut attrs = vec![
            ("id", item.id()),
            ("href", href.as_str()),
            ("media-type", item.media_type()),
        ];
        if epub3 && !properties.is_empty() {
            attrs.push(("properties", properties.as_str()));
        }
        xml::write_empty_element(writer, "item", &attrs)?;
    }

    writer.write_event(Event::End(BytesEnd::new("manifest")))?;
    Ok(())
}

fn write_spine(
    writer: &mut XmlWriter,
    package: &Package,
    ncx_id: Option<&str>,
    options: &WriterOptions,
    epub3: bool,
) -> Result<()> {
    let mut spine = BytesStart::new("spine");
    if let Some(ncx_id) = ncx_id {
        spine.push_attribute(("toc", ncx_id));
    }
    if options.spine_direction {
        if let Some(direction) = package.direction {
            spine.push_attribute(("page-progression-direction", direction.as_str()));
        }
    }
    writer.write_event(Event::Start(spine))?;

    for itemref in &package.spine {
        let properties = itemref.properties.join(" ");
        let mut attrs = vec![("idref", itemref.idref.as_str())];
        if !itemref.linear {
            attrs.push(("linear", "no"));
        }
        if epub3 && !properties.is_empty() {
            attrs.push(("properties", properties.as_str()));
        }
        xml::write_empty_element(writer, "itemref", &attrs)?;
    }

    writer.write_event(Event::End(BytesEnd::new("spine")))?;
    Ok(())
}

fn write_guide(writer: &mut XmlWriter, package: &Package) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("guide")))?;

    for reference in &package.guide {
        let item = package
            .get_item_with_id(&reference.item_id)
            .ok_or_else(|| EpubError::unresolved("guide", reference.item_id.clone()))?;
        let mut href = path::encode_href(item.file_name());
        if let Some(fragment) = &reference.fragment {
            href.push('#');
            href.push_str(fragment);
        }
        xml::write_empty_element(
            writer,
            "reference",
            &[
                ("type", reference.kind.as_str()),
                ("title", reference.title.as_str()),
                ("href", href.as_str()),
            ],
        )?;
    }

    writer.write_event(Event::End(BytesEnd::new("guide")))?;
    Ok(())
}

fn borrowed(attributes: &[(String, String)]) -> Vec<(&str, &str)> {
    attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::item::Item;
    use crate::epub::opf::guide::GuideReference;
    use crate::epub::opf::package::{Direction, EpubVersion};
    use crate::epub::opf::parser::PackageDocument;
    use crate::epub::opf::spine::SpineItem;

    fn package() -> Package {
        let mut package = Package::new();
        package.set_unique_identifier("id123456", None);
        package.set_title("Sample book");
        package.set_language("en");
        package.add_author("Jane Doe", None, Some("aut"));
        package.add_item(Item::nav("nav", "nav.xhtml").with_property("scripted")).unwrap();
        package
            .add_item(Item::html("chapter_1", "text/chap 01.xhtml", "", "<p/>"))
            .unwrap();
        package.set_spine([SpineItem::with_linear("nav", false), SpineItem::new("chapter_1")]);
        package.guide.push(GuideReference::new("text", "Start", "chapter_1").with_fragment("top"));
        package.direction = Some(Direction::Rtl);
        package.add_prefix("rendition", "http://www.idpf.org/vocab/rendition/#");
        package
    }

    #[test]
    fn test_render_epub3() {
        let opf = String::from_utf8(render(&package(), None, &WriterOptions::default()).unwrap()).unwrap();

        assert!(opf.contains(r#"unique-identifier="id" version="3.0""#));
        assert!(opf.contains(r#"prefix="rendition: http://www.idpf.org/vocab/rendition/#""#));
        assert!(!opf.contains(r#"dir="rtl""#));
        assert!(opf.contains(r#"<dc:identifier id="id">id123456</dc:identifier>"#));
        assert!(opf.contains(r##"<meta refines="#creator" property="role" scheme="marc:relators">aut</meta>"##));
        assert!(opf.contains(r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav scripted"/>"#));
        assert!(opf.contains(r#"href="text/chap%2001.xhtml""#));
        assert!(opf.contains(r#"<spine page-progression-direction="rtl">"#));
        assert!(opf.contains(r#"<itemref idref="nav" linear="no"/>"#));
        assert!(opf.contains(r#"<itemref idref="chapter_1"/>"#));
        assert!(opf.contains(r##"<reference type="text" title="Start" href="text/chap%2001.xhtml#top"/>"##));
    }

    #[test]
    fn test_render_epub2_omits_epub3_attributes() {
        let mut package = package();
        package.version = EpubVersion::V2;
        let options = WriterOptions {
            epub2_guide: false,
            ..WriterOptions::default()
        };
        let opf = String::from_utf8(render(&package, Some("ncx"), &options).unwrap()).unwrap();

        assert!(opf.contains(r#"version="2.0""#));
        assert!(!opf.contains("prefix="));
        assert!(!opf.contains("properties="));
        assert!(opf.contains(r#"<spine toc="ncx" page-progression-direction="rtl">"#));
        assert!(!opf.contains("<guide>"));
    }

    #[test]
    fn test_render_then_parse() {
        let package = package();
        let bytes = render(&package, None, &WriterOptions::default()).unwrap();
        let doc = PackageDocument::parse(&String::from_utf8(bytes).unwrap(), "EPUB/content.opf").unwrap();

        assert_eq!(doc.metadata, package.metadata);
        assert_eq!(doc.spine, package.spine);
        assert_eq!(doc.manifest[1].href, "text/chap 01.xhtml");
        assert_eq!(doc.manifest[0].properties, vec!["nav", "scripted"]);
        assert_eq!(doc.prefixes, package.prefixes);
    }
}
