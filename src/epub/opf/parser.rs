//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）文件的XML解析功能。解析结果中的路径
//! 已经做过百分号解码和规范化，均相对于包文档所在目录。

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::metadata::{DcElement, MetaValue, Metadata, MetadataValue};
use crate::epub::opf::package::{Direction, EpubVersion};
use crate::epub::opf::spine::SpineItem;
use crate::epub::path;
use crate::epub::xml;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// 清单项信息
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// 项目ID
    pub id: String,
    /// 文件路径(相对于OPF文件所在目录)
    pub href: String,
    /// 媒体类型
    pub media_type: String,
    /// 属性(如nav、cover-image等)
    pub properties: Vec<String>,
}

impl ManifestEntry {
    /// 检查是否包含指定属性
    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }
}

/// guide中的引用，href尚未解析为清单ID
#[derive(Debug, Clone, PartialEq)]
pub struct GuideEntry {
    pub kind: String,
    pub title: String,
    pub href: String,
    pub fragment: Option<String>,
}

/// OPF文件解析结果
#[derive(Debug, Clone)]
pub struct PackageDocument {
    pub version: EpubVersion,
    /// package/@unique-identifier
    pub unique_identifier: Option<String>,
    /// package/@dir
    pub direction: Option<Direction>,
    pub prefixes: Vec<(String, String)>,
    pub metadata: Metadata,
    pub manifest: Vec<ManifestEntry>,
    pub spine: Vec<SpineItem>,
    /// spine/@toc，指向NCX的清单ID
    pub spine_toc: Option<String>,
    /// spine/@page-progression-direction
    pub page_progression: Option<Direction>,
    pub guide: Vec<GuideEntry>,
}

/// 解析所在的区段
#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    None,
    Metadata,
    Manifest,
    Spine,
    Guide,
}

/// metadata中正在读取文本的元素
enum PendingMetadata {
    DublinCore {
        element: DcElement,
        attributes: Vec<(String, String)>,
    },
    Meta {
        attributes: Vec<(String, String)>,
    },
}

impl PackageDocument {
    /// 解析OPF文件内容
    ///
    /// # 参数
    /// * `xml_content` - OPF文件的XML内容
    /// * `opf_path` - OPF在归档中的路径，用于错误信息
    ///
    /// # 返回值
    /// * `Result<PackageDocument>` - 缺少package、version、manifest或spine时返回 `MalformedPackage`
    pub fn parse(xml_content: &str, opf_path: &str) -> Result<PackageDocument> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);
        reader.config_mut().expand_empty_elements = true;

        let mut version = None;
        let mut unique_identifier = None;
        let mut direction = None;
        let mut prefixes = Vec::new();
        let mut metadata = Metadata::new();
        let mut manifest = Vec::new();
        let mut spine = Vec::new();
        let mut spine_toc = None;
        let mut page_progression = None;
        let mut guide = Vec::new();

        let mut saw_package = false;
        let mut saw_manifest = false;
        let mut saw_spine = false;

        let mut buf = Vec::new();
        let mut section = Section::None;
        let mut pending: Option<PendingMetadata> = None;
        let mut text_content = String::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let local_name = xml::local_name(e);

                    match (section, local_name.as_str()) {
                        (_, "package") => {
                            saw_package = true;
                            let raw_version = xml::attribute(e, b"version")?.ok_or_else(|| {
                                EpubError::malformed_package(opf_path, "package元素缺少version属性")
                            })?;
                            version = Some(EpubVersion::parse(&raw_version).ok_or_else(|| {
                                EpubError::malformed_package(
                                    opf_path,
                                    format!("无法识别的版本号: {}", raw_version),
                                )
                            })?);
                            unique_identifier = xml::attribute(e, b"unique-identifier")?;
                            direction = xml::attribute(e, b"dir")?.and_then(|d| Direction::parse(&d));
                            prefixes = xml::attribute(e, b"prefix")?
                                .map(|p| parse_prefixes(&p))
                                .unwrap_or_default();
                        }
                        (_, "metadata") => section = Section::Metadata,
                        (_, "manifest") => {
                            saw_manifest = true;
                            section = Section::Manifest;
                        }
                        (_, "spine") => {
                            saw_spine = true;
                            section = Section::Spine;
                            spine_toc = xml::attribute(e, b"toc")?;
                            page_progression = xml::attribute(e, b"page-progression-direction")?
                                .and_then(|d| Direction::parse(&d));
                        }
                        (_, "guide") => section = Section::Guide,
                        (Section::Metadata, "meta") => {
                            pending = Some(PendingMetadata::Meta {
                                attributes: xml::attributes(e)?,
                            });
                            text_content.clear();
                        }
                        (Section::Metadata, _) if is_dublin_core(e) => {
                            pending = Some(PendingMetadata::DublinCore {
                                element: DcElement::from_local_name(&local_name),
                                attributes: xml::attributes(e)?,
                            });
                            text_content.clear();
                        }
                        (Section::Manifest, "item") => {
                            manifest.push(Self::parse_manifest_item(e, opf_path)?);
                        }
                        (Section::Spine, "itemref") => {
                            spine.push(Self::parse_spine_item(e, opf_path)?);
                        }
                        (Section::Guide, "reference") => {
                            guide.push(Self::parse_guide_reference(e, opf_path)?);
                        }
                        _ => {}
                    }
                }
                Event::Text(ref e) if pending.is_some() => {
                    text_content.push_str(&xml::text(e)?);
                }
                Event::CData(ref e) if pending.is_some() => {
                    text_content.push_str(&String::from_utf8_lossy(e));
                }
                Event::End(ref e) => {
                    let local_name = xml::end_local_name(e);
                    match local_name.as_str() {
                        "metadata" | "manifest" | "spine" | "guide" => section = Section::None,
                        _ if section == Section::Metadata => {
                            if let Some(value) = pending.take() {
                                metadata.push(Self::finish_metadata(value, &text_content));
                                text_content.clear();
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_package {
            return Err(EpubError::malformed_package(opf_path, "缺少package元素"));
        }
        if !saw_manifest {
            return Err(EpubError::malformed_package(opf_path, "缺少manifest元素"));
        }
        if !saw_spine {
            return Err(EpubError::malformed_package(opf_path, "缺少spine元素"));
        }
        let version = version
            .ok_or_else(|| EpubError::malformed_package(opf_path, "package元素缺少version属性"))?;

        Ok(PackageDocument {
            version,
            unique_identifier,
            direction,
            prefixes,
            metadata,
            manifest,
            spine,
            spine_toc,
            page_progression,
            guide,
        })
    }

    /// 组装一条元数据
    fn finish_metadata(pending: PendingMetadata, text_content: &str) -> MetadataValue {
        let text = text_content.trim();
        match pending {
            PendingMetadata::DublinCore {
                element,
                attributes,
            } => MetadataValue::DublinCore {
                element,
                value: text.to_string(),
                attributes,
            },
            PendingMetadata::Meta { attributes } => MetadataValue::Meta(MetaValue {
                attributes,
                content: (!text.is_empty()).then(|| text.to_string()),
            }),
        }
    }

    /// 解析清单项
    fn parse_manifest_item(e: &BytesStart, opf_path: &str) -> Result<ManifestEntry> {
        let required = |name: &[u8], value: Option<String>| {
            value.filter(|v| !v.is_empty()).ok_or_else(|| {
                EpubError::malformed_package(
                    opf_path,
                    format!("item元素缺少{}属性", String::from_utf8_lossy(name)),
                )
            })
        };

        let id = required(b"id", xml::attribute(e, b"id")?)?;
        let href = required(b"href", xml::attribute(e, b"href")?)?;
        let media_type = required(b"media-type", xml::attribute(e, b"media-type")?)?;
        let properties = xml::attribute(e, b"properties")?
            .map(|p| p.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(ManifestEntry {
            id,
            href: path::join("", &path::decode_href(&href)),
            media_type,
            properties,
        })
    }

    /// 解析脊柱项
    fn parse_spine_item(e: &BytesStart, opf_path: &str) -> Result<SpineItem> {
        let idref = xml::attribute(e, b"idref")?
            .filter(|idref| !idref.is_empty())
            .ok_or_else(|| EpubError::malformed_package(opf_path, "itemref元素缺少idref属性"))?;

        let mut item = SpineItem::new(idref);
        item.linear = xml::attribute(e, b"linear")?.as_deref() != Some("no");
        item.properties = xml::attribute(e, b"properties")?
            .map(|p| p.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        Ok(item)
    }

    /// 解析guide引用
    fn parse_guide_reference(e: &BytesStart, opf_path: &str) -> Result<GuideEntry> {
        let href = xml::attribute(e, b"href")?
            .ok_or_else(|| EpubError::malformed_package(opf_path, "reference元素缺少href属性"))?;
        let (file, fragment) = path::split_fragment(&href);

        Ok(GuideEntry {
            kind: xml::attribute(e, b"type")?.unwrap_or_default(),
            title: xml::attribute(e, b"title")?.unwrap_or_default(),
            href: path::join("", &path::decode_href(file)),
            fragment: fragment.filter(|f| !f.is_empty()).map(str::to_string),
        })
    }

    /// 导航文档对应的清单项
    pub fn nav_entry(&self) -> Option<&ManifestEntry> {
        self.manifest.iter().find(|entry| entry.has_property("nav"))
    }

    /// NCX对应的清单项：优先使用 spine/@toc，其次按媒体类型查找
    pub fn ncx_entry(&self) -> Option<&ManifestEntry> {
        self.spine_toc
            .as_deref()
            .and_then(|id| self.manifest.iter().find(|entry| entry.id == id))
            .or_else(|| {
                self.manifest
                    .iter()
                    .find(|entry| entry.media_type == "application/x-dtbncx+xml")
            })
    }
}

/// 判断元数据元素是否为Dublin Core元素
fn is_dublin_core(e: &BytesStart) -> bool {
    let name = e.name();
    let prefix = name.prefix();
    prefix.is_some_and(|p| p.as_ref() == b"dc")
}

/// 解析 `prefix="rendition: http://... ibooks: http://..."`
fn parse_prefixes(value: &str) -> Vec<(String, String)> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    tokens
        .chunks(2)
        .filter_map(|pair| match pair {
            [name, uri] => name
                .strip_suffix(':')
                .map(|name| (name.to_string(), uri.to_string())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPUB3_OPF: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id"
         prefix="rendition: http://www.idpf.org/vocab/rendition/# ibooks: http://vocabulary.itunes.apple.com/rdf/ibooks/vocabulary-extensions-1.0/">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="id">id123456</dc:identifier>
    <dc:title>Sample &amp; book</dc:title>
    <dc:language>en</dc:language>
    <dc:creator id="creator">J.K. Rowling</dc:creator>
    <meta refines="#creator" property="role" scheme="marc:relators">aut</meta>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
    <meta name="cover" content="cover-img"/>
    <meta property="ibooks:version">1.0</meta>
    <dc:source>Somewhere</dc:source>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="chapter_1" href="text/chap%2001.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover-img" href="images/cover.jpg" media-type="image/jpeg" properties="cover-image"/>
  </manifest>
  <spine page-progression-direction="rtl">
    <itemref idref="nav" linear="no"/>
    <itemref idref="chapter_1" properties="page-spread-left"/>
  </spine>
  <guide>
    <reference type="text" title="Start" href="text/chap%2001.xhtml#top"/>
  </guide>
</package>"##;

    #[test]
    fn test_parse_epub3_package() {
        let doc = PackageDocument::parse(EPUB3_OPF, "EPUB/content.opf").unwrap();

        assert_eq!(doc.version, EpubVersion::V3);
        assert_eq!(doc.unique_identifier.as_deref(), Some("id"));
        assert_eq!(doc.prefixes.len(), 2);
        assert_eq!(doc.prefixes[0].0, "rendition");
        assert_eq!(doc.page_progression, Some(Direction::Rtl));

        assert_eq!(doc.metadata.title(), Some("Sample & book"));
        assert_eq!(doc.metadata.len(), 9);
        assert_eq!(doc.metadata.meta_by_name("cover"), Some("cover-img"));
        assert_eq!(doc.metadata.meta_by_property("ibooks:version"), Some("1.0"));
        assert_eq!(doc.metadata.creators()[0].role.as_deref(), Some("aut"));
        assert_eq!(
            doc.metadata
                .dublin_core(&DcElement::Other("source".to_string()))
                .next(),
            Some("Somewhere")
        );

        assert_eq!(doc.manifest.len(), 3);
        assert_eq!(doc.manifest[1].href, "text/chap 01.xhtml");
        assert_eq!(doc.nav_entry().unwrap().id, "nav");
        assert!(doc.manifest[2].has_property("cover-image"));

        assert!(!doc.spine[0].linear);
        assert!(doc.spine[1].linear);
        assert_eq!(doc.spine[1].properties, vec!["page-spread-left"]);

        assert_eq!(doc.guide[0].href, "text/chap 01.xhtml");
        assert_eq!(doc.guide[0].fragment.as_deref(), Some("top"));
    }

    #[test]
    fn test_parse_epub2_package() {
        let opf = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:identifier id="BookId" opf:scheme="ISBN">9780000000000</dc:identifier>
    <dc:creator opf:role="aut" opf:file-as="Doe, Jane">Jane Doe</dc:creator>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
  </manifest>
  <spine toc="ncx"/>
</package>"#;
        let doc = PackageDocument::parse(opf, "OEBPS/content.opf").unwrap();

        assert_eq!(doc.version, EpubVersion::V2);
        assert_eq!(doc.ncx_entry().unwrap().href, "toc.ncx");
        let identifier = doc.metadata.identifier_with_id("BookId").unwrap();
        assert_eq!(identifier.scheme.as_deref(), Some("ISBN"));
        assert_eq!(doc.metadata.creators()[0].file_as.as_deref(), Some("Doe, Jane"));
    }

    #[test]
    fn test_missing_required_parts() {
        let no_version = r#"<package><manifest/><spine/></package>"#;
        assert!(matches!(
            PackageDocument::parse(no_version, "content.opf"),
            Err(EpubError::MalformedPackage { .. })
        ));

        let no_spine = r#"<package version="3.0"><manifest/></package>"#;
        let err = PackageDocument::parse(no_spine, "content.opf").unwrap_err();
        assert!(matches!(err, EpubError::MalformedPackage { path, .. } if path == "content.opf"));

        let incomplete_item = r#"<package version="3.0"><manifest><item id="a" href="a.xhtml"/></manifest><spine/></package>"#;
        assert!(matches!(
            PackageDocument::parse(incomplete_item, "content.opf"),
            Err(EpubError::MalformedPackage { .. })
        ));
    }
}
