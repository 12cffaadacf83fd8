//! EPUB读取器
//!
//! 读取严格按顺序分阶段进行：
//! 打开归档 → 定位rootfile → 解析包文档 → 清单与脊柱 → 元数据 → 定位目录 → 解析目录。
//! 任何一步失败都会终止整个读取，不会返回不完整的包。

use crate::epub::archive::{ArchiveSource, ZipSource};
use crate::epub::config::{EpubConfig, MediaTypes};
use crate::epub::container::{CONTAINER_PATH, Container};
use crate::epub::error::{EpubError, Result};
use crate::epub::item::{Content, HtmlDoc, Item, ItemKind, ItemType, html};
use crate::epub::opf::guide::GuideReference;
use crate::epub::opf::package::Package;
use crate::epub::opf::parser::{ManifestEntry, PackageDocument};
use crate::epub::path;
use crate::epub::plugin::{self, Plugin, Stage};
use crate::epub::toc::{nav, ncx};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

/// mimetype文件应有的内容
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

/// 读取阶段，用于日志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadStage {
    OpenArchive,
    LocateRootfile,
    ParsePackageDocument,
    ParseManifestAndSpine,
    ParseMetadata,
    LocateTocSource,
    ParseToc,
    Done,
}

/// EPUB读取器
#[derive(Default)]
pub struct EpubReader {
    media_types: MediaTypes,
    plugins: Vec<Box<dyn Plugin>>,
}

impl EpubReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用配置中的媒体类型表
    pub fn with_config(config: &EpubConfig) -> Self {
        Self {
            media_types: config.media_types.clone(),
            plugins: Vec::new(),
        }
    }

    pub fn with_media_types(mut self, media_types: MediaTypes) -> Self {
        self.media_types = media_types;
        self
    }

    /// 追加一个插件，读取完成后按加入顺序调用
    pub fn with_plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// 从文件路径读取
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<Package> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "reading epub");
        let file = File::open(path)?;
        let mut source = ZipSource::new(BufReader::new(file))?;
        self.read(&mut source)
    }

    /// 从内存中的归档读取
    pub fn read_bytes(&self, bytes: Vec<u8>) -> Result<Package> {
        let mut source = ZipSource::new(Cursor::new(bytes))?;
        self.read(&mut source)
    }

    /// 从任意归档来源读取
    ///
    /// # 参数
    /// * `source` - 归档来源
    ///
    /// # 返回值
    /// * `Result<Package, EpubError>` - 完整的包，任何结构错误都会直接返回
    pub fn read<S: ArchiveSource + ?Sized>(&self, source: &mut S) -> Result<Package> {
        enter(ReadStage::OpenArchive);
        check_mimetype(source)?;

        enter(ReadStage::LocateRootfile);
        let package_path = locate_rootfile(source)?;

        enter(ReadStage::ParsePackageDocument);
        let opf_bytes = match source.read_entry(&package_path) {
            Ok(bytes) => bytes,
            Err(EpubError::EntryNotFound(_)) => {
                return Err(EpubError::malformed_package(&package_path, "包文档不存在"));
            }
            Err(e) => return Err(e),
        };
        let doc = PackageDocument::parse(&decode_xml(&opf_bytes), &package_path)?;
        tracing::debug!(version = %doc.version, items = doc.manifest.len(), "package document parsed");

        let mut package = Package::with_media_types(self.media_types.clone());
        package.version = doc.version;
        package.package_path = package_path.clone();

        enter(ReadStage::ParseManifestAndSpine);
        let cover_id = doc.metadata.meta_by_name("cover").map(str::to_string);
        for entry in &doc.manifest {
            let item = self.load_item(source, &package_path, entry, cover_id.as_deref())?;
            package.add_item(item)?;
        }
        for itemref in &doc.spine {
            if !package.manifest().contains_id(&itemref.idref) {
                return Err(EpubError::unresolved("spine", itemref.idref.clone()));
            }
        }
        package.spine = doc.spine.clone();

        enter(ReadStage::ParseMetadata);
        package.metadata = doc.metadata.clone();
        if let Some(id) = &doc.unique_identifier {
            package.set_unique_identifier_id(id.clone());
        }
        package.direction = doc.direction.or(doc.page_progression);
        package.prefixes = doc.prefixes.clone();
        for reference in &doc.guide {
            let item = package
                .get_item_with_href(&reference.href)
                .ok_or_else(|| EpubError::unresolved(format!("guide '{}'", reference.kind), reference.href.clone()))?;
            let mut guide_ref = GuideReference::new(&reference.kind, &reference.title, item.id());
            guide_ref.fragment = reference.fragment.clone();
            package.guide.push(guide_ref);
        }

        enter(ReadStage::LocateTocSource);
        let nav_entry = doc.nav_entry();
        let ncx_entry = doc.ncx_entry();
        package.legacy_ncx = package.version.is_epub3() && ncx_entry.is_some();

        enter(ReadStage::ParseToc);
        let toc_source = nav_entry
            .map(|entry| (entry, true))
            .or_else(|| ncx_entry.map(|entry| (entry, false)));
        if let Some((entry, is_nav)) = toc_source {
            let item = package
                .get_item_with_id(&entry.id)
                .ok_or_else(|| EpubError::unresolved("toc", entry.id.clone()))?;
            let file_path = path::join(package.base_dir(), item.file_name());
            let base_dir = path::parent_dir(item.file_name());
            let text = item.content.to_text_lossy();

            let toc = if is_nav {
                nav::parse(&text, &file_path, base_dir)?
            } else {
                ncx::parse(&text, &file_path, base_dir)?
            };
            tracing::debug!(source = %file_path, entries = toc.len(), "toc parsed");
            package.set_toc(toc);
            package.flatten_toc()?;
        } else {
            tracing::warn!("no navigation document or NCX found");
        }

        plugin::run(&self.plugins, &mut package, Stage::Read)?;

        enter(ReadStage::Done);
        tracing::info!(
            title = package.title().unwrap_or_default(),
            items = package.manifest().len(),
            "epub loaded"
        );
        Ok(package)
    }

    /// 读取一个清单项并构造条目
    fn load_item<S: ArchiveSource + ?Sized>(
        &self,
        source: &mut S,
        package_path: &str,
        entry: &ManifestEntry,
        cover_id: Option<&str>,
    ) -> Result<Item> {
        let archive_path = path::join(path::parent_dir(package_path), &entry.href);
        let bytes = source.read_entry(&archive_path)?;

        let media_type = self.media_types.normalize(&entry.media_type);
        let item_type = match self.media_types.classify(&media_type, &entry.properties) {
            ItemType::Image if cover_id == Some(entry.id.as_str()) => ItemType::Cover,
            other => other,
        };

        let content = if item_type.is_text() {
            Content::decode(bytes)
        } else {
            Content::binary(bytes)
        };

        let kind = match item_type {
            ItemType::Html => {
                let text = content.to_text_lossy();
                ItemKind::Html(HtmlDoc {
                    title: html::extract_title(&text),
                    language: html::extract_language(&text),
                    ..HtmlDoc::default()
                })
            }
            other => ItemKind::from_type(other),
        };

        let mut item = Item::new(entry.id.as_str(), entry.href.as_str(), media_type, content, kind);
        item.properties = entry
            .properties
            .iter()
            .filter(|p| !matches!(p.as_str(), "nav" | "cover-image"))
            .cloned()
            .collect();

        tracing::trace!(id = %entry.id, path = %archive_path, "item loaded");
        Ok(item)
    }
}

/// 从文件读取EPUB
///
/// # 示例
///
/// ```no_run
/// let package = epubforge::read_epub("book.epub")?;
/// println!("{}", package.title().unwrap_or("未知标题"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn read_epub<P: AsRef<Path>>(path: P) -> Result<Package> {
    EpubReader::new().read_path(path)
}

/// 从内存中的字节读取EPUB
pub fn read_epub_from_bytes(bytes: Vec<u8>) -> Result<Package> {
    EpubReader::new().read_bytes(bytes)
}

fn enter(stage: ReadStage) {
    tracing::debug!(?stage, "read stage");
}

/// 检查mimetype文件
fn check_mimetype<S: ArchiveSource + ?Sized>(source: &mut S) -> Result<()> {
    let bytes = match source.read_entry("mimetype") {
        Ok(bytes) => bytes,
        Err(EpubError::EntryNotFound(_)) => return Err(EpubError::MissingMimetype),
        Err(e) => return Err(e),
    };

    let found = String::from_utf8_lossy(&bytes);
    let found = found.trim();
    if found != EPUB_MIMETYPE {
        return Err(EpubError::InvalidMimetype {
            expected: EPUB_MIMETYPE.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

/// 解析container.xml并返回包文档路径
fn locate_rootfile<S: ArchiveSource + ?Sized>(source: &mut S) -> Result<String> {
    let bytes = match source.read_entry(CONTAINER_PATH) {
        Ok(bytes) => bytes,
        Err(EpubError::EntryNotFound(_)) => {
            return Err(EpubError::MalformedContainer(format!("缺少 {}", CONTAINER_PATH)));
        }
        Err(e) => return Err(e),
    };

    let container = Container::parse_xml(&decode_xml(&bytes))?;
    let package_path = container
        .package_path()
        .map(|p| path::join("", p))
        .ok_or_else(|| EpubError::MalformedContainer("没有找到任何rootfile条目".to_string()))?;

    tracing::debug!(package_path = %package_path, "rootfile located");
    Ok(package_path)
}

/// 解码XML文件，识别BOM，默认UTF-8
fn decode_xml(bytes: &[u8]) -> String {
    let (text, _, _) = encoding_rs::UTF_8.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::archive::{ArchiveEntry, ArchiveSink, RecordingSink, ZipSink};
    use crate::epub::toc::TocEntry;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>"#;

    const OPF_EPUB2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="2.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:title>测试书籍</dc:title>
        <dc:creator opf:role="aut">测试作者</dc:creator>
        <dc:language>zh-CN</dc:language>
        <dc:identifier id="BookId" opf:scheme="ISBN">978-1234567890</dc:identifier>
        <meta name="cover" content="cover-image"/>
    </metadata>
    <manifest>
        <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
        <item id="chapter1" href="text/chapter1.xhtml" media-type="application/xhtml+xml"/>
        <item id="chapter2" href="text/chapter%202.xhtml" media-type="application/xhtml+xml"/>
        <item id="cover-image" href="images/cover.jpg" media-type="image/jpg"/>
    </manifest>
    <spine toc="ncx">
        <itemref idref="chapter1"/>
        <itemref idref="chapter2" linear="no"/>
    </spine>
    <guide>
        <reference type="text" title="开始" href="text/chapter1.xhtml#start"/>
    </guide>
</package>"#;

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
    <head><meta name="dtb:uid" content="978-1234567890"/></head>
    <docTitle><text>测试书籍</text></docTitle>
    <navMap>
        <navPoint id="p1" playOrder="1">
            <navLabel><text>第一章</text></navLabel>
            <content src="text/chapter1.xhtml"/>
            <navPoint id="p2" playOrder="2">
                <navLabel><text>第二章</text></navLabel>
                <content src="text/chapter%202.xhtml#s1"/>
            </navPoint>
        </navPoint>
    </navMap>
</ncx>"#;

    const CHAPTER1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="zh-CN">
<head><title>第一章</title></head>
<body><h1 id="start">第一章</h1><p>这是第一章的内容。</p></body>
</html>"#;

    fn entry(path: &str, data: &[u8]) -> ArchiveEntry {
        ArchiveEntry::new(path, data.to_vec(), path != "mimetype")
    }

    fn epub2_entries() -> Vec<ArchiveEntry> {
        vec![
            entry("mimetype", EPUB_MIMETYPE.as_bytes()),
            entry(CONTAINER_PATH, CONTAINER.as_bytes()),
            entry("OEBPS/content.opf", OPF_EPUB2.as_bytes()),
            entry("OEBPS/toc.ncx", NCX.as_bytes()),
            entry("OEBPS/text/chapter1.xhtml", CHAPTER1.as_bytes()),
            entry("OEBPS/text/chapter 2.xhtml", b"<html><body><h2 id=\"s1\">2</h2></body></html>"),
            entry("OEBPS/images/cover.jpg", &[0xff, 0xd8, 0xff, 0xe0]),
        ]
    }

    fn recording(entries: Vec<ArchiveEntry>) -> RecordingSink {
        RecordingSink { entries }
    }

    #[test]
    fn test_read_epub2() {
        let package = EpubReader::new().read(&mut recording(epub2_entries())).unwrap();

        assert_eq!(package.version.to_string(), "2.0");
        assert_eq!(package.package_path, "OEBPS/content.opf");
        assert_eq!(package.title(), Some("测试书籍"));
        assert_eq!(package.identifier().as_deref(), Some("978-1234567890"));
        assert!(!package.legacy_ncx);

        let chapter = package.get_item_with_id("chapter1").unwrap();
        assert_eq!(chapter.file_name(), "text/chapter1.xhtml");
        assert_eq!(chapter.html_doc().unwrap().title.as_deref(), Some("第一章"));
        assert_eq!(chapter.html_doc().unwrap().language.as_deref(), Some("zh-CN"));
        assert_eq!(chapter.content.as_text(), Some(CHAPTER1));

        let cover = package.get_item_with_id("cover-image").unwrap();
        assert_eq!(cover.media_type(), "image/jpeg");
        assert_eq!(cover.item_type(), ItemType::Cover);
        assert_eq!(cover.content, Content::binary(vec![0xff, 0xd8, 0xff, 0xe0]));

        assert_eq!(package.spine.len(), 2);
        assert!(!package.spine[1].linear);

        assert_eq!(package.guide.len(), 1);
        assert_eq!(package.guide[0].item_id, "chapter1");
        assert_eq!(package.guide[0].fragment.as_deref(), Some("start"));

        assert_eq!(
            package.toc,
            vec![TocEntry::section_with_target(
                "第一章",
                "text/chapter1.xhtml",
                vec![TocEntry::link("text/chapter 2.xhtml#s1", "第二章")],
            )]
        );
    }

    #[test]
    fn test_read_from_zip_bytes() {
        let mut sink = ZipSink::new(Cursor::new(Vec::new()));
        sink.write_entries(epub2_entries()).unwrap();
        let bytes = sink.into_inner().unwrap().into_inner();

        let package = EpubReader::new().read_bytes(bytes).unwrap();
        assert_eq!(package.manifest().len(), 4);
    }

    #[test]
    fn test_missing_mimetype() {
        let mut entries = epub2_entries();
        entries.remove(0);
        assert!(matches!(
            EpubReader::new().read(&mut recording(entries)),
            Err(EpubError::MissingMimetype)
        ));
    }

    #[test]
    fn test_invalid_mimetype() {
        let mut entries = epub2_entries();
        entries[0] = entry("mimetype", b"application/zip");
        assert!(matches!(
            EpubReader::new().read(&mut recording(entries)),
            Err(EpubError::InvalidMimetype { found, .. }) if found == "application/zip"
        ));
    }

    #[test]
    fn test_missing_container() {
        let mut entries = epub2_entries();
        entries.remove(1);
        assert!(matches!(
            EpubReader::new().read(&mut recording(entries)),
            Err(EpubError::MalformedContainer(_))
        ));
    }

    #[test]
    fn test_missing_package_document() {
        let mut entries = epub2_entries();
        entries.remove(2);
        assert!(matches!(
            EpubReader::new().read(&mut recording(entries)),
            Err(EpubError::MalformedPackage { path, .. }) if path == "OEBPS/content.opf"
        ));
    }

    #[test]
    fn test_unresolved_spine_reference() {
        let mut entries = epub2_entries();
        let opf = OPF_EPUB2.replace(r#"<itemref idref="chapter1"/>"#, r#"<itemref idref="ghost"/>"#);
        entries[2] = entry("OEBPS/content.opf", opf.as_bytes());
        assert!(matches!(
            EpubReader::new().read(&mut recording(entries)),
            Err(EpubError::UnresolvedReference { target, .. }) if target == "ghost"
        ));
    }

    #[test]
    fn test_malformed_ncx() {
        let mut entries = epub2_entries();
        entries[3] = entry("OEBPS/toc.ncx", NCX.replace(r#"<content src="text/chapter1.xhtml"/>"#, "").as_bytes());
        assert!(matches!(
            EpubReader::new().read(&mut recording(entries)),
            Err(EpubError::MalformedToc { path, .. }) if path == "OEBPS/toc.ncx"
        ));
    }

    #[test]
    fn test_nav_preferred_over_ncx() {
        let nav = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body><nav epub:type="toc"><ol><li><a href="text/chapter1.xhtml">来自导航文档</a></li></ol></nav></body></html>"#;
        let opf = OPF_EPUB2
            .replace(r#"version="2.0""#, r#"version="3.0""#)
            .replace(
                r#"<item id="ncx""#,
                r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
        <item id="ncx""#,
            );
        let mut entries = epub2_entries();
        entries[2] = entry("OEBPS/content.opf", opf.as_bytes());
        entries.push(entry("OEBPS/nav.xhtml", nav.as_bytes()));

        let package = EpubReader::new().read(&mut recording(entries)).unwrap();
        assert!(package.version.is_epub3());
        assert!(package.legacy_ncx);
        assert_eq!(package.get_item_with_id("nav").unwrap().item_type(), ItemType::Nav);
        assert_eq!(package.toc, vec![TocEntry::link("text/chapter1.xhtml", "来自导航文档")]);
    }

    #[test]
    fn test_plugins_run_after_read() {
        struct Retitle;
        impl Plugin for Retitle {
            fn name(&self) -> &str {
                "retitle"
            }
            fn after_read(&self, package: &mut Package) -> plugin::HookResult {
                package.set_title("改过的书名");
                Ok(())
            }
        }

        let package = EpubReader::new()
            .with_plugin(Box::new(Retitle))
            .read(&mut recording(epub2_entries()))
            .unwrap();
        assert_eq!(package.title(), Some("改过的书名"));
    }
}
