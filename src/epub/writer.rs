//! EPUB写出器
//!
//! 每次写出都是完整重建：校验包、生成包文档和目录文件，
//! 再按固定顺序把全部条目一次性交给归档写出端。

use crate::epub::archive::{ArchiveEntry, ArchiveSink, ZipSink};
use crate::epub::config::{EpubConfig, WriterOptions};
use crate::epub::container::{CONTAINER_PATH, Container};
use crate::epub::error::{EpubError, Result};
use crate::epub::item::{Item, ItemKind, ItemType, PageTemplate, RenderDefaults};
use crate::epub::opf::metadata::MetaValue;
use crate::epub::opf::package::Package;
use crate::epub::opf::writer as opf_writer;
use crate::epub::path;
use crate::epub::plugin::{self, Plugin, Stage};
use crate::epub::reader::EPUB_MIMETYPE;
use crate::epub::toc::entry::TocTarget;
use crate::epub::toc::nav::{self, Landmark, NavContext};
use crate::epub::toc::ncx::{self, NcxContext, target_src};
use std::fs;
use std::io::Cursor;
use std::path::Path;

const DEFAULT_NCX_ID: &str = "ncx";
const DEFAULT_NCX_FILE: &str = "toc.ncx";
const DEFAULT_NAV_ID: &str = "nav";
const DEFAULT_NAV_FILE: &str = "nav.xhtml";

/// EPUB写出器
#[derive(Default)]
pub struct EpubWriter {
    options: WriterOptions,
    plugins: Vec<Box<dyn Plugin>>,
}

impl EpubWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用配置中的写出选项
    pub fn with_config(config: &EpubConfig) -> Self {
        Self::new().with_options(config.writer.clone())
    }

    pub fn with_options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    /// 追加一个插件，写出前按加入顺序调用
    pub fn with_plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// 写出到任意归档写出端
    ///
    /// 所有条目生成成功后才会调用写出端，校验失败时归档不会被触碰。
    pub fn write<K: ArchiveSink + ?Sized>(&self, package: &Package, sink: &mut K) -> Result<()> {
        let entries = self.build_entries(package)?;
        sink.write_entries(entries)
    }

    /// 写出为内存中的zip
    pub fn write_to_vec(&self, package: &Package) -> Result<Vec<u8>> {
        let mut sink = ZipSink::new(Cursor::new(Vec::new()));
        self.write(package, &mut sink)?;
        let cursor = sink
            .into_inner()
            .ok_or_else(|| EpubError::Io(std::io::Error::other("归档写出端不可用")))?;
        Ok(cursor.into_inner())
    }

    /// 写出到文件
    ///
    /// 先在内存中生成完整归档再写入文件，失败时不会留下不完整的文件。
    pub fn write_path<P: AsRef<Path>>(&self, package: &Package, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.write_to_vec(package)?;
        fs::write(path, &bytes)?;
        tracing::info!(path = %path.display(), size = bytes.len(), "epub written");
        Ok(())
    }

    /// 生成全部归档条目
    ///
    /// # 返回值
    /// * `Result<Vec<ArchiveEntry>>` - 依次为 mimetype、container.xml、包文档、目录文件、其余条目
    pub fn build_entries(&self, package: &Package) -> Result<Vec<ArchiveEntry>> {
        let mut package = package.clone();
        plugin::run(&self.plugins, &mut package, Stage::Write)?;

        package.validate()?;
        if self.options.validate_anchors {
            check_anchors(&package)?;
        }

        if package.version.is_epub3() && package.metadata.meta_by_property("dcterms:modified").is_none() {
            let modified = self
                .options
                .modified
                .clone()
                .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());
            package
                .metadata
                .add_meta(MetaValue::property_based("dcterms:modified", modified));
        }

        let needs_ncx = !package.version.is_epub3()
            || package.legacy_ncx
            || package.get_items_by_type(ItemType::Ncx).next().is_some();
        let needs_nav = package.version.is_epub3();
        if needs_ncx && package.get_items_by_type(ItemType::Ncx).next().is_none() {
            let id = free_id(&package, DEFAULT_NCX_ID);
            let file_name = free_file_name(&package, DEFAULT_NCX_FILE);
            package.add_item(Item::ncx(id, file_name.as_str()))?;
            tracing::debug!(file_name = %file_name, "NCX item synthesized");
        }
        if needs_nav && package.get_items_by_type(ItemType::Nav).next().is_none() {
            let id = free_id(&package, DEFAULT_NAV_ID);
            let file_name = free_file_name(&package, DEFAULT_NAV_FILE);
            package.add_item(Item::nav(id, file_name.as_str()))?;
            tracing::debug!(file_name = %file_name, "navigation document synthesized");
        }
        let page_template = self
            .options
            .chapter_template
            .as_deref()
            .map(PageTemplate::parse)
            .transpose()?;

        let base_dir = package.base_dir();
        let ncx_item = package.get_items_by_type(ItemType::Ncx).next();

        let mut entries = Vec::with_capacity(package.manifest().len() + 3);
        entries.push(ArchiveEntry::new("mimetype", EPUB_MIMETYPE.as_bytes().to_vec(), false));
        entries.push(ArchiveEntry::new(
            CONTAINER_PATH,
            Container::for_package(&package.package_path).to_xml()?,
            true,
        ));
        entries.push(ArchiveEntry::new(
            package.package_path.as_str(),
            opf_writer::render(&package, ncx_item.map(Item::id), &self.options)?,
            true,
        ));

        let title = package.title().unwrap_or_default();
        for item in package.items().filter(|item| matches!(item.kind, ItemKind::Ncx)) {
            let ncx_dir = path::parent_dir(item.file_name());
            let fallback_src = fallback_src(&package, ncx_dir);
            let uid = package.identifier().unwrap_or_default();
            let ctx = NcxContext {
                uid: &uid,
                title,
                base_dir: ncx_dir,
                fallback_src: &fallback_src,
            };
            entries.push(ArchiveEntry::new(
                path::join(base_dir, item.file_name()),
                ncx::render(&ctx, &package.toc)?,
                true,
            ));
        }

        let landmarks = if self.options.epub3_landmarks {
            landmarks(&package)
        } else {
            Vec::new()
        };
        for item in package.items().filter(|item| matches!(item.kind, ItemKind::Nav)) {
            let ctx = NavContext {
                title,
                language: package.language(),
                base_dir: path::parent_dir(item.file_name()),
                landmark_title: &self.options.landmark_title,
            };
            entries.push(ArchiveEntry::new(
                path::join(base_dir, item.file_name()),
                nav::render(&ctx, &package.toc, &landmarks)?,
                true,
            ));
        }

        let defaults = RenderDefaults {
            template: page_template.as_ref(),
            ..package.render_defaults()
        };
        for item in package.items() {
            if matches!(item.kind, ItemKind::Ncx | ItemKind::Nav) {
                continue;
            }
            entries.push(ArchiveEntry::new(
                path::join(base_dir, item.file_name()),
                item.render(&defaults)?,
                true,
            ));
        }

        tracing::debug!(
            entries = entries.len(),
            version = %package.version,
            "archive entries prepared"
        );
        Ok(entries)
    }
}

/// 优先使用默认ID，被占用时交给清单自动生成
fn free_id(package: &Package, preferred: &str) -> String {
    if package.manifest().contains_id(preferred) {
        String::new()
    } else {
        preferred.to_string()
    }
}

/// 优先使用默认文件名，被占用时在扩展名前加序号
fn free_file_name(package: &Package, preferred: &str) -> String {
    let taken = |name: &str| package.manifest().contains_file_name(name);
    if !taken(preferred) {
        return preferred.to_string();
    }

    let (stem, extension) = preferred.rsplit_once('.').unwrap_or((preferred, ""));
    (1..)
        .map(|n| {
            if extension.is_empty() {
                format!("{}-{}", stem, n)
            } else {
                format!("{}-{}.{}", stem, n, extension)
            }
        })
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| preferred.to_string())
}

/// 目录中带片段的目标必须存在于目标HTML文档中
fn check_anchors(package: &Package) -> Result<()> {
    for (_, entry) in package.flatten_toc()? {
        let Some(target) = entry.target() else {
            continue;
        };
        let Some(anchor) = &target.anchor else {
            continue;
        };
        let Some(item) = package.get_item_with_href(&target.href) else {
            continue;
        };
        if matches!(item.kind, ItemKind::Html(_)) && !item.anchor_ids().contains(anchor) {
            return Err(EpubError::unresolved(
                format!("目录条目 '{}'", entry.label()),
                target.to_href(),
            ));
        }
    }
    Ok(())
}

/// 没有目标的NCX分组使用的src：脊柱中第一个HTML文档
fn fallback_src(package: &Package, ncx_dir: &str) -> String {
    package
        .spine
        .iter()
        .filter_map(|itemref| package.get_item_with_id(&itemref.idref))
        .find(|item| matches!(item.kind, ItemKind::Html(_)))
        .map(|item| target_src(ncx_dir, &TocTarget::new(item.file_name())))
        .unwrap_or_default()
}

/// 由指南生成导航文档的landmarks
fn landmarks(package: &Package) -> Vec<Landmark> {
    package
        .guide
        .iter()
        .filter_map(|reference| {
            let item = package.get_item_with_id(&reference.item_id)?;
            Some(Landmark {
                kind: reference.landmark_type().to_string(),
                title: reference.title.clone(),
                target: TocTarget {
                    href: item.file_name().to_string(),
                    anchor: reference.fragment.clone(),
                },
            })
        })
        .collect()
}

/// 把包写出到文件
pub fn write_epub<P: AsRef<Path>>(path: P, package: &Package) -> Result<()> {
    EpubWriter::new().write_path(package, path)
}

/// 把包写出为内存中的EPUB
pub fn write_epub_to_vec(package: &Package) -> Result<Vec<u8>> {
    EpubWriter::new().write_to_vec(package)
}
