//! 归档读写适配层
//!
//! 读取端只需要列出条目和按路径取字节，写出端一次性接收全部条目并完成归档。

use crate::epub::error::{EpubError, Result};
use std::io::{Read, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// 待写入归档的一个条目
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub path: String,
    pub data: Vec<u8>,
    /// 为假时以stored方式写入
    pub compress: bool,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, data: Vec<u8>, compress: bool) -> Self {
        Self {
            path: path.into(),
            data,
            compress,
        }
    }
}

/// 可读取的归档
pub trait ArchiveSource {
    /// 归档中全部条目的路径
    fn list_entries(&mut self) -> Result<Vec<String>>;

    /// 读取条目内容，不存在时返回 `EntryNotFound`
    fn read_entry(&mut self, path: &str) -> Result<Vec<u8>>;
}

/// 可写入的归档
pub trait ArchiveSink {
    /// 按给定顺序写入全部条目并完成归档
    fn write_entries(&mut self, entries: Vec<ArchiveEntry>) -> Result<()>;
}

/// 基于zip的读取端
pub struct ZipSource<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }
}

impl<R: Read + Seek> ArchiveSource for ZipSource<R> {
    fn list_entries(&mut self) -> Result<Vec<String>> {
        Ok(self.archive.file_names().map(str::to_string).collect())
    }

    fn read_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = match self.archive.by_name(path) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(EpubError::EntryNotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut buffer = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

/// 基于zip的写出端
pub struct ZipSink<W: Write + Seek> {
    writer: Option<W>,
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }

    /// 取回底层写出对象，写入完成后调用
    pub fn into_inner(self) -> Option<W> {
        self.writer
    }
}

impl<W: Write + Seek> ArchiveSink for ZipSink<W> {
    fn write_entries(&mut self, entries: Vec<ArchiveEntry>) -> Result<()> {
        let inner = self.writer.take().ok_or_else(|| {
            EpubError::Io(std::io::Error::other("上一次写出失败，归档不可用"))
        })?;
        let mut zip_writer = ZipWriter::new(inner);

        for entry in entries {
            let method = if entry.compress {
                CompressionMethod::Deflated
            } else {
                CompressionMethod::Stored
            };
            let options = SimpleFileOptions::default().compression_method(method);

            zip_writer.start_file(entry.path.as_str(), options)?;
            zip_writer.write_all(&entry.data)?;
            tracing::trace!(path = %entry.path, size = entry.data.len(), "archive entry written");
        }

        self.writer = Some(zip_writer.finish()?);
        Ok(())
    }
}

/// 只记录条目的写出端，便于检查写出顺序
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveSink for RecordingSink {
    fn write_entries(&mut self, entries: Vec<ArchiveEntry>) -> Result<()> {
        self.entries = entries;
        Ok(())
    }
}

impl ArchiveSource for RecordingSink {
    fn list_entries(&mut self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.path.clone()).collect())
    }

    fn read_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.data.clone())
            .ok_or_else(|| EpubError::EntryNotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_zip_round_trip() {
        let mut sink = ZipSink::new(Cursor::new(Vec::new()));
        sink.write_entries(vec![
            ArchiveEntry::new("mimetype", b"application/epub+zip".to_vec(), false),
            ArchiveEntry::new("EPUB/a.txt", b"hello".to_vec(), true),
        ])
        .unwrap();
        let bytes = sink.into_inner().unwrap().into_inner();

        let mut archive = ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
        let mimetype = archive.by_index(0).unwrap();
        assert_eq!(mimetype.name(), "mimetype");
        assert_eq!(mimetype.compression(), CompressionMethod::Stored);
        drop(mimetype);
        assert_eq!(
            archive.by_name("EPUB/a.txt").unwrap().compression(),
            CompressionMethod::Deflated
        );

        let mut source = ZipSource::new(Cursor::new(bytes)).unwrap();
        assert_eq!(source.list_entries().unwrap(), vec!["mimetype", "EPUB/a.txt"]);
        assert_eq!(source.read_entry("EPUB/a.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_missing_entry() {
        let mut sink = ZipSink::new(Cursor::new(Vec::new()));
        sink.write_entries(vec![ArchiveEntry::new("mimetype", Vec::new(), false)])
            .unwrap();
        let bytes = sink.into_inner().unwrap().into_inner();

        let mut source = ZipSource::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            source.read_entry("nope.xhtml"),
            Err(EpubError::EntryNotFound(path)) if path == "nope.xhtml"
        ));
    }
}
