use crate::epub::error::{EpubError, Result};
use crate::epub::xml;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;

/// container.xml在归档中的路径
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

const CONTAINER_NAMESPACE: &str = "urn:oasis:names:tc:opendocument:xmlns:container";
const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// Container.xml中的rootfile信息
#[derive(Debug, Clone, PartialEq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// Container.xml的解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub rootfiles: Vec<RootFile>,
}

impl Container {
    /// 指向单个包文档的容器
    pub fn for_package(full_path: &str) -> Self {
        Self {
            rootfiles: vec![RootFile {
                full_path: full_path.to_string(),
                media_type: PACKAGE_MEDIA_TYPE.to_string(),
            }],
        }
    }

    /// 解析container.xml内容
    ///
    /// # 参数
    /// * `xml_content` - container.xml的文件内容
    ///
    /// # 返回值
    /// * `Result<Container, EpubError>` - 无法解析、没有rootfile或某个rootfile缺少full-path时返回 `MalformedContainer`
    pub fn parse_xml(xml_content: &str) -> Result<Container> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);
        reader.config_mut().expand_empty_elements = true;

        let mut rootfiles = Vec::new();
        let mut buf = Vec::new();
        let mut in_rootfiles = false;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| EpubError::MalformedContainer(e.to_string()))?;

            match event {
                Event::Start(ref e) => match xml::local_name(e).as_str() {
                    "rootfiles" => in_rootfiles = true,
                    "rootfile" if in_rootfiles => {
                        let attribute = |name: &[u8]| {
                            xml::attribute(e, name)
                                .map_err(|err| EpubError::MalformedContainer(err.to_string()))
                        };
                        let full_path = attribute(b"full-path")?
                            .filter(|path| !path.is_empty())
                            .ok_or_else(|| {
                                EpubError::MalformedContainer(format!(
                                    "第{}个rootfile缺少full-path属性",
                                    rootfiles.len() + 1
                                ))
                            })?;
                        let media_type = attribute(b"media-type")?.unwrap_or_default();

                        rootfiles.push(RootFile {
                            full_path,
                            media_type,
                        });
                    }
                    _ => {}
                },
                Event::End(ref e) => {
                    if xml::end_local_name(e) == "rootfiles" {
                        in_rootfiles = false;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if rootfiles.is_empty() {
            return Err(EpubError::MalformedContainer(
                "没有找到任何rootfile条目".to_string(),
            ));
        }

        Ok(Container { rootfiles })
    }

    /// 包文档路径：第一个rootfile为准
    pub fn package_path(&self) -> Option<&str> {
        self.rootfiles.first().map(|rf| rf.full_path.as_str())
    }

    /// 生成container.xml
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = xml::new_writer()?;

        let mut container = BytesStart::new("container");
        container.push_attribute(("version", "1.0"));
        container.push_attribute(("xmlns", CONTAINER_NAMESPACE));
        writer.write_event(Event::Start(container))?;
        writer.write_event(Event::Start(BytesStart::new("rootfiles")))?;
        for rootfile in &self.rootfiles {
            xml::write_empty_element(
                &mut writer,
                "rootfile",
                &[
                    ("full-path", rootfile.full_path.as_str()),
                    ("media-type", rootfile.media_type.as_str()),
                ],
            )?;
        }
        writer.write_event(Event::End(BytesEnd::new("rootfiles")))?;
        writer.write_event(Event::End(BytesEnd::new("container")))?;

        Ok(xml::finish(writer))
    }
}
