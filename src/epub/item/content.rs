//! 条目内容
//!
//! 文本内容带有显式的字符编码（默认UTF-8），二进制内容原样保留。

use crate::epub::error::{EpubError, Result};
use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;

/// 条目的内容
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// 文本内容（HTML、CSS、NCX、Nav）
    Text {
        text: String,
        encoding: &'static Encoding,
    },
    /// 二进制内容（图片、字体等）
    Binary(Vec<u8>),
}

impl Content {
    /// 创建UTF-8文本内容
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text {
            text: text.into(),
            encoding: UTF_8,
        }
    }

    /// 创建指定编码的文本内容
    ///
    /// # 参数
    /// * `label` - 编码名称，如 `utf-8`、`windows-1252`、`gbk`
    pub fn text_with_encoding(text: impl Into<String>, label: &str) -> Result<Self> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| EpubError::Encoding(format!("未知的字符编码: {}", label)))?;

        if encoding.output_encoding() != encoding {
            return Err(EpubError::Encoding(format!("不支持写出的字符编码: {}", label)));
        }

        Ok(Content::Text {
            text: text.into(),
            encoding,
        })
    }

    /// 创建二进制内容
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Content::Binary(bytes.into())
    }

    /// 把归档中读出的字节解码为文本
    ///
    /// 编码取自XML声明或CSS的 `@charset`，缺省为UTF-8。带BOM、编码无法原样写回
    /// 或者解码失败的内容保留为二进制，保证写回时字节不变。
    pub fn decode(bytes: Vec<u8>) -> Self {
        if Encoding::for_bom(&bytes).is_some() {
            return Content::Binary(bytes);
        }

        let encoding = sniff_charset(&bytes)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);

        if encoding.output_encoding() != encoding {
            return Content::Binary(bytes);
        }

        let decoded = encoding
            .decode_without_bom_handling_and_without_replacement(&bytes)
            .map(|text| text.into_owned());

        match decoded {
            Some(text) => Content::Text { text, encoding },
            None => Content::Binary(bytes),
        }
    }

    /// 文本内容的引用，二进制内容返回None
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text, .. } => Some(text),
            Content::Binary(_) => None,
        }
    }

    /// 以文本形式查看内容，二进制内容按UTF-8有损解码
    pub fn to_text_lossy(&self) -> Cow<'_, str> {
        match self {
            Content::Text { text, .. } => Cow::Borrowed(text),
            Content::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// 编码名称
    pub fn encoding_name(&self) -> Option<&'static str> {
        match self {
            Content::Text { encoding, .. } => Some(encoding.name()),
            Content::Binary(_) => None,
        }
    }

    /// 按声明的编码输出字节
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Content::Text { text, encoding } => encode_with(text, *encoding),
            Content::Binary(bytes) => bytes.clone(),
        }
    }

    /// 内容是否为空
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text { text, .. } => text.is_empty(),
            Content::Binary(bytes) => bytes.is_empty(),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Binary(Vec::new())
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::text(text)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::text(text)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Binary(bytes)
    }
}

/// 用指定编码输出文本
pub(crate) fn encode_with(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_8 {
        return text.as_bytes().to_vec();
    }
    // 无法映射的字符由encoding_rs写成数字字符引用
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

/// 从文件开头探测字符编码声明
fn sniff_charset(bytes: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);

    if head.starts_with("<?xml") {
        let decl_end = head.find("?>")?;
        let decl = &head[..decl_end];
        let start = decl.find("encoding=")? + "encoding=".len();
        return quoted_value(&decl[start..]);
    }

    if let Some(rest) = head.strip_prefix("@charset ") {
        return quoted_value(rest);
    }

    None
}

fn quoted_value(text: &str) -> Option<String> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &text[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}
