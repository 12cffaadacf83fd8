//! 归档内路径处理
//!
//! 归档内的路径一律使用 `/` 分隔，与操作系统无关，因此不使用 `std::path`。

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// href 中需要转义的字符
const HREF_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// 返回路径所在目录（不含末尾 `/`），根目录返回空串
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// 把相对路径拼接到目录上并规范化 `.` 和 `..`
pub fn join(base_dir: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = if relative.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|p| !p.is_empty()).collect()
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}

/// 计算从目录 `from_dir` 指向 `target` 的相对路径，两者都相对于同一根目录
pub fn relative(from_dir: &str, target: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|p| !p.is_empty()).collect();
    let to: Vec<&str> = target.split('/').filter(|p| !p.is_empty()).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from.len() {
        parts.push("..");
    }
    parts.extend(&to[common..]);
    parts.join("/")
}

/// 把 href 拆分为路径和片段
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.find('#') {
        Some(index) => (&href[..index], Some(&href[index + 1..])),
        None => (href, None),
    }
}

/// 对 href 做百分号解码
pub fn decode_href(href: &str) -> String {
    percent_decode_str(href).decode_utf8_lossy().to_string()
}

/// 对路径做百分号编码，用于写出 href 属性
pub fn encode_href(path: &str) -> String {
    utf8_percent_encode(path, HREF_ESCAPE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("EPUB/content.opf"), "EPUB");
        assert_eq!(parent_dir("OEBPS/text/ch1.xhtml"), "OEBPS/text");
        assert_eq!(parent_dir("content.opf"), "");
    }

    #[test]
    fn test_join_normalizes() {
        assert_eq!(join("EPUB", "text/ch1.xhtml"), "EPUB/text/ch1.xhtml");
        assert_eq!(join("", "content.opf"), "content.opf");
        assert_eq!(join("EPUB/text", "../images/a.png"), "EPUB/images/a.png");
        assert_eq!(join("EPUB", "./nav.xhtml"), "EPUB/nav.xhtml");
    }

    #[test]
    fn test_relative() {
        assert_eq!(relative("", "text/ch1.xhtml"), "text/ch1.xhtml");
        assert_eq!(relative("nav", "text/ch1.xhtml"), "../text/ch1.xhtml");
        assert_eq!(relative("text", "text/ch1.xhtml"), "ch1.xhtml");
    }

    #[test]
    fn test_split_fragment() {
        assert_eq!(split_fragment("ch1.xhtml#s2"), ("ch1.xhtml", Some("s2")));
        assert_eq!(split_fragment("ch1.xhtml"), ("ch1.xhtml", None));
    }

    #[test]
    fn test_percent_round_trip() {
        assert_eq!(encode_href("text/my chapter.xhtml"), "text/my%20chapter.xhtml");
        assert_eq!(decode_href("text/my%20chapter.xhtml"), "text/my chapter.xhtml");
    }
}
