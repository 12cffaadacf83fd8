//! 元数据处理模块
//!
//! 提供EPUB元数据的结构定义和处理功能。元数据按声明顺序保存，
//! Dublin Core元素和 `<meta>` 元素交错排列，写出时保持原顺序。

/// Dublin Core元素
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DcElement {
    Identifier,
    Title,
    Language,
    Creator,
    Contributor,
    Publisher,
    Date,
    Rights,
    Subject,
    Description,
    /// 其余 `dc:*` 元素（如 `dc:source`、`dc:coverage`），保存本地名
    Other(String),
}

impl DcElement {
    /// 根据元素本地名创建
    pub fn from_local_name(name: &str) -> Self {
        match name {
            "identifier" => DcElement::Identifier,
            "title" => DcElement::Title,
            "language" => DcElement::Language,
            "creator" => DcElement::Creator,
            "contributor" => DcElement::Contributor,
            "publisher" => DcElement::Publisher,
            "date" => DcElement::Date,
            "rights" => DcElement::Rights,
            "subject" => DcElement::Subject,
            "description" => DcElement::Description,
            other => DcElement::Other(other.to_string()),
        }
    }

    /// 元素本地名
    pub fn local_name(&self) -> &str {
        match self {
            DcElement::Identifier => "identifier",
            DcElement::Title => "title",
            DcElement::Language => "language",
            DcElement::Creator => "creator",
            DcElement::Contributor => "contributor",
            DcElement::Publisher => "publisher",
            DcElement::Date => "date",
            DcElement::Rights => "rights",
            DcElement::Subject => "subject",
            DcElement::Description => "description",
            DcElement::Other(name) => name,
        }
    }

    /// 带 `dc:` 前缀的限定名
    pub fn qualified_name(&self) -> String {
        format!("dc:{}", self.local_name())
    }

    /// 是否允许重复出现
    pub fn is_repeatable(&self) -> bool {
        matches!(
            self,
            DcElement::Identifier
                | DcElement::Title
                | DcElement::Language
                | DcElement::Creator
                | DcElement::Contributor
                | DcElement::Subject
                | DcElement::Other(_)
        )
    }
}

/// `<meta>` 元素，属性按原样保存
///
/// * EPUB2：`<meta name="cover" content="cover-img"/>`
/// * EPUB3：`<meta property="dcterms:modified">2025-06-05T11:24:01Z</meta>`
/// * EPUB3：`<meta refines="#creator" property="role" scheme="marc:relators">aut</meta>`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaValue {
    /// 属性列表，键为限定名
    pub attributes: Vec<(String, String)>,
    /// 元素文本，空元素为None
    pub content: Option<String>,
}

impl MetaValue {
    /// 创建基于name的meta
    pub fn name_based(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            attributes: vec![
                ("name".to_string(), name.into()),
                ("content".to_string(), content.into()),
            ],
            content: None,
        }
    }

    /// 创建基于property的meta
    pub fn property_based(property: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            attributes: vec![("property".to_string(), property.into())],
            content: Some(content.into()),
        }
    }

    /// 创建基于refines的meta
    ///
    /// # 参数
    /// * `refines_id` - 被精化的元素ID（不包含#前缀）
    pub fn refines(
        refines_id: &str,
        property: impl Into<String>,
        content: impl Into<String>,
        scheme: Option<&str>,
    ) -> Self {
        let mut attributes = vec![
            ("refines".to_string(), format!("#{}", refines_id)),
            ("property".to_string(), property.into()),
        ];
        if let Some(scheme) = scheme {
            attributes.push(("scheme".to_string(), scheme.to_string()));
        }
        Self {
            attributes,
            content: Some(content.into()),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        find_attribute(&self.attributes, key)
    }

    pub fn name(&self) -> Option<&str> {
        self.attribute("name")
    }

    pub fn property(&self) -> Option<&str> {
        self.attribute("property")
    }

    /// 被精化元素的ID（去掉#前缀）
    pub fn refines_id(&self) -> Option<&str> {
        self.attribute("refines").map(|r| r.trim_start_matches('#'))
    }

    /// meta的值：name形式取content属性，property形式取元素文本
    pub fn value(&self) -> Option<&str> {
        if self.name().is_some() {
            self.attribute("content")
        } else {
            self.content.as_deref()
        }
    }
}

/// 元数据值枚举，表示不同类型的元数据
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    /// EPUB规范的Dublin Core标签元数据
    DublinCore {
        element: DcElement,
        /// 元素内容
        value: String,
        /// 元素属性（如 id, opf:role, opf:file-as, opf:scheme, xml:lang）
        attributes: Vec<(String, String)>,
    },
    /// meta标签的自定义元数据
    Meta(MetaValue),
}

impl MetadataValue {
    pub fn dublin_core(element: DcElement, value: impl Into<String>) -> Self {
        MetadataValue::DublinCore {
            element,
            value: value.into(),
            attributes: Vec::new(),
        }
    }

    fn is_element(&self, wanted: &DcElement) -> bool {
        matches!(self, MetadataValue::DublinCore { element, .. } if element == wanted)
    }

    /// 元素的id属性
    pub fn id(&self) -> Option<&str> {
        match self {
            MetadataValue::DublinCore { attributes, .. } => find_attribute(attributes, "id"),
            MetadataValue::Meta(meta) => meta.attribute("id"),
        }
    }
}

/// 创建者信息(作者、编辑者等)
#[derive(Debug, Clone, PartialEq)]
pub struct Creator {
    /// 创建者姓名
    pub name: String,
    /// 角色(如aut、edt等)
    pub role: Option<String>,
    /// 排序用名称
    pub file_as: Option<String>,
    /// 元素ID（用于关联refines元数据）
    pub id: Option<String>,
}

/// 标识符信息
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// 标识符值
    pub value: String,
    /// 标识符类型(如ISBN、UUID等)
    pub scheme: Option<String>,
    pub id: Option<String>,
}

/// OPF文件中的元数据信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<MetadataValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按声明顺序遍历全部元数据
    pub fn entries(&self) -> &[MetadataValue] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 追加一条元数据
    pub fn push(&mut self, value: MetadataValue) {
        self.entries.push(value);
    }

    /// 追加Dublin Core元数据
    pub fn add_dublin_core(
        &mut self,
        element: DcElement,
        value: impl Into<String>,
        attributes: Vec<(String, String)>,
    ) {
        self.entries.push(MetadataValue::DublinCore {
            element,
            value: value.into(),
            attributes,
        });
    }

    /// 设置单值的Dublin Core元数据
    ///
    /// 已有同名元素时替换第一个的位置并删除其余的，否则追加到末尾。
    pub fn set_dublin_core(
        &mut self,
        element: DcElement,
        value: impl Into<String>,
        attributes: Vec<(String, String)>,
    ) {
        let replacement = MetadataValue::DublinCore {
            element: element.clone(),
            value: value.into(),
            attributes,
        };

        match self.entries.iter().position(|e| e.is_element(&element)) {
            Some(index) => {
                self.entries[index] = replacement;
                let mut position = 0;
                self.entries.retain(|e| {
                    let keep = position <= index || !e.is_element(&element);
                    position += 1;
                    keep
                });
            }
            None => self.entries.push(replacement),
        }
    }

    /// 追加meta元数据
    pub fn add_meta(&mut self, meta: MetaValue) {
        self.entries.push(MetadataValue::Meta(meta));
    }

    /// 删除满足条件的元数据，返回删除的数量
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&MetadataValue) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|e| !predicate(e));
        before - self.entries.len()
    }

    /// 在最前面插入一条元数据
    pub(crate) fn insert_first(&mut self, value: MetadataValue) {
        self.entries.insert(0, value);
    }

    /// 指定Dublin Core元素的全部值
    pub fn dublin_core(&self, wanted: &DcElement) -> impl Iterator<Item = &str> + '_ {
        let wanted = wanted.clone();
        self.entries.iter().filter_map(move |e| match e {
            MetadataValue::DublinCore { element, value, .. } if *element == wanted => {
                Some(value.as_str())
            }
            _ => None,
        })
    }

    /// 全部meta元数据
    pub fn metas(&self) -> impl Iterator<Item = &MetaValue> + '_ {
        self.entries.iter().filter_map(|e| match e {
            MetadataValue::Meta(meta) => Some(meta),
            _ => None,
        })
    }

    /// 获取标题
    pub fn title(&self) -> Option<&str> {
        self.dublin_core(&DcElement::Title).next()
    }

    /// 获取语言
    pub fn language(&self) -> Option<&str> {
        self.dublin_core(&DcElement::Language).next()
    }

    /// 按name查找meta的content（如 `cover`）
    pub fn meta_by_name(&self, name: &str) -> Option<&str> {
        self.metas()
            .find(|m| m.name() == Some(name))
            .and_then(|m| m.attribute("content"))
    }

    /// 按property查找不带refines的meta文本（如 `dcterms:modified`）
    pub fn meta_by_property(&self, property: &str) -> Option<&str> {
        self.metas()
            .find(|m| m.property() == Some(property) && m.refines_id().is_none())
            .and_then(|m| m.content.as_deref())
    }

    /// 精化指定元素的全部meta
    pub fn refinements(&self, id: &str) -> Vec<&MetaValue> {
        self.metas().filter(|m| m.refines_id() == Some(id)).collect()
    }

    /// 精化指定元素的某个属性
    fn refinement(&self, id: Option<&str>, property: &str) -> Option<String> {
        let id = id?;
        self.refinements(id)
            .into_iter()
            .find(|m| m.property() == Some(property))
            .and_then(|m| m.content.clone())
    }

    fn people(&self, wanted: DcElement) -> Vec<Creator> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                MetadataValue::DublinCore {
                    element,
                    value,
                    attributes,
                } if *element == wanted => {
                    let id = find_attribute(attributes, "id").map(str::to_string);
                    Some(Creator {
                        name: value.clone(),
                        role: find_attribute(attributes, "opf:role")
                            .map(str::to_string)
                            .or_else(|| self.refinement(id.as_deref(), "role")),
                        file_as: find_attribute(attributes, "opf:file-as")
                            .map(str::to_string)
                            .or_else(|| self.refinement(id.as_deref(), "file-as")),
                        id,
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// 获取所有创建者
    pub fn creators(&self) -> Vec<Creator> {
        self.people(DcElement::Creator)
    }

    /// 获取所有贡献者
    pub fn contributors(&self) -> Vec<Creator> {
        self.people(DcElement::Contributor)
    }

    /// 获取所有标识符
    pub fn identifiers(&self) -> Vec<Identifier> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                MetadataValue::DublinCore {
                    element: DcElement::Identifier,
                    value,
                    attributes,
                } => {
                    let id = find_attribute(attributes, "id").map(str::to_string);
                    Some(Identifier {
                        value: value.clone(),
                        scheme: find_attribute(attributes, "opf:scheme")
                            .map(str::to_string)
                            .or_else(|| self.refinement(id.as_deref(), "identifier-type")),
                        id,
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// id属性等于 `id` 的标识符
    pub fn identifier_with_id(&self, id: &str) -> Option<Identifier> {
        self.identifiers()
            .into_iter()
            .find(|identifier| identifier.id.as_deref() == Some(id))
    }

    /// 元数据中已使用的全部元素id
    pub(crate) fn element_ids(&self) -> Vec<&str> {
        self.entries.iter().filter_map(MetadataValue::id).collect()
    }

    /// 转换为目标版本的元数据写法
    ///
    /// EPUB2 把 role、file-as、identifier-type 的refines折叠为元素上的 `opf:` 属性，
    /// 并丢弃全部refines meta和property形式的meta；EPUB3 把 `opf:` 属性展开为refines meta，
    /// 元素缺少id时生成一个。
    ///
    /// # 参数
    /// * `epub3` - 目标是否为EPUB3
    pub fn to_dialect(&self, epub3: bool) -> Metadata {
        if epub3 { self.to_epub3() } else { self.to_epub2() }
    }

    fn to_epub2(&self) -> Metadata {
        let entries = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                MetadataValue::Meta(meta)
                    if meta.refines_id().is_some() || (meta.name().is_none() && meta.property().is_some()) =>
                {
                    None
                }
                MetadataValue::DublinCore {
                    element,
                    value,
                    attributes,
                } => {
                    let mut folded = attributes.clone();
                    let refinements = find_attribute(attributes, "id")
                        .map(|id| self.refinements(id))
                        .unwrap_or_default();
                    for meta in refinements {
                        let Some(content) = meta.content.as_deref() else {
                            continue;
                        };
                        for (property, attribute, _) in REFINED_ATTRIBUTES {
                            if meta.property() == Some(property) && find_attribute(&folded, attribute).is_none() {
                                folded.push((attribute.to_string(), content.to_string()));
                            }
                        }
                    }
                    Some(MetadataValue::DublinCore {
                        element: element.clone(),
                        value: value.clone(),
                        attributes: folded,
                    })
                }
                other => Some(other.clone()),
            })
            .collect();
        Metadata { entries }
    }

    fn to_epub3(&self) -> Metadata {
        let mut used: Vec<String> = self.element_ids().into_iter().map(str::to_string).collect();
        let mut entries = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let MetadataValue::DublinCore {
                element,
                value,
                attributes,
            } = entry
            else {
                entries.push(entry.clone());
                continue;
            };

            let (moved, mut kept): (Vec<_>, Vec<_>) = attributes
                .iter()
                .cloned()
                .partition(|(key, _)| REFINED_ATTRIBUTES.iter().any(|(_, attribute, _)| key == attribute));
            if moved.is_empty() {
                entries.push(entry.clone());
                continue;
            }

            let id = match find_attribute(&kept, "id") {
                Some(id) => id.to_string(),
                None => {
                    let taken: Vec<&str> = used.iter().map(String::as_str).collect();
                    let id = unused_id(&taken, element.local_name());
                    used.push(id.clone());
                    kept.insert(0, ("id".to_string(), id.clone()));
                    id
                }
            };
            let existing = self.refinements(&id);

            entries.push(MetadataValue::DublinCore {
                element: element.clone(),
                value: value.clone(),
                attributes: kept,
            });
            for (key, content) in moved {
                let Some((property, _, scheme)) = REFINED_ATTRIBUTES
                    .iter()
                    .find(|(_, attribute, _)| *attribute == key)
                else {
                    continue;
                };
                if existing.iter().all(|meta| meta.property() != Some(*property)) {
                    entries.push(MetadataValue::Meta(MetaValue::refines(&id, *property, content, *scheme)));
                }
            }
        }
        Metadata { entries }
    }
}

/// refines属性名、对应的EPUB2属性名、EPUB3写出时的scheme
const REFINED_ATTRIBUTES: [(&str, &str, Option<&str>); 3] = [
    ("role", "opf:role", Some("marc:relators")),
    ("file-as", "opf:file-as", None),
    ("identifier-type", "opf:scheme", None),
];

/// 以 `prefix` 为基础生成未被占用的id
pub(crate) fn unused_id(used: &[&str], prefix: &str) -> String {
    if !used.contains(&prefix) {
        return prefix.to_string();
    }
    (1..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|candidate| !used.contains(&candidate.as_str()))
        .unwrap_or_else(|| prefix.to_string())
}

pub(crate) fn find_attribute<'a>(attributes: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_set_overwrites_singular() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core(DcElement::Title, "Book", vec![]);
        metadata.add_dublin_core(DcElement::Language, "en", vec![]);
        metadata.add_dublin_core(DcElement::Language, "fr", vec![]);
        metadata.add_dublin_core(DcElement::Publisher, "P", vec![]);

        metadata.set_dublin_core(DcElement::Language, "de", vec![]);

        let languages: Vec<&str> = metadata.dublin_core(&DcElement::Language).collect();
        assert_eq!(languages, vec!["de"]);
        assert_eq!(metadata.len(), 3);
        assert!(matches!(
            &metadata.entries()[1],
            MetadataValue::DublinCore { element: DcElement::Language, .. }
        ));
    }

    #[test]
    fn test_creators_with_epub2_attributes() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core(
            DcElement::Creator,
            "Jane Doe",
            attrs(&[("opf:role", "aut"), ("opf:file-as", "Doe, Jane")]),
        );

        let creators = metadata.creators();
        assert_eq!(creators.len(), 1);
        assert_eq!(creators[0].role.as_deref(), Some("aut"));
        assert_eq!(creators[0].file_as.as_deref(), Some("Doe, Jane"));
    }

    #[test]
    fn test_creators_with_epub3_refines() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core(DcElement::Creator, "Jane Doe", attrs(&[("id", "creator")]));
        metadata.add_meta(MetaValue::refines("creator", "role", "aut", Some("marc:relators")));
        metadata.add_meta(MetaValue::refines("creator", "file-as", "Doe, Jane", None));

        let creators = metadata.creators();
        assert_eq!(creators[0].id.as_deref(), Some("creator"));
        assert_eq!(creators[0].role.as_deref(), Some("aut"));
        assert_eq!(creators[0].file_as.as_deref(), Some("Doe, Jane"));
        assert_eq!(metadata.refinements("creator").len(), 2);
    }

    #[test]
    fn test_meta_lookups() {
        let mut metadata = Metadata::new();
        metadata.add_meta(MetaValue::name_based("cover", "cover-img"));
        metadata.add_meta(MetaValue::property_based("dcterms:modified", "2024-01-01T00:00:00Z"));

        assert_eq!(metadata.meta_by_name("cover"), Some("cover-img"));
        assert_eq!(
            metadata.meta_by_property("dcterms:modified"),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(metadata.meta_by_name("missing"), None);
    }

    #[test]
    fn test_identifiers() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core(
            DcElement::Identifier,
            "9780000000000",
            attrs(&[("id", "isbn"), ("opf:scheme", "ISBN")]),
        );
        metadata.add_dublin_core(DcElement::Identifier, "urn:uuid:x", attrs(&[("id", "id")]));

        let isbn = metadata.identifier_with_id("isbn").unwrap();
        assert_eq!(isbn.scheme.as_deref(), Some("ISBN"));
        assert_eq!(metadata.identifier_with_id("id").unwrap().value, "urn:uuid:x");
        assert!(metadata.identifier_with_id("none").is_none());
    }

    #[test]
    fn test_epub3_refines_fold_into_epub2_attributes() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core(DcElement::Identifier, "9780000000000", attrs(&[("id", "bookid")]));
        metadata.add_meta(MetaValue::refines("bookid", "identifier-type", "ISBN", None));
        metadata.add_dublin_core(DcElement::Creator, "Jane Doe", attrs(&[("id", "creator")]));
        metadata.add_meta(MetaValue::refines("creator", "role", "aut", Some("marc:relators")));
        metadata.add_meta(MetaValue::refines("creator", "file-as", "Doe, Jane", None));
        metadata.add_meta(MetaValue::refines("creator", "display-seq", "1", None));
        metadata.add_meta(MetaValue::property_based("dcterms:modified", "2024-01-01T00:00:00Z"));
        metadata.add_meta(MetaValue::name_based("cover", "cover-img"));

        let legacy = metadata.to_dialect(false);
        assert_eq!(legacy.metas().count(), 1);
        assert_eq!(legacy.meta_by_name("cover"), Some("cover-img"));
        assert_eq!(
            legacy.entries()[1],
            MetadataValue::DublinCore {
                element: DcElement::Creator,
                value: "Jane Doe".to_string(),
                attributes: attrs(&[("id", "creator"), ("opf:role", "aut"), ("opf:file-as", "Doe, Jane")]),
            }
        );
        assert_eq!(legacy.identifier_with_id("bookid").unwrap().scheme.as_deref(), Some("ISBN"));
        assert_eq!(legacy.creators(), metadata.creators());
    }

    #[test]
    fn test_epub2_attributes_expand_into_refines() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core(DcElement::Creator, "Jane Doe", attrs(&[("opf:role", "aut"), ("xml:lang", "en")]));
        metadata.add_dublin_core(DcElement::Creator, "Old", attrs(&[("id", "creator")]));
        metadata.add_dublin_core(
            DcElement::Identifier,
            "9780000000000",
            attrs(&[("id", "isbn"), ("opf:scheme", "ISBN")]),
        );
        metadata.add_meta(MetaValue::refines("isbn", "identifier-type", "15", Some("onix:codelist5")));

        let modern = metadata.to_dialect(true);
        assert_eq!(
            modern.entries()[0],
            MetadataValue::DublinCore {
                element: DcElement::Creator,
                value: "Jane Doe".to_string(),
                attributes: attrs(&[("id", "creator1"), ("xml:lang", "en")]),
            }
        );
        assert_eq!(
            modern.entries()[1],
            MetadataValue::Meta(MetaValue::refines("creator1", "role", "aut", Some("marc:relators")))
        );
        assert_eq!(modern.creators()[0].role.as_deref(), Some("aut"));
        assert_eq!(modern.refinements("isbn").len(), 1);
        assert_eq!(modern.identifier_with_id("isbn").unwrap().scheme.as_deref(), Some("15"));
        assert_eq!(metadata.to_dialect(true).to_dialect(true), modern);
    }

    #[test]
    fn test_other_dc_element() {
        assert_eq!(DcElement::from_local_name("source"), DcElement::Other("source".to_string()));
        assert_eq!(DcElement::Other("source".to_string()).qualified_name(), "dc:source");
        assert!(!DcElement::Publisher.is_repeatable());
    }
}
