//! 清单模块
//!
//! 按插入顺序保存全部条目，并维护ID和文件名两个索引。

use crate::epub::error::{EpubError, Result};
use crate::epub::item::{Item, ItemType};
use std::collections::HashMap;

/// 包的清单
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    items: Vec<Item>,
    by_id: HashMap<String, usize>,
    by_file_name: HashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入条目
    ///
    /// ID或文件名冲突时返回错误，清单保持不变。
    pub fn insert(&mut self, item: Item) -> Result<&Item> {
        if self.by_id.contains_key(&item.id) {
            return Err(EpubError::DuplicateId(item.id));
        }
        if self.by_file_name.contains_key(&item.file_name) {
            return Err(EpubError::DuplicateFileName(item.file_name));
        }

        let index = self.items.len();
        self.by_id.insert(item.id.clone(), index);
        self.by_file_name.insert(item.file_name.clone(), index);
        self.items.push(item);
        Ok(&self.items[index])
    }

    /// 按ID删除条目
    pub fn remove(&mut self, id: &str) -> Option<Item> {
        let index = self.by_id.get(id).copied()?;
        let item = self.items.remove(index);
        self.reindex();
        Some(item)
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        self.by_file_name.clear();
        for (index, item) in self.items.iter().enumerate() {
            self.by_id.insert(item.id.clone(), index);
            self.by_file_name.insert(item.file_name.clone(), index);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.by_id.get(id).map(|&index| &self.items[index])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.by_id.get(id).map(|&index| &mut self.items[index])
    }

    pub fn get_by_file_name(&self, file_name: &str) -> Option<&Item> {
        self.by_file_name.get(file_name).map(|&index| &self.items[index])
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn contains_file_name(&self, file_name: &str) -> bool {
        self.by_file_name.contains_key(file_name)
    }

    /// 按插入顺序遍历
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    /// 按插入顺序可变遍历
    ///
    /// ID和文件名不能通过这里修改，因此索引保持有效。
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Item> {
        self.items.iter_mut()
    }

    /// 指定类型的条目，每次调用都重新遍历当前清单
    pub fn of_type(&self, item_type: ItemType) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter().filter(move |item| item.item_type() == item_type)
    }

    /// 第一个指定类型的条目
    pub fn first_of_type(&self, item_type: ItemType) -> Option<&Item> {
        self.of_type(item_type).next()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 根据文件名生成一个未被占用的ID
    ///
    /// 生成的ID满足XML NCName：以字母或下划线开头，只含字母、数字、`-`、`_`、`.`。
    pub fn unique_id_for(&self, file_name: &str) -> String {
        let stem = file_name.rsplit('/').next().unwrap_or(file_name);
        let mut base: String = stem
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let valid_start = base
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_');
        if !valid_start {
            base.insert_str(0, "item_");
        }

        if !self.by_id.contains_key(&base) {
            return base;
        }

        (1..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !self.by_id.contains_key(candidate))
            .unwrap_or(base)
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut manifest = Manifest::new();
        manifest.insert(Item::css("style", "style.css", "")).unwrap();

        let err = manifest.insert(Item::css("style", "other.css", "")).unwrap_err();
        assert!(matches!(err, EpubError::DuplicateId(id) if id == "style"));

        let err = manifest.insert(Item::css("other", "style.css", "")).unwrap_err();
        assert!(matches!(err, EpubError::DuplicateFileName(name) if name == "style.css"));

        assert_eq!(manifest.len(), 1);
        assert!(!manifest.contains_id("other"));
    }

    #[test]
    fn test_remove_reindexes() {
        let mut manifest = Manifest::new();
        manifest.insert(Item::css("a", "a.css", "")).unwrap();
        manifest.insert(Item::css("b", "b.css", "")).unwrap();
        manifest.insert(Item::css("c", "c.css", "")).unwrap();

        assert!(manifest.remove("a").is_some());
        assert!(manifest.remove("a").is_none());
        assert_eq!(manifest.get("c").unwrap().file_name(), "c.css");
        assert_eq!(manifest.get_by_file_name("b.css").unwrap().id(), "b");
    }

    #[test]
    fn test_of_type_is_restartable() {
        let mut manifest = Manifest::new();
        manifest.insert(Item::html("c1", "c1.xhtml", "", "")).unwrap();
        manifest.insert(Item::css("s", "s.css", "")).unwrap();

        assert_eq!(manifest.of_type(ItemType::Html).count(), 1);
        manifest.insert(Item::html("c2", "c2.xhtml", "", "")).unwrap();
        let ids: Vec<&str> = manifest.of_type(ItemType::Html).map(Item::id).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[test]
    fn test_unique_id_for() {
        let mut manifest = Manifest::new();
        assert_eq!(manifest.unique_id_for("text/chap 01.xhtml"), "chap_01.xhtml");
        assert_eq!(manifest.unique_id_for("01.xhtml"), "item_01.xhtml");

        manifest.insert(Item::css("style.css", "a/style.css", "")).unwrap();
        assert_eq!(manifest.unique_id_for("b/style.css"), "style.css_1");
    }
}
