//! 读写插件
//!
//! 读取完成后和写出之前，读取器与写出器依次调用每个插件的钩子。
//! 钩子返回错误时整个操作立即终止。

use crate::epub::error::{EpubError, Result};
use crate::epub::item::{Item, ItemKind};
use crate::epub::opf::package::Package;

/// 钩子的返回值，错误信息会被包装为 [`EpubError::Plugin`]
pub type HookResult = std::result::Result<(), String>;

/// 插件
///
/// 所有钩子默认什么都不做，插件只需要实现关心的部分。
pub trait Plugin {
    /// 插件名称，出现在错误信息中
    fn name(&self) -> &str;

    /// 写出前处理整个包（写出器操作的是包的副本）
    fn before_write(&self, _package: &mut Package) -> HookResult {
        Ok(())
    }

    /// 读取完成后处理整个包
    fn after_read(&self, _package: &mut Package) -> HookResult {
        Ok(())
    }

    /// 写出前处理每个HTML章节
    fn html_before_write(&self, _item: &mut Item) -> HookResult {
        Ok(())
    }

    /// 读取后处理每个HTML章节
    fn html_after_read(&self, _item: &mut Item) -> HookResult {
        Ok(())
    }
}

/// 钩子调用时机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Read,
    Write,
}

/// 依次运行全部插件：先是包级钩子，再按清单顺序对每个HTML章节运行章节钩子
pub(crate) fn run(plugins: &[Box<dyn Plugin>], package: &mut Package, stage: Stage) -> Result<()> {
    for plugin in plugins {
        let outcome = match stage {
            Stage::Read => plugin.after_read(package),
            Stage::Write => plugin.before_write(package),
        };
        outcome.map_err(|reason| failed(plugin.as_ref(), reason))?;
    }

    if plugins.is_empty() {
        return Ok(());
    }

    for item in package.items_mut() {
        if !matches!(item.kind, ItemKind::Html(_)) {
            continue;
        }
        for plugin in plugins {
            let outcome = match stage {
                Stage::Read => plugin.html_after_read(item),
                Stage::Write => plugin.html_before_write(item),
            };
            outcome.map_err(|reason| failed(plugin.as_ref(), reason))?;
        }
    }

    tracing::debug!(count = plugins.len(), ?stage, "plugins applied");
    Ok(())
}

fn failed(plugin: &dyn Plugin, reason: String) -> EpubError {
    EpubError::Plugin {
        name: plugin.name().to_string(),
        reason,
    }
}
