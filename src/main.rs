use clap::{Parser, Subcommand, ValueEnum};
use epubforge::{
    DcElement, EpubConfig, EpubReader, EpubVersion, EpubWriter, ItemType, Package, Result, TocTree,
    TocTreeStyle,
};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// 📚 epubforge - EPUB读取、检查与重建工具
#[derive(Parser)]
#[command(name = "epubforge")]
#[command(about = "一个用于读取、检查和重建EPUB文件的Rust工具")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 显示版本、元数据和清单概要
    Info {
        /// EPUB文件路径
        epub: PathBuf,
        /// 列出每个清单项
        #[arg(short, long)]
        verbose: bool,
    },
    /// 显示目录树
    Toc {
        /// EPUB文件路径
        epub: PathBuf,
        /// 显示样式
        #[arg(long, value_enum, default_value = "tree")]
        style: TreeStyle,
        /// 最大显示深度
        #[arg(long)]
        max_depth: Option<u32>,
        /// 显示每个条目的目标路径
        #[arg(long)]
        paths: bool,
    },
    /// 读取后重新写出
    Rebuild {
        /// 输入文件
        input: PathBuf,
        /// 输出文件
        output: PathBuf,
        /// 以指定版本写出（2.0 或 3.0）
        #[arg(long, value_parser = parse_version)]
        epub_version: Option<EpubVersion>,
        /// EPUB3同时写出NCX
        #[arg(long)]
        legacy_ncx: bool,
        /// YAML配置文件
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// 输出默认配置
    Config,
}

/// 目录树显示样式
#[derive(ValueEnum, Clone, Copy, Debug)]
enum TreeStyle {
    /// 树状符号
    Tree,
    /// 缩进列表
    Indented,
}

impl From<TreeStyle> for TocTreeStyle {
    fn from(style: TreeStyle) -> Self {
        match style {
            TreeStyle::Tree => TocTreeStyle::TreeSymbols,
            TreeStyle::Indented => TocTreeStyle::Indented,
        }
    }
}

fn parse_version(text: &str) -> std::result::Result<EpubVersion, String> {
    EpubVersion::parse(text).ok_or_else(|| format!("无效的EPUB版本: {}", text))
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "epubforge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    if let Err(e) = run(args.command) {
        eprintln!("❌ 错误: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Info { epub, verbose } => {
            let package = EpubReader::new().read_path(&epub)?;
            display_info(&package, verbose);
        }
        Command::Toc {
            epub,
            style,
            max_depth,
            paths,
        } => {
            let package = EpubReader::new().read_path(&epub)?;
            display_toc(&package, style.into(), max_depth, paths);
        }
        Command::Rebuild {
            input,
            output,
            epub_version,
            legacy_ncx,
            config,
        } => {
            let config = match config {
                Some(path) => EpubConfig::from_path(path)?,
                None => EpubConfig::default(),
            };
            let mut package = EpubReader::with_config(&config).read_path(&input)?;
            if let Some(version) = epub_version {
                package.version = version;
            }
            if legacy_ncx {
                package.legacy_ncx = true;
            }
            EpubWriter::with_config(&config).write_path(&package, &output)?;
            println!("🎉 已写出: {}", output.display());
        }
        Command::Config => {
            print!("{}", EpubConfig::default().to_yaml()?);
        }
    }
    Ok(())
}

/// 显示包的基本信息
fn display_info(package: &Package, verbose: bool) {
    println!("📖 EPUB版本: {}", package.version);
    println!("📦 包文档: {}", package.package_path);

    println!("\n📚 基本信息:");
    if let Some(title) = package.title() {
        println!("  标题: {}", title);
    }
    let creators = package.metadata.creators();
    if !creators.is_empty() {
        println!("  作者:");
        for (i, creator) in creators.iter().enumerate() {
            let mut author_info = format!("    {}. {}", i + 1, creator.name);
            if let Some(role) = &creator.role {
                author_info.push_str(&format!(" ({})", role));
            }
            if let Some(file_as) = &creator.file_as {
                author_info.push_str(&format!(" [排序: {}]", file_as));
            }
            println!("{}", author_info);
        }
    }
    if let Some(language) = package.language() {
        println!("  语言: {}", language);
    }
    for (label, element) in [
        ("出版社", DcElement::Publisher),
        ("出版日期", DcElement::Date),
        ("版权", DcElement::Rights),
    ] {
        if let Some(value) = package.metadata.dublin_core(&element).next() {
            println!("  {}: {}", label, value);
        }
    }
    let subjects: Vec<&str> = package.metadata.dublin_core(&DcElement::Subject).collect();
    if !subjects.is_empty() {
        println!("  主题: {}", subjects.join(", "));
    }
    if let Some(identifier) = package.identifier() {
        println!("  唯一标识符: {}", identifier);
    }
    if let Some(direction) = package.direction {
        println!("  阅读方向: {}", direction.as_str());
    }

    println!("\n📁 文件统计:");
    println!("  清单项目: {} 个", package.manifest().len());
    println!("  脊柱项目: {} 个", package.spine.len());
    println!("  章节: {} 个", package.chapters().count());
    for (label, item_type) in [
        ("图片", ItemType::Image),
        ("样式", ItemType::Css),
        ("字体", ItemType::Font),
    ] {
        let count = package.get_items_by_type(item_type).count();
        if count > 0 {
            println!("  {}: {} 个", label, count);
        }
    }
    if let Some(cover) = package.get_items_by_type(ItemType::Cover).next() {
        println!("  封面图片: {}", cover.file_name());
    }
    if package.legacy_ncx {
        println!("  同时包含NCX目录");
    }

    if verbose {
        println!("\n📄 清单:");
        for (i, item) in package.items().enumerate() {
            println!(
                "  {}. {} -> {} ({})",
                i + 1,
                item.id(),
                item.file_name(),
                item.media_type()
            );
        }
        println!("\n📑 脊柱:");
        for (i, itemref) in package.spine.iter().enumerate() {
            let linear = if itemref.linear { "" } else { " [非线性]" };
            println!("  {}. {}{}", i + 1, itemref.idref, linear);
        }
    }
}

/// 显示目录树
fn display_toc(package: &Package, style: TocTreeStyle, max_depth: Option<u32>, paths: bool) {
    if package.toc.is_empty() {
        println!("⚠️  这本书没有目录");
        return;
    }

    let tree = TocTree::from_entries(package.title().map(str::to_string), &package.toc)
        .with_style(style)
        .with_max_depth(max_depth)
        .with_show_paths(paths);
    print!("{}", tree);

    let stats = tree.get_statistics();
    println!(
        "\n📊 共 {} 个条目，最大深度 {}，{} 个叶子节点",
        stats.total_nodes, stats.max_depth, stats.leaf_count
    );
}
