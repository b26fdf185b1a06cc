use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use local_es::{Document, LocalStore, StoreConfig};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 本地文件版文档存储的命令行入口
#[derive(Parser)]
#[command(name = "local-es", version, about)]
struct Cli {
    /// TOML 配置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 覆盖配置中的 data_dir
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 创建索引（已有文档不会被清空）
    CreateIndex { index: String, mapping: String },
    /// 索引是否存在
    ExistsIndex { index: String },
    /// 整体写入文档
    Index { index: String, id: String, body: String },
    /// 浅合并更新文档
    Update { index: String, id: String, body: String },
    /// 按 id 读取文档
    Get { index: String, id: String },
    /// 删除文档
    Delete { index: String, id: String },
    /// 执行查询（JSON 请求体）
    Search { index: String, body: String },
    /// 统计命中数
    Count {
        index: String,
        #[arg(default_value = "{}")]
        body: String,
    },
}

fn parse_json(what: &str, raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{what} is not valid JSON"))
}

fn parse_document(raw: &str) -> anyhow::Result<Document> {
    match parse_json("document", raw)? {
        Value::Object(doc) => Ok(doc),
        other => anyhow::bail!("document must be a JSON object, got {other}"),
    }
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let store = LocalStore::open(&config)?;
    info!("Using store at {:?}", store.root());

    match cli.command {
        Command::CreateIndex { index, mapping } => {
            let mapping = parse_json("mapping", &mapping)?;
            print(&store.create_index(&index, &mapping).await?)?;
        }
        Command::ExistsIndex { index } => print(&store.index_exists(&index).await?)?,
        Command::Index { index, id, body } => {
            print(&store.index(&index, &id, parse_document(&body)?).await?)?;
        }
        Command::Update { index, id, body } => {
            print(&store.update(&index, &id, parse_document(&body)?).await?)?;
        }
        Command::Get { index, id } => print(&store.get(&index, &id).await?)?,
        Command::Delete { index, id } => print(&store.delete(&index, &id).await?)?,
        Command::Search { index, body } => {
            let body = parse_json("search body", &body)?;
            print(&store.search(&index, &body).await?)?;
        }
        Command::Count { index, body } => {
            let body = parse_json("search body", &body)?;
            print(&store.count(&index, &body).await?)?;
        }
    }

    store.close().await;
    Ok(())
}
