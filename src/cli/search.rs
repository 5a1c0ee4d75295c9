use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, ValueEnum};
use log::warn;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::error::Error;
use crate::hash::HashKind;
use crate::matcher::{self, MatchResult};
use crate::store::FingerprintDb;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    /// 查询图片路径
    pub image: PathBuf,
    /// 已建立索引的图片目录
    pub path: PathBuf,
    /// 两个指纹之间允许的最大汉明距离
    #[arg(short, long, value_name = "N", default_value_t = 8)]
    pub distance: u32,
    /// 显示的结果数量，0 表示不限制
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
    /// 查询使用的感知哈希算法，必须与建立索引时一致
    #[arg(short = 'H', long, value_enum, default_value_t = HashKind::Phash)]
    pub hash: HashKind,
    /// 输出格式
    #[arg(long, value_enum, default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db_path = opts.conf_dir.database_for(&self.path)?;
        if !db_path.exists() {
            bail!("目录尚未建立索引: {}", self.path.display());
        }
        let db = FingerprintDb::open(&db_path).await?;

        let query = block_in_place(|| self.hash.hash_file(&self.image))?;
        let limit = (self.count > 0).then_some(self.count);

        let result = match matcher::find_similar(&db, query, self.hash, self.distance, limit).await
        {
            Ok(result) => result,
            // 版本不一致可恢复：提示后按空结果处理
            Err(e @ Error::VersionMismatch { .. }) => {
                warn!("{e}");
                vec![]
            }
            Err(e) => return Err(e.into()),
        };

        print_result(&result, self.output_format)?;
        db.close().await;
        Ok(())
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

fn print_result(result: &[MatchResult], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for m in result {
                println!("{}\t{}", m.distance, m.path);
            }
        }
    }
    Ok(())
}
