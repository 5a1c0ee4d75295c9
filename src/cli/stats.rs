use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::hash::HashKind;
use crate::store::FingerprintDb;

#[derive(Parser, Debug, Clone)]
pub struct StatsCommand {
    /// 已建立索引的图片目录，省略时列出所有索引库
    pub path: Option<PathBuf>,
}

impl SubCommandExtend for StatsCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            for file in opts.conf_dir.databases() {
                println!("{}", file.display());
            }
            return Ok(());
        };

        let db_path = opts.conf_dir.database_for(path)?;
        if !db_path.exists() {
            bail!("目录尚未建立索引: {}", path.display());
        }

        let db = FingerprintDb::open(&db_path).await?;
        println!("数据库: {}", db_path.display());
        println!("记录总数: {}", db.count().await?);
        for (version, count) in db.count_by_version().await? {
            let name = u8::try_from(version)
                .ok()
                .and_then(HashKind::from_version)
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| format!("未知版本 {version}"));
            println!("  {name}: {count}");
        }
        db.close().await;
        Ok(())
    }
}
