use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::store::FingerprintDb;

#[derive(Parser, Debug, Clone)]
pub struct CleanCommand {
    /// 要清空索引的图片目录
    pub path: PathBuf,
}

impl SubCommandExtend for CleanCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db_path = opts.conf_dir.database_for(&self.path)?;
        if !db_path.exists() {
            bail!("目录尚未建立索引: {}", self.path.display());
        }

        let db = FingerprintDb::open(&db_path).await?;
        let removed = db.clear().await?;
        println!("已删除 {removed} 条记录");
        db.close().await;
        Ok(())
    }
}
