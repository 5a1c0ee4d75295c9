use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use indicatif::ProgressBar;
use log::warn;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::hash::HashKind;
use crate::indexer::{self, CancelToken, DEFAULT_SUFFIXES, IndexOptions, IndexProgress, ProgressFn};
use crate::store::FingerprintDb;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct IndexCommand {
    /// 要索引的图片目录
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = DEFAULT_SUFFIXES)]
    pub suffix: String,
    /// 使用的感知哈希算法
    #[arg(short = 'H', long, value_enum, default_value_t = HashKind::Phash)]
    pub hash: HashKind,
    /// 索引后不清理磁盘上已不存在的记录
    #[arg(long)]
    pub no_reconcile: bool,
    /// 以 JSON 格式输出索引报告
    #[arg(long)]
    pub json: bool,
}

impl SubCommandExtend for IndexCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        opts.conf_dir.ensure_exists()?;
        let db_path = opts.conf_dir.database_for(&self.path)?;
        let db = FingerprintDb::open(&db_path).await?;
        if db.recovered() {
            warn!("检测到损坏的数据库，已重建为空库，本次将全量重新索引");
        }

        let pb = ProgressBar::no_length().with_style(pb_style());
        let progress: ProgressFn = Arc::new({
            let pb = pb.clone();
            move |event| match event {
                IndexProgress::Scanned { total } => pb.set_length(total),
                IndexProgress::File { path } => {
                    pb.set_message(path);
                    pb.inc(1);
                }
            }
        });

        // Ctrl-C 触发协作式取消，在文件边界停下
        let cancel = CancelToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let _ = tokio::signal::ctrl_c().await;
                cancel.cancel();
            }
        });

        let options = IndexOptions {
            kind: self.hash,
            suffix: self.suffix.clone(),
            reconcile: !self.no_reconcile,
            cancel,
            progress: Some(progress),
        };
        let report = indexer::run(&db, &self.path, &options).await?;
        pb.finish_and_clear();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            for err in &report.errors {
                eprintln!("[ERR] {}: {}", err.path, err.message);
            }
            println!(
                "扫描 {}，更新 {}，跳过 {}，删除 {}，失败 {}",
                report.scanned,
                report.updated,
                report.skipped,
                report.removed,
                report.errors.len()
            );
            if report.cancelled {
                println!("任务被取消，已写入的记录保持有效，重新运行可补全剩余部分");
            }
        }

        db.close().await;
        Ok(())
    }
}
