//! 目录索引器
//!
//! 枚举目录下的图片文件，跳过未变化的记录，并行计算指纹后串行写入存储，
//! 最后清理磁盘上已不存在的记录。单个文件的失败只计入报告，不中断任务

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;
use regex::Regex;
use serde::Serialize;
use tokio::sync::mpsc::channel;
use tokio::task::spawn_blocking;
use walkdir::WalkDir;

use crate::db::ImageRecord;
use crate::error::Result;
use crate::hash::HashKind;
use crate::store::FingerprintDb;
use crate::utils;

/// 默认的图片后缀白名单
pub const DEFAULT_SUFFIXES: &str = "jpg,jpeg,png,webp";

/// 协作式取消令牌
///
/// 只在文件边界检查，不会打断单个文件的解码，因此不会破坏存储状态
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 索引进度事件，供 UI 层挂接进度条
#[derive(Debug, Clone)]
pub enum IndexProgress {
    /// 目录扫描完成，total 为候选文件总数
    Scanned { total: u64 },
    /// 一个文件处理完毕，无论成功与否
    File { path: String },
}

pub type ProgressFn = Arc<dyn Fn(IndexProgress) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct IndexError {
    pub path: String,
    pub message: String,
}

/// 一次索引运行的汇总报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    /// 命中后缀白名单的文件总数
    pub scanned: usize,
    /// 重新计算并写入的记录数
    pub updated: usize,
    /// 元数据未变化而跳过的文件数
    pub skipped: usize,
    /// 对账删除的失效记录数
    pub removed: usize,
    /// 按文件收集的错误，不会中断整个运行
    pub errors: Vec<IndexError>,
    /// 是否被取消令牌截断
    pub cancelled: bool,
}

#[derive(Clone)]
pub struct IndexOptions {
    pub kind: HashKind,
    /// 逗号分隔的后缀白名单
    pub suffix: String,
    /// 是否在索引后删除磁盘上已不存在的记录
    pub reconcile: bool,
    pub cancel: CancelToken,
    pub progress: Option<ProgressFn>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            kind: HashKind::Phash,
            suffix: DEFAULT_SUFFIXES.to_string(),
            reconcile: true,
            cancel: CancelToken::new(),
            progress: None,
        }
    }
}

struct StaleFile {
    path: PathBuf,
    key: String,
    size: i64,
    mtime: i64,
}

/// 对 root 目录执行一次索引
///
/// 幂等：目录未变化时第二次运行 `updated == 0`。
/// 可恢复：每个文件的写入彼此独立，中断后重跑即可补全剩余部分
pub async fn run(
    db: &FingerprintDb,
    root: impl AsRef<Path>,
    opts: &IndexOptions,
) -> Result<IndexReport> {
    let _guard = db.try_begin_index()?;

    let root = utils::normalize_path(root)?;
    let re = utils::suffix_regex(&opts.suffix);
    let mut report = IndexReport::default();

    let files = scan_files(&root, &re);
    report.scanned = files.len();
    info!("扫描完成: {} 下共 {} 个候选文件", root.display(), files.len());
    notify(&opts.progress, IndexProgress::Scanned { total: files.len() as u64 });

    // 过滤未变化的文件
    let mut stale = Vec::new();
    for path in files {
        if opts.cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let key = path.to_string_lossy().into_owned();
        match std::fs::metadata(&path) {
            Ok(meta) => {
                let (size, mtime) = (meta.len() as i64, utils::modified_ms(&meta));
                if db.needs_reindex(&key, size, mtime, opts.kind).await? {
                    stale.push(StaleFile { path, key, size, mtime });
                } else {
                    report.skipped += 1;
                    notify(&opts.progress, IndexProgress::File { path: key });
                }
            }
            Err(e) => {
                report.errors.push(IndexError { path: key.clone(), message: e.to_string() });
                notify(&opts.progress, IndexProgress::File { path: key });
            }
        }
    }

    // 并行哈希，写入保持串行
    if !report.cancelled && !stale.is_empty() {
        let kind = opts.kind;
        let cancel = opts.cancel.clone();
        let (tx, mut rx) = channel(num_cpus::get() * 2);

        let worker = spawn_blocking(move || {
            rayon::scope(|s| {
                for file in stale {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let tx = tx.clone();
                    s.spawn(move |_| {
                        let result = kind.hash_file(&file.path);
                        // 发送失败说明接收端已经退出，直接丢弃
                        let _ = tx.blocking_send((file, result));
                    });
                }
            });
        });

        while let Some((file, result)) = rx.recv().await {
            match result {
                Ok(fp) => {
                    let record =
                        ImageRecord::new(file.key.clone(), fp, kind, file.size as u64, file.mtime);
                    db.upsert(&record).await?;
                    report.updated += 1;
                }
                Err(e) => {
                    report.errors.push(IndexError { path: file.key.clone(), message: e.to_string() })
                }
            }
            notify(&opts.progress, IndexProgress::File { path: file.key });
        }
        let _ = worker.await;

        if opts.cancel.is_cancelled() {
            report.cancelled = true;
        }
    }

    // 对账：删除磁盘上已不存在的记录
    if opts.reconcile && !report.cancelled {
        for path in db.list_paths().await? {
            if opts.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if !Path::new(&path).exists() && db.delete(&path).await? {
                report.removed += 1;
            }
        }
    }

    info!(
        "索引完成: 扫描 {} 更新 {} 跳过 {} 删除 {} 失败 {}",
        report.scanned,
        report.updated,
        report.skipped,
        report.removed,
        report.errors.len()
    );
    Ok(report)
}

/// 递归枚举后缀命中白名单的文件
fn scan_files(root: &Path, re: &Regex) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry.path().extension().map(|s| re.is_match(&s.to_string_lossy())) == Some(true)
        })
        .map(|entry| entry.into_path())
        .collect()
}

fn notify(progress: &Option<ProgressFn>, event: IndexProgress) {
    if let Some(f) = progress {
        f(event);
    }
}
