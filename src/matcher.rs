//! 相似图片匹配
//!
//! 线性扫描存储中的指纹，按汉明距离过滤并排序。
//! 只比较与查询指纹同一算法版本的记录，跨版本距离没有意义

use std::path::Path;

use futures::StreamExt;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::hash::{Fingerprint, HashKind};
use crate::store::FingerprintDb;

/// 单条匹配结果，每次查询临时生成，不持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub path: String,
    pub distance: u32,
}

/// 查找与查询指纹距离不超过 max_distance 的所有记录
///
/// 结果按距离升序排列，距离相同时按路径排序保证确定性。
/// 空库返回空结果；库非空但没有同版本记录时返回
/// [`Error::VersionMismatch`]，调用方可以把它当作空结果处理
pub async fn find_similar(
    db: &FingerprintDb,
    query: Fingerprint,
    kind: HashKind,
    max_distance: u32,
    limit: Option<usize>,
) -> Result<Vec<MatchResult>> {
    let version = kind.version() as i64;
    let mut matches = Vec::new();
    let mut total = 0usize;
    let mut comparable = 0usize;

    {
        let mut stream = db.stream_all();
        while let Some(record) = stream.next().await {
            let record = record.map_err(Error::Storage)?;
            total += 1;
            if record.hash_version != version {
                continue;
            }
            comparable += 1;
            let distance = query.distance(record.fingerprint());
            if distance <= max_distance {
                matches.push(MatchResult { path: record.path, distance });
            }
        }
    }

    if total > 0 && comparable == 0 {
        return Err(Error::VersionMismatch { query: kind.version() });
    }

    matches.sort_unstable_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.path.cmp(&b.path)));
    if let Some(limit) = limit {
        matches.truncate(limit);
    }
    Ok(matches)
}

/// 解码查询图片并搜索，组合哈希计算与匹配
pub async fn find_similar_image(
    db: &FingerprintDb,
    image: impl AsRef<Path>,
    kind: HashKind,
    max_distance: u32,
    limit: Option<usize>,
) -> Result<Vec<MatchResult>> {
    let query = kind.hash_file(image)?;
    find_similar(db, query, kind, max_distance, limit).await
}
