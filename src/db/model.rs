use sqlx::FromRow;

use crate::hash::{Fingerprint, HashKind};

/// 一条已索引的图片记录
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ImageRecord {
    /// 规范化后的绝对路径，唯一键
    pub path: String,
    /// 8 字节小端序指纹
    pub fingerprint: Vec<u8>,
    /// 产生指纹的算法版本
    pub hash_version: i64,
    pub file_size: i64,
    /// 修改时间，毫秒级时间戳
    pub modified_ms: i64,
}

impl ImageRecord {
    pub fn new(
        path: String,
        fingerprint: Fingerprint,
        kind: HashKind,
        file_size: u64,
        modified_ms: i64,
    ) -> Self {
        Self {
            path,
            fingerprint: fingerprint.to_bytes().to_vec(),
            hash_version: kind.version() as i64,
            file_size: file_size as i64,
            modified_ms,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_bytes(&self.fingerprint)
    }

    /// 记录对应的哈希算法，版本号未知时返回 None
    pub fn kind(&self) -> Option<HashKind> {
        u8::try_from(self.hash_version).ok().and_then(HashKind::from_version)
    }
}
