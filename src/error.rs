use std::path::PathBuf;

/// 引擎内部的错误类型
///
/// CLI 边界统一转为 anyhow，库内部保持类型化，
/// 以便调用方区分可恢复错误和致命错误
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 图片解码失败，索引过程中按文件记录，不中断整个任务
    #[error("无法解码图片 {}: {}", path.display(), message)]
    Decode { path: PathBuf, message: String },

    /// 存储不可用：无法打开或写入数据库，当前操作整体失败
    #[error("存储不可用: {0}")]
    Storage(#[from] sqlx::Error),

    /// 数据库文件损坏，已被移走并重建为空库
    #[error("数据库损坏，已重建: {0}")]
    StorageCorrupt(String),

    /// 查询指纹的算法版本在库中没有可比较的记录
    #[error("哈希版本不一致: 查询使用版本 {query}, 库中没有同版本记录")]
    VersionMismatch { query: u8 },

    /// 已有一个索引任务在运行，拒绝并发写入
    #[error("索引任务已在运行中")]
    IndexBusy,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn decode(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        Self::Decode { path: path.into(), message: err.to_string() }
    }
}
