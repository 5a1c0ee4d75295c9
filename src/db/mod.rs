use std::path::Path;

use log::{info, warn};
use sqlx::sqlite::*;
use sqlx::SqlitePool;

pub mod crud;
pub mod model;

pub use model::*;

use crate::error::{Error, Result};

pub type Database = SqlitePool;

/// 初始化数据库连接并执行迁移
///
/// 数据库文件损坏时不会使进程崩溃：损坏的文件被移动到 `<名称>.corrupt`
/// 之后重建空库，返回值的第二项表示是否发生过重建
pub async fn init_db(filename: impl AsRef<Path>) -> Result<(Database, bool)> {
    let filename = filename.as_ref();
    info!("初始化数据库连接: {}", filename.display());

    match open_db(filename).await {
        Ok(pool) => Ok((pool, false)),
        Err(e) if filename.exists() && is_corrupt(&e) => {
            let backup = filename.with_extension("db.corrupt");
            warn!("数据库损坏 ({e})，移动到 {} 后重建", backup.display());
            std::fs::rename(filename, &backup)?;
            // WAL 副文件一并清理，避免重建后继续报错
            for suffix in ["-wal", "-shm"] {
                let mut side = filename.as_os_str().to_owned();
                side.push(suffix);
                let _ = std::fs::remove_file(side);
            }
            let pool = open_db(filename).await?;
            Ok((pool, true))
        }
        Err(e) => Err(Error::Storage(e)),
    }
}

/// 打开单连接内存库，供隔离测试使用
///
/// 连接必须常驻：内存库随最后一个连接关闭而消失
pub async fn init_memory_db() -> Result<Database, sqlx::Error> {
    let options = SqliteConnectOptions::new().in_memory(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    sqlx::migrate!().run(&pool).await?;
    Ok(pool)
}

async fn open_db(filename: &Path) -> Result<Database, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .filename(filename)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;
    sqlx::migrate!().run(&pool).await?;
    Ok(pool)
}

/// 判断打开失败是否由文件损坏引起
fn is_corrupt(e: &sqlx::Error) -> bool {
    let msg = e.to_string();
    msg.contains("not a database") || msg.contains("malformed")
}
