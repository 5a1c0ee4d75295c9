//! 指纹存储的门面
//!
//! 持有连接池和单写者锁，索引器和匹配器只通过这里访问持久化记录

use std::path::Path;

use futures::stream::BoxStream;
use tokio::sync::{Mutex, MutexGuard};

use crate::db::{self, Database, ImageRecord, crud};
use crate::error::{Error, Result};
use crate::hash::HashKind;

pub struct FingerprintDb {
    pool: Database,
    recovered: bool,
    index_lock: Mutex<()>,
}

/// 索引期间持有的单写者锁
///
/// 离开作用域即释放，期间第二个索引任务会被拒绝
pub struct IndexGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

impl FingerprintDb {
    /// 打开或创建指定路径上的指纹库
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (pool, recovered) = db::init_db(path).await?;
        Ok(Self { pool, recovered, index_lock: Mutex::new(()) })
    }

    /// 打开内存库，只用于隔离测试
    pub async fn open_memory() -> Result<Self> {
        let pool = db::init_memory_db().await.map_err(Error::Storage)?;
        Ok(Self { pool, recovered: false, index_lock: Mutex::new(()) })
    }

    /// 打开时是否发生过损坏恢复
    pub fn recovered(&self) -> bool {
        self.recovered
    }

    /// 获取单写者锁，已有索引任务运行时返回 [`Error::IndexBusy`]
    pub fn try_begin_index(&self) -> Result<IndexGuard<'_>> {
        self.index_lock.try_lock().map(IndexGuard).map_err(|_| Error::IndexBusy)
    }

    pub async fn upsert(&self, record: &ImageRecord) -> Result<()> {
        crud::upsert_image(&self.pool, record).await?;
        Ok(())
    }

    pub async fn get(&self, path: &str) -> Result<Option<ImageRecord>> {
        Ok(crud::get_image(&self.pool, path).await?)
    }

    pub async fn delete(&self, path: &str) -> Result<bool> {
        Ok(crud::delete_image(&self.pool, path).await?)
    }

    /// 清空所有记录，返回删除数量
    pub async fn clear(&self) -> Result<u64> {
        Ok(crud::delete_all(&self.pool).await?)
    }

    /// 惰性遍历全部记录
    pub fn stream_all(&self) -> BoxStream<'_, sqlx::Result<ImageRecord>> {
        crud::stream_images(&self.pool)
    }

    pub async fn list_paths(&self) -> Result<Vec<String>> {
        Ok(crud::list_paths(&self.pool).await?)
    }

    pub async fn needs_reindex(
        &self,
        path: &str,
        file_size: i64,
        modified_ms: i64,
        kind: HashKind,
    ) -> Result<bool> {
        Ok(crud::needs_reindex(&self.pool, path, file_size, modified_ms, kind.version() as i64)
            .await?)
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(crud::count_images(&self.pool).await?)
    }

    pub async fn count_version(&self, kind: HashKind) -> Result<i64> {
        Ok(crud::count_version(&self.pool, kind.version() as i64).await?)
    }

    pub async fn count_by_version(&self) -> Result<Vec<(i64, i64)>> {
        Ok(crud::count_by_version(&self.pool).await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
