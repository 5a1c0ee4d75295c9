use futures::stream::BoxStream;
use sqlx::{Result, SqlitePool};

use super::ImageRecord;

/// 插入或替换图片记录，以路径为键
pub async fn upsert_image(pool: &SqlitePool, record: &ImageRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO image (path, fingerprint, hash_version, file_size, modified_ms)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.path)
    .bind(&record.fingerprint)
    .bind(record.hash_version)
    .bind(record.file_size)
    .bind(record.modified_ms)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_image(pool: &SqlitePool, path: &str) -> Result<Option<ImageRecord>> {
    sqlx::query_as(
        r#"
        SELECT path, fingerprint, hash_version, file_size, modified_ms
        FROM image WHERE path = ?
        "#,
    )
    .bind(path)
    .fetch_optional(pool)
    .await
}

/// 删除图片记录，返回是否确实存在并被删除
pub async fn delete_image(pool: &SqlitePool, path: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM image WHERE path = ?").bind(path).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// 清空全部记录，对应从头重建索引
pub async fn delete_all(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM image").execute(pool).await?;
    Ok(result.rows_affected())
}

/// 惰性遍历所有记录，按路径排序保证结果可重放
pub fn stream_images(pool: &SqlitePool) -> BoxStream<'_, Result<ImageRecord>> {
    sqlx::query_as::<_, ImageRecord>(
        r#"
        SELECT path, fingerprint, hash_version, file_size, modified_ms
        FROM image ORDER BY path
        "#,
    )
    .fetch(pool)
}

pub async fn list_paths(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT path FROM image ORDER BY path").fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(p,)| p).collect())
}

/// 判断文件是否需要重新哈希
///
/// 记录不存在，或存储的大小、修改时间、算法版本任意一项
/// 与当前值不同时返回 true
pub async fn needs_reindex(
    pool: &SqlitePool,
    path: &str,
    file_size: i64,
    modified_ms: i64,
    hash_version: i64,
) -> Result<bool> {
    let row: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT file_size, modified_ms, hash_version FROM image WHERE path = ?",
    )
    .bind(path)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some((size, mtime, version)) => {
            size != file_size || mtime != modified_ms || version != hash_version
        }
        None => true,
    })
}

pub async fn count_images(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM image").fetch_one(pool).await?;
    Ok(count)
}

/// 统计指定算法版本的记录数量
pub async fn count_version(pool: &SqlitePool, hash_version: i64) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM image WHERE hash_version = ?")
            .bind(hash_version)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// 各算法版本的记录数量，按版本号排序
pub async fn count_by_version(pool: &SqlitePool) -> Result<Vec<(i64, i64)>> {
    sqlx::query_as(
        "SELECT hash_version, COUNT(*) FROM image GROUP BY hash_version ORDER BY hash_version",
    )
    .fetch_all(pool)
    .await
}
