//! 存储、索引器和匹配器的集成测试

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, Luma};
use simfind::db::ImageRecord;
use simfind::error::Error;
use simfind::hash::{Fingerprint, HashKind};
use simfind::indexer::{self, CancelToken, IndexOptions};
use simfind::matcher;
use simfind::store::FingerprintDb;
use tempfile::TempDir;

/// 低频结构丰富的灰度测试图，(a, b) 控制图案形状
fn wave_image(w: u32, h: u32, a: f64, b: f64) -> DynamicImage {
    let img = ImageBuffer::from_fn(w, h, |x, y| {
        let fx = x as f64 / w as f64;
        let fy = y as f64 / h as f64;
        let v = 128.0 + 60.0 * (fx * a).sin() * (fy * b).cos() + 40.0 * ((fx * fx + fy) * a).sin();
        Luma([v.clamp(0.0, 255.0) as u8])
    });
    DynamicImage::ImageLuma8(img)
}

fn checkerboard(w: u32, h: u32) -> DynamicImage {
    let img = ImageBuffer::from_fn(w, h, |x, y| {
        Luma([if (x / 8 + y / 8) % 2 == 0 { 0u8 } else { 255 }])
    });
    DynamicImage::ImageLuma8(img)
}

fn save_png(dir: &Path, name: &str, img: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

fn record(path: &str, fp: u64, kind: HashKind) -> ImageRecord {
    ImageRecord::new(path.to_string(), Fingerprint::from_u64(fp), kind, 1, 1)
}

#[tokio::test]
async fn store_upsert_get_delete() {
    let db = FingerprintDb::open_memory().await.unwrap();

    let rec = record("/a/b.png", 0x1234, HashKind::Phash);
    db.upsert(&rec).await.unwrap();
    assert_eq!(db.get("/a/b.png").await.unwrap(), Some(rec.clone()));
    assert_eq!(db.count().await.unwrap(), 1);

    // 相同元数据不需要重新索引，任何一项变化都需要
    assert!(!db.needs_reindex("/a/b.png", 1, 1, HashKind::Phash).await.unwrap());
    assert!(db.needs_reindex("/a/b.png", 2, 1, HashKind::Phash).await.unwrap());
    assert!(db.needs_reindex("/a/b.png", 1, 2, HashKind::Phash).await.unwrap());
    assert!(db.needs_reindex("/a/b.png", 1, 1, HashKind::Dhash).await.unwrap());
    assert!(db.needs_reindex("/未知.png", 1, 1, HashKind::Phash).await.unwrap());

    assert!(db.delete("/a/b.png").await.unwrap());
    assert!(!db.delete("/a/b.png").await.unwrap());
    assert_eq!(db.get("/a/b.png").await.unwrap(), None);
}

#[tokio::test]
async fn store_upsert_replaces_by_path() {
    let db = FingerprintDb::open_memory().await.unwrap();

    db.upsert(&record("/a.png", 1, HashKind::Phash)).await.unwrap();
    db.upsert(&record("/a.png", 2, HashKind::Phash)).await.unwrap();

    // 每个路径至多一条记录
    assert_eq!(db.count().await.unwrap(), 1);
    let rec = db.get("/a.png").await.unwrap().unwrap();
    assert_eq!(rec.fingerprint(), Fingerprint::from_u64(2));
}

#[tokio::test]
async fn index_is_idempotent() {
    let dir = TempDir::new().unwrap();
    for (i, a) in [2.1, 5.3, 9.7].iter().enumerate() {
        save_png(dir.path(), &format!("img{i}.png"), &wave_image(64, 64, *a, 3.0));
    }
    let db = FingerprintDb::open_memory().await.unwrap();
    let opts = IndexOptions::default();

    let report = indexer::run(&db, dir.path(), &opts).await.unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.updated, 3);
    assert_eq!(report.skipped, 0);
    assert!(report.errors.is_empty());

    // 目录未变化，第二次运行不应重写任何记录
    let report = indexer::run(&db, dir.path(), &opts).await.unwrap();
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped, 3);
}

#[tokio::test]
async fn index_detects_stale_file() {
    let dir = TempDir::new().unwrap();
    save_png(dir.path(), "a.png", &wave_image(64, 64, 2.1, 3.0));
    save_png(dir.path(), "b.png", &wave_image(64, 64, 5.3, 3.0));
    let db = FingerprintDb::open_memory().await.unwrap();
    let opts = IndexOptions::default();
    indexer::run(&db, dir.path(), &opts).await.unwrap();

    // 内容变化导致文件大小不同，即使 mtime 分辨率不够也能检测到
    save_png(dir.path(), "a.png", &wave_image(96, 96, 7.9, 1.3));

    let report = indexer::run(&db, dir.path(), &opts).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn index_reconciles_deleted_files() {
    let dir = TempDir::new().unwrap();
    let victim = save_png(dir.path(), "a.png", &wave_image(64, 64, 2.1, 3.0));
    save_png(dir.path(), "b.png", &wave_image(64, 64, 5.3, 3.0));
    let db = FingerprintDb::open_memory().await.unwrap();
    let opts = IndexOptions::default();
    indexer::run(&db, dir.path(), &opts).await.unwrap();

    std::fs::remove_file(&victim).unwrap();

    let report = indexer::run(&db, dir.path(), &opts).await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(db.count().await.unwrap(), 1);
}

#[tokio::test]
async fn index_keeps_records_without_reconcile() {
    let dir = TempDir::new().unwrap();
    let victim = save_png(dir.path(), "a.png", &wave_image(64, 64, 2.1, 3.0));
    let db = FingerprintDb::open_memory().await.unwrap();
    let mut opts = IndexOptions::default();
    indexer::run(&db, dir.path(), &opts).await.unwrap();

    std::fs::remove_file(&victim).unwrap();
    opts.reconcile = false;

    let report = indexer::run(&db, dir.path(), &opts).await.unwrap();
    assert_eq!(report.removed, 0);
    assert_eq!(db.count().await.unwrap(), 1);
}

#[tokio::test]
async fn index_collects_per_file_errors() {
    let dir = TempDir::new().unwrap();
    save_png(dir.path(), "good.png", &wave_image(64, 64, 2.1, 3.0));
    // 坏文件只计入错误，不中断整个任务
    std::fs::write(dir.path().join("bad.png"), b"this is not a png").unwrap();

    let db = FingerprintDb::open_memory().await.unwrap();
    let report = indexer::run(&db, dir.path(), &IndexOptions::default()).await.unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].path.ends_with("bad.png"));
}

#[tokio::test]
async fn index_refuses_concurrent_run() {
    let dir = TempDir::new().unwrap();
    let db = FingerprintDb::open_memory().await.unwrap();

    let _guard = db.try_begin_index().unwrap();
    let result = indexer::run(&db, dir.path(), &IndexOptions::default()).await;
    assert!(matches!(result, Err(Error::IndexBusy)));
}

#[tokio::test]
async fn index_honors_cancellation() {
    let dir = TempDir::new().unwrap();
    save_png(dir.path(), "a.png", &wave_image(64, 64, 2.1, 3.0));
    let db = FingerprintDb::open_memory().await.unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let opts = IndexOptions { cancel, ..Default::default() };

    let report = indexer::run(&db, dir.path(), &opts).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.updated, 0);
}

#[tokio::test]
async fn matcher_threshold_and_ordering() {
    let db = FingerprintDb::open_memory().await.unwrap();
    let kind = HashKind::Phash;
    // 与查询指纹 0 的距离分别为 0、1、3、9
    db.upsert(&record("/c.png", 0b0, kind)).await.unwrap();
    db.upsert(&record("/b.png", 0b1, kind)).await.unwrap();
    db.upsert(&record("/a.png", 0b111, kind)).await.unwrap();
    db.upsert(&record("/d.png", 0x1ff, kind)).await.unwrap();

    let query = Fingerprint::from_u64(0);
    let result = matcher::find_similar(&db, query, kind, 8, None).await.unwrap();

    // 阈值内的记录全部返回且按距离升序，阈值外的绝不返回
    let got: Vec<_> = result.iter().map(|m| (m.path.as_str(), m.distance)).collect();
    assert_eq!(got, vec![("/c.png", 0), ("/b.png", 1), ("/a.png", 3)]);

    // 距离相同时按路径排序
    db.upsert(&record("/e.png", 0b10, kind)).await.unwrap();
    let result = matcher::find_similar(&db, query, kind, 1, None).await.unwrap();
    let got: Vec<_> = result.iter().map(|m| m.path.as_str()).collect();
    assert_eq!(got, vec!["/c.png", "/b.png", "/e.png"]);

    // limit 截断
    let result = matcher::find_similar(&db, query, kind, 8, Some(2)).await.unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].path, "/c.png");
}

#[tokio::test]
async fn matcher_empty_store_returns_empty() {
    let db = FingerprintDb::open_memory().await.unwrap();
    let result =
        matcher::find_similar(&db, Fingerprint::from_u64(0), HashKind::Phash, 64, None)
            .await
            .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn matcher_isolates_hash_versions() {
    let db = FingerprintDb::open_memory().await.unwrap();
    db.upsert(&record("/dhash.png", 0, HashKind::Dhash)).await.unwrap();
    db.upsert(&record("/phash.png", 0, HashKind::Phash)).await.unwrap();

    // 版本 1 的记录绝不作为版本 2 查询的结果
    let result =
        matcher::find_similar(&db, Fingerprint::from_u64(0), HashKind::Phash, 64, None)
            .await
            .unwrap();
    let got: Vec<_> = result.iter().map(|m| m.path.as_str()).collect();
    assert_eq!(got, vec!["/phash.png"]);

    // 库非空但没有同版本记录：可恢复的版本不一致错误
    db.delete("/dhash.png").await.unwrap();
    let result =
        matcher::find_similar(&db, Fingerprint::from_u64(0), HashKind::Dhash, 64, None).await;
    assert!(matches!(result, Err(Error::VersionMismatch { .. })));
}

#[tokio::test]
async fn corrupt_store_is_rebuilt_empty() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("photos.db");
    std::fs::write(&db_path, b"definitely not a sqlite file, definitely not").unwrap();

    let db = FingerprintDb::open(&db_path).await.unwrap();
    assert!(db.recovered());
    assert_eq!(db.count().await.unwrap(), 0);
    // 损坏的文件被移走备份，而不是悄悄丢弃
    assert!(dir.path().join("photos.db.corrupt").exists());
    db.close().await;
}

#[tokio::test]
async fn end_to_end_near_duplicate_search() {
    let dir = TempDir::new().unwrap();
    // 两对近重复图片（同图案不同尺寸），加一张无关图片
    let query = save_png(dir.path(), "pair1_a.png", &wave_image(200, 200, 3.1, 2.7));
    let pair = save_png(dir.path(), "pair1_b.png", &{
        let base = wave_image(200, 200, 3.1, 2.7);
        DynamicImage::ImageLuma8(image::imageops::resize(
            &base.to_luma8(),
            220,
            220,
            image::imageops::FilterType::Triangle,
        ))
    });
    save_png(dir.path(), "pair2_a.png", &wave_image(180, 180, 9.4, 7.7));
    save_png(dir.path(), "pair2_b.png", &{
        let base = wave_image(180, 180, 9.4, 7.7);
        DynamicImage::ImageLuma8(image::imageops::resize(
            &base.to_luma8(),
            198,
            198,
            image::imageops::FilterType::Triangle,
        ))
    });
    let unrelated = save_png(dir.path(), "noise.png", &checkerboard(200, 200));

    let db = FingerprintDb::open_memory().await.unwrap();
    let report = indexer::run(&db, dir.path(), &IndexOptions::default()).await.unwrap();
    assert_eq!(report.updated, 5);

    let result = matcher::find_similar_image(&db, &query, HashKind::Phash, 8, None)
        .await
        .unwrap();

    // 查询图片本身距离 0 排在最前，近重复紧随其后，无关图片被排除
    assert!(result.len() >= 2);
    assert!(result[0].path.ends_with("pair1_a.png"));
    assert_eq!(result[0].distance, 0);
    assert!(result.iter().any(|m| m.path == pair.to_string_lossy()));
    assert!(result.iter().all(|m| m.distance <= 8));
    assert!(result.iter().all(|m| m.path != unrelated.to_string_lossy()));
}
