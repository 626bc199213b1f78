//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 生命周期测试：后台周期刷新、阈值触发、关闭语义

use crate::common::mock_backend::MemoryBackend;
use crate::common::{setup_logging, test_config, wait_until, Note};
use oxrecord::{CacheConfig, CacheError, WriteBackCache};
use std::time::Duration;

#[path = "../common/mod.rs"]
mod common;

type NoteCache = WriteBackCache<Note, MemoryBackend<Note>>;

async fn start_cache(backend: &MemoryBackend<Note>, config: &CacheConfig) -> NoteCache {
    setup_logging();
    WriteBackCache::with_backend(backend.clone(), config)
        .await
        .expect("failed to create cache")
}

/// 测试后台任务按间隔把变更写回后端
#[tokio::test]
async fn test_periodic_flush_persists_changes() {
    let backend = MemoryBackend::new();
    let cache = start_cache(&backend, &test_config("periodic", 50)).await;

    let mut note = Note::new("tick");
    let id = cache.insert_record(&mut note).await;

    let persisted = wait_until(Duration::from_secs(3), || {
        let backend = backend.clone();
        async move { backend.get(id).is_some() }
    })
    .await;
    assert!(persisted, "后台刷新未在超时内写回记录");
    assert!(cache.stats().committed_cycles >= 1);

    cache.close().await.unwrap();
}

/// 测试后台刷新失败后在后续周期自动重试
#[tokio::test]
async fn test_background_flush_retries_after_failure() {
    let backend = MemoryBackend::new();
    backend.fail_on(Some(1));
    let cache = start_cache(&backend, &test_config("retry", 30)).await;

    let mut note = Note::new("retry me");
    cache.insert_record(&mut note).await;

    let observed = &cache;
    let failed = wait_until(Duration::from_secs(3), || async move {
        observed.stats().failed_cycles >= 1
    })
    .await;
    assert!(failed);
    assert!(backend.rows().is_empty());
    assert_eq!(cache.get_record(1).await.unwrap().title, "retry me");

    backend.fail_on(None);
    let persisted = wait_until(Duration::from_secs(3), || {
        let backend = backend.clone();
        async move { backend.get(1).is_some() }
    })
    .await;
    assert!(persisted);

    cache.close().await.unwrap();
}

/// 测试待写变更达到阈值时提前刷新
#[tokio::test]
async fn test_threshold_triggers_early_flush() {
    let backend = MemoryBackend::new();
    let mut config = test_config("threshold", 60_000);
    config.sync.flush_threshold = Some(3);
    let cache = start_cache(&backend, &config).await;

    for title in ["a", "b"] {
        let mut note = Note::new(title);
        cache.insert_record(&mut note).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(backend.rows().is_empty());

    let mut note = Note::new("c");
    cache.insert_record(&mut note).await;

    let persisted = wait_until(Duration::from_secs(3), || {
        let backend = backend.clone();
        async move { backend.rows().len() == 3 }
    })
    .await;
    assert!(persisted, "达到阈值后未提前刷新");

    cache.close().await.unwrap();
}

/// 测试默认关闭不做最终刷新，未刷新的变更被丢弃
#[tokio::test]
async fn test_close_without_final_flush_discards_pending() {
    let backend = MemoryBackend::new();
    let cache = start_cache(&backend, &test_config("close_discard", 60_000)).await;

    let mut note = Note::new("lost");
    cache.insert_record(&mut note).await;

    cache.close().await.unwrap();
    assert!(cache.is_closed());
    assert!(backend.is_closed());
    assert!(backend.rows().is_empty());
    assert_eq!(backend.begin_count(), 0);
}

/// 测试开启 flush_on_close 时关闭前写回全部变更
#[tokio::test]
async fn test_flush_on_close_drains_pending() {
    let backend = MemoryBackend::new();
    let mut config = test_config("close_drain", 60_000);
    config.sync.flush_on_close = true;
    let cache = start_cache(&backend, &config).await;

    for title in ["x", "y"] {
        let mut note = Note::new(title);
        cache.insert_record(&mut note).await;
    }
    cache.delete_record(1).await;

    cache.close().await.unwrap();
    assert_eq!(backend.keys(), vec![2]);
    assert!(backend.is_closed());
}

/// 测试重复关闭返回错误
#[tokio::test]
async fn test_double_close_is_an_error() {
    let backend = MemoryBackend::new();
    let cache = start_cache(&backend, &test_config("double_close", 60_000)).await;

    cache.close().await.unwrap();
    let second = cache.close().await;
    assert!(matches!(second, Err(CacheError::ShutdownError(_))));
}

/// 测试关闭后的读写仍作用于内存，但不再写回
#[tokio::test]
async fn test_operations_after_close_stay_in_memory() {
    let backend = MemoryBackend::new();
    let cache = start_cache(&backend, &test_config("after_close", 20)).await;

    cache.close().await.unwrap();

    let mut note = Note::new("late");
    let id = cache.insert_record(&mut note).await;
    assert_eq!(cache.get_record(id).await.unwrap().title, "late");
    assert_eq!(cache.pending_len().await, 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(backend.rows().is_empty());
    assert_eq!(cache.pending_len().await, 1);
}

/// 测试指标文本包含服务名称
#[tokio::test]
async fn test_render_metrics_includes_service() {
    let backend = MemoryBackend::new();
    let cache = start_cache(&backend, &test_config("metrics", 60_000)).await;

    let mut note = Note::new("m");
    cache.insert_record(&mut note).await;
    cache.flush().await.unwrap();

    let text = cache.render_metrics();
    let line = format!(
        "oxrecord_changes_applied_total{{service=\"{}\"}} 1",
        cache.service_name()
    );
    assert!(text.contains(&line));

    cache.close().await.unwrap();
}
