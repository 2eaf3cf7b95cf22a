//! 查询缓存
//!
//! 以 [`QueryKey`] 为键缓存后端快照，后端始终是唯一可信来源。
//!
//! - **过期窗口**：`stale_time` 内的数据直接返回，不发请求；`None` 表示每次读取都重新拉取
//! - **请求合并**：同一个键已有请求在途时，后来的读取等待同一个结果，不重复发请求
//! - **失效**：按前缀标记整族条目失效，下一次读取强制重新拉取；多次失效等价于一次
//! - **重试**：默认不重试，失败立即返回给调用方
//!
//! 缓存实例由应用根显式创建并传递（[`QueryCache`] 可廉价克隆，共享同一存储）。

mod clock;
pub mod key;

pub use clock::{Clock, SystemClock};
pub use key::QueryKey;

use crate::error::{Result, TrackerError};
use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

type CachedValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<CachedValue>>>;

/// 单个查询的缓存策略
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub key: QueryKey,
    /// 过期窗口。`None` = 总是重新验证
    pub stale_time: Option<Duration>,
    /// 失败后的最大重试次数。默认 0（不重试）
    pub retry: u32,
    /// 首次重试前等待（毫秒），之后每次翻倍。默认 1000
    pub retry_delay_ms: u64,
}

impl QueryOptions {
    pub fn new(key: QueryKey) -> Self {
        Self {
            key,
            stale_time: None,
            retry: 0,
            retry_delay_ms: 1000,
        }
    }

    pub fn stale_time(mut self, window: Duration) -> Self {
        self.stale_time = Some(window);
        self
    }

    pub fn retry(mut self, retries: u32) -> Self {
        self.retry = retries;
        self
    }

    pub fn retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }
}

#[derive(Default)]
struct Entry {
    data: Option<CachedValue>,
    updated_at: Option<DateTime<Utc>>,
    invalidated: bool,
    in_flight: Option<SharedFetch>,
    /// 每次失效递增；旧代的请求结果不写回
    generation: u64,
}

impl Entry {
    fn fresh(&self, now: DateTime<Utc>, stale_time: Option<Duration>) -> Option<CachedValue> {
        if self.invalidated {
            return None;
        }
        let data = self.data.as_ref()?;
        let updated_at = self.updated_at?;
        let window = stale_time?;
        (now - updated_at < window).then(|| Arc::clone(data))
    }
}

struct CacheInner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    clock: Arc<dyn Clock>,
}

impl CacheInner {
    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 请求结束后写回结果
    fn settle(&self, key: &QueryKey, generation: u64, result: &Result<CachedValue>) {
        let now = self.clock.now();
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.generation != generation {
            debug!(%key, "请求期间条目已失效，结果不写入缓存");
            return;
        }
        entry.in_flight = None;
        match result {
            Ok(data) => {
                entry.data = Some(Arc::clone(data));
                entry.updated_at = Some(now);
                entry.invalidated = false;
                debug!(%key, "缓存已更新");
            }
            Err(e) => warn!(%key, error = %e, "查询失败，保留旧数据"),
        }
    }
}

/// 进程内唯一的查询缓存
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                clock,
            }),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// 读取查询结果：新鲜则直接返回，有在途请求则等待它，否则调用 `fetcher` 拉取
    pub async fn fetch<T, F, Fut>(&self, options: &QueryOptions, fetcher: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let key = &options.key;
        let pending = {
            let now = self.inner.clock.now();
            let mut entries = self.inner.entries();
            let entry = entries.entry(key.clone()).or_default();

            if let Some(data) = entry.fresh(now, options.stale_time) {
                debug!(%key, "缓存命中");
                return downcast(key, data);
            }

            match &entry.in_flight {
                Some(pending) => {
                    debug!(%key, "合并到在途请求");
                    pending.clone()
                }
                None => {
                    debug!(%key, "缓存未命中，发起请求");
                    let pending = self.start_fetch(options, entry.generation, fetcher);
                    entry.in_flight = Some(pending.clone());
                    pending
                }
            }
        };

        let data = pending.await?;
        downcast(key, data)
    }

    fn start_fetch<T, F, Fut>(
        &self,
        options: &QueryOptions,
        generation: u64,
        mut fetcher: F,
    ) -> SharedFetch
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let inner: Weak<CacheInner> = Arc::downgrade(&self.inner);
        let key = options.key.clone();
        let max_retries = options.retry;
        let retry_delay_ms = options.retry_delay_ms;

        async move {
            let mut attempt: u32 = 0;
            let result = loop {
                match fetcher().await {
                    Ok(value) => break Ok(Arc::new(value) as CachedValue),
                    Err(e) if attempt < max_retries => {
                        attempt += 1;
                        let delay_ms = retry_delay_ms * (1u64 << (attempt as u64 - 1).min(5));
                        warn!(%key, attempt, delay_ms, error = %e, "查询失败，稍后重试");
                        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    }
                    Err(e) => break Err(e),
                }
            };

            if let Some(inner) = inner.upgrade() {
                inner.settle(&key, generation, &result);
            }
            result
        }
        .boxed()
        .shared()
    }

    /// 按前缀标记失效，返回受影响的条目数
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.inner.entries();
        let mut count = 0;
        for (_, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            entry.invalidated = true;
            entry.generation += 1;
            entry.in_flight = None;
            count += 1;
        }
        info!(%prefix, count, "缓存失效");
        count
    }

    /// 读取已缓存的数据（不论是否过期），不发请求
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let data = self.inner.entries().get(key)?.data.clone()?;
        data.downcast::<T>().ok()
    }

    /// 下一次读取是否需要请求后端
    pub fn is_stale(&self, options: &QueryOptions) -> bool {
        let now = self.inner.clock.now();
        self.inner
            .entries()
            .get(&options.key)
            .and_then(|entry| entry.fresh(now, options.stale_time))
            .is_none()
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner
            .entries()
            .get(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, data: CachedValue) -> Result<Arc<T>> {
    data.downcast::<T>()
        .map_err(|_| TrackerError::Other(format!("缓存类型不匹配: {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::testing::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
    ) -> impl FnMut() -> BoxFuture<'static, Result<Vec<u32>>> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
                Ok(vec![n])
            }
            .boxed()
        }
    }

    fn slow_fetcher(
        calls: &Arc<AtomicUsize>,
        delay_ms: u64,
    ) -> impl FnMut() -> BoxFuture<'static, Result<Vec<u32>>> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                Ok(vec![n])
            }
            .boxed()
        }
    }

    fn failing_then_ok(
        calls: &Arc<AtomicUsize>,
        failures: usize,
    ) -> impl FnMut() -> BoxFuture<'static, Result<Vec<u32>>> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    Err(ApiError::Network("boom".to_string()).into())
                } else {
                    Ok(vec![n as u32])
                }
            }
            .boxed()
        }
    }

    fn setup() -> (QueryCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (QueryCache::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_fresh_result_reused_within_window() {
        let (cache, clock) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::new(key::tasks::today()).stale_time(Duration::minutes(15));

        let first = cache.fetch(&opts, counting_fetcher(&calls)).await.unwrap();
        clock.advance(Duration::minutes(10));
        let second = cache.fetch(&opts, counting_fetcher(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1, "10 分钟内不应再次请求");
        assert!(Arc::ptr_eq(&first, &second), "应原样复用缓存值");

        clock.advance(Duration::minutes(6));
        assert!(cache.is_stale(&opts));
        let third = cache.fetch(&opts, counting_fetcher(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2, "16 分钟后应重新请求");
        assert_eq!(*third, vec![1]);
    }

    #[tokio::test]
    async fn test_no_stale_time_always_revalidates() {
        let (cache, _clock) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::new(key::tasks::listing());

        cache.fetch(&opts, counting_fetcher(&calls)).await.unwrap();
        cache.fetch(&opts, counting_fetcher(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.peek::<Vec<u32>>(&opts.key).is_some());
    }

    #[tokio::test]
    async fn test_invalidation_forces_refetch() {
        let (cache, _clock) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let today = QueryOptions::new(key::tasks::today()).stale_time(Duration::minutes(15));
        let detail = QueryOptions::new(key::tasks::by_id("t1")).stale_time(Duration::minutes(15));

        cache.fetch(&today, counting_fetcher(&calls)).await.unwrap();
        cache.fetch(&detail, counting_fetcher(&calls)).await.unwrap();

        assert_eq!(cache.invalidate(&key::tasks::listing()), 1, "只有 listing 族受影响");
        // 连续失效等价于一次
        cache.invalidate(&key::tasks::listing());
        assert!(cache.is_stale(&today));
        assert!(!cache.is_stale(&detail));

        cache.fetch(&today, counting_fetcher(&calls)).await.unwrap();
        cache.fetch(&today, counting_fetcher(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3, "失效后只重新请求一次");
    }

    #[tokio::test]
    async fn test_concurrent_reads_coalesce() {
        let (cache, _clock) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::new(key::tasks::listing());

        let (a, b) = tokio::join!(
            cache.fetch(&opts, slow_fetcher(&calls, 50)),
            cache.fetch(&opts, slow_fetcher(&calls, 50)),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1, "在途请求应被合并");
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert!(!cache.is_fetching(&opts.key));
    }

    #[tokio::test]
    async fn test_failure_not_retried_by_default() {
        let (cache, _clock) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::new(key::auth::check_auth()).stale_time(Duration::minutes(5));

        let err = cache.fetch(&opts, failing_then_ok(&calls, 1)).await.unwrap_err();
        assert_eq!(err, TrackerError::Api(ApiError::Network("boom".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.peek::<Vec<u32>>(&opts.key).is_none(), "失败结果不缓存");

        let ok = cache.fetch(&opts, failing_then_ok(&calls, 1)).await.unwrap();
        assert_eq!(*ok, vec![1]);
    }

    #[tokio::test]
    async fn test_configured_retry() {
        let (cache, _clock) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::new(key::tasks::history())
            .retry(2)
            .retry_delay_ms(1);

        let value = cache.fetch(&opts, failing_then_ok(&calls, 2)).await.unwrap();
        assert_eq!(*value, vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_previous_data() {
        let (cache, _clock) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::new(key::tasks::listing());

        cache.fetch(&opts, counting_fetcher(&calls)).await.unwrap();
        let failing = || async { Err::<Vec<u32>, _>(ApiError::Network("down".to_string()).into()) };
        assert!(cache.fetch(&opts, failing).await.is_err());
        assert_eq!(*cache.peek::<Vec<u32>>(&opts.key).unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_invalidation_during_flight_discards_result() {
        let (cache, _clock) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::new(key::tasks::today()).stale_time(Duration::minutes(15));

        let background = {
            let cache = cache.clone();
            let opts = opts.clone();
            let fetcher = slow_fetcher(&calls, 50);
            tokio::spawn(async move { cache.fetch(&opts, fetcher).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(cache.is_fetching(&opts.key));
        cache.invalidate(&key::tasks::listing());

        let stale = background.await.unwrap().unwrap();
        assert_eq!(*stale, vec![0], "等待者仍拿到自己的结果");
        assert!(cache.peek::<Vec<u32>>(&opts.key).is_none(), "旧代结果不写入缓存");

        cache.fetch(&opts, counting_fetcher(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_error() {
        let (cache, _clock) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::new(key::tasks::today()).stale_time(Duration::minutes(15));
        cache.fetch(&opts, counting_fetcher(&calls)).await.unwrap();

        let wrong = cache
            .fetch(&opts, || async { Ok(String::from("x")) })
            .await;
        assert!(matches!(wrong, Err(TrackerError::Other(_))));
    }
}
