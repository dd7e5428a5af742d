//! 同步核心集成测试
//!
//! 用内存假注册中心驱动两个同步器，验证初始加载的重试预算、
//! 版本令牌漂移信号、整表重建与原子发布等行为。
//! 测试在暂停时钟下运行，固定间隔与长轮询等待都被自动推进。

use async_trait::async_trait;
use consul_sync::{
    BindConfig, ConfigSynchronizer, KeyPath, KeyValueSet, RegistryPort, Result, ServiceEndpoint,
    ServiceSynchronizer, SyncError, VersionToken, bind_field, bind_nested,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

#[derive(Default)]
struct FakeState {
    kvs: HashMap<String, String>,
    kv_token: u64,
    services: HashMap<String, Vec<ServiceEndpoint>>,
    health_token: u64,
    /// 剩余的强制 KV 查询失败次数
    kv_failures: usize,
    /// 剩余的强制目录查询失败次数
    catalog_failures: usize,
}

/// 内存假注册中心
struct FakeRegistry {
    state: Mutex<FakeState>,
    health_changed: Notify,
    kv_calls: AtomicUsize,
    catalog_calls: AtomicUsize,
}

impl FakeRegistry {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            health_changed: Notify::new(),
            kv_calls: AtomicUsize::new(0),
            catalog_calls: AtomicUsize::new(0),
        })
    }

    fn set_kvs(&self, token: u64, pairs: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        state.kv_token = token;
        state.kvs = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
    }

    fn set_kv_token(&self, token: u64) {
        self.state.lock().unwrap().kv_token = token;
    }

    fn set_service(&self, name: &str, endpoints: &[(&str, u16)]) {
        let mut state = self.state.lock().unwrap();
        state.services.insert(
            name.to_string(),
            endpoints
                .iter()
                .map(|(addr, port)| ServiceEndpoint::new(*addr, *port))
                .collect(),
        );
    }

    fn bump_health(&self, token: u64) {
        self.state.lock().unwrap().health_token = token;
        self.health_changed.notify_waiters();
    }

    fn fail_kv_queries(&self, count: usize) {
        self.state.lock().unwrap().kv_failures = count;
    }

    fn fail_catalog_queries(&self, count: usize) {
        self.state.lock().unwrap().catalog_failures = count;
    }
}

#[async_trait]
impl RegistryPort for FakeRegistry {
    async fn list_under_prefix(
        &self,
        prefix: &str,
    ) -> Result<(HashMap<String, String>, VersionToken)> {
        self.kv_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.kv_failures > 0 {
            state.kv_failures -= 1;
            return Err(SyncError::Query("kv unreachable".into()));
        }
        let kvs = state
            .kvs
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok((kvs, VersionToken(state.kv_token)))
    }

    async fn list_services(&self) -> Result<HashMap<String, Vec<String>>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.catalog_failures > 0 {
            state.catalog_failures -= 1;
            return Err(SyncError::Query("catalog unreachable".into()));
        }
        Ok(state
            .services
            .keys()
            .map(|name| (name.clone(), Vec::new()))
            .collect())
    }

    async fn list_healthy_instances(&self, service: &str) -> Result<Vec<ServiceEndpoint>> {
        let state = self.state.lock().unwrap();
        Ok(state.services.get(service).cloned().unwrap_or_default())
    }

    async fn wait_for_health_change(
        &self,
        last: VersionToken,
        max_wait: Duration,
    ) -> Result<VersionToken> {
        loop {
            {
                let state = self.state.lock().unwrap();
                if state.health_token != last.0 {
                    return Ok(VersionToken(state.health_token));
                }
            }
            tokio::select! {
                _ = self.health_changed.notified() => {}
                _ = sleep(max_wait) => {
                    return Ok(last);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct DbConf {
    host: String,
    port: i64,
}

impl BindConfig for DbConf {
    fn bind(&mut self, path: &KeyPath, kvs: &KeyValueSet) -> Result<()> {
        bind_field(&mut self.host, path, "host", kvs)?;
        bind_field(&mut self.port, path, "port", kvs)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AppConf {
    db: DbConf,
}

impl BindConfig for AppConf {
    fn bind(&mut self, path: &KeyPath, kvs: &KeyValueSet) -> Result<()> {
        bind_nested(&mut self.db, path, "db", kvs)
    }
}

// ============================================================
// 配置同步
// ============================================================

#[tokio::test(start_paused = true)]
async fn config_initial_load_retries_then_succeeds() {
    let registry = FakeRegistry::new();
    registry.set_kvs(7, &[("foo/db/host", "10.0.0.1"), ("foo/db/port", "5432")]);
    registry.fail_kv_queries(2);

    let sync = ConfigSynchronizer::new(registry.clone(), "foo");
    let conf = sync.start(AppConf::default()).await.unwrap();

    assert_eq!(conf.db.host, "10.0.0.1");
    assert_eq!(conf.db.port, 5432);
    assert_eq!(registry.kv_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn config_initial_load_budget_is_exactly_three_attempts() {
    let registry = FakeRegistry::new();
    registry.fail_kv_queries(usize::MAX);

    let sync = ConfigSynchronizer::new(registry.clone(), "foo");
    let err = sync.start(AppConf::default()).await.unwrap_err();

    assert!(matches!(err, SyncError::Initialization(_)));
    assert_eq!(registry.kv_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn config_parse_error_is_fatal_and_not_retried() {
    let registry = FakeRegistry::new();
    registry.set_kvs(7, &[("foo/db/port", "not-a-number")]);

    let sync = ConfigSynchronizer::new(registry.clone(), "foo");
    let err = sync.start(AppConf::default()).await.unwrap_err();

    match err {
        SyncError::Parse { key, .. } => assert_eq!(key, "foo/db/port"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(registry.kv_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn unchanged_token_never_signals_reload() {
    let registry = FakeRegistry::new();
    registry.set_kvs(7, &[("foo/db/host", "10.0.0.1")]);

    let sync = ConfigSynchronizer::new(registry.clone(), "foo");
    let signal = sync.reload_signal();
    let _conf = sync.start(AppConf::default()).await.unwrap();

    // 跨过多个巡检周期，令牌不变不应有任何信号
    sleep(Duration::from_secs(65)).await;
    assert_eq!(signal.generation(), 0);
    assert!(registry.kv_calls.load(Ordering::SeqCst) >= 6);
}

#[tokio::test(start_paused = true)]
async fn token_drift_signals_reload_without_rebinding() {
    let registry = FakeRegistry::new();
    registry.set_kvs(7, &[("foo/db/host", "10.0.0.1")]);

    let sync = ConfigSynchronizer::new(registry.clone(), "foo");
    let mut signal = sync.reload_signal();
    let conf = sync.start(AppConf::default()).await.unwrap();

    registry.set_kvs(8, &[("foo/db/host", "10.0.0.2")]);
    let generation = timeout(Duration::from_secs(60), signal.changed())
        .await
        .expect("reload signal within one check interval")
        .expect("synchronizer alive");

    assert_eq!(generation, 1);
    // 快照不做原地重绑定，重载由监督进程走完整的重启路径
    assert_eq!(conf.db.host, "10.0.0.1");
}

#[tokio::test(start_paused = true)]
async fn background_query_errors_keep_the_loop_alive() {
    let registry = FakeRegistry::new();
    registry.set_kvs(7, &[("foo/db/host", "10.0.0.1")]);

    let sync = ConfigSynchronizer::new(registry.clone(), "foo");
    let mut signal = sync.reload_signal();
    let _conf = sync.start(AppConf::default()).await.unwrap();

    // 两个周期的查询失败只记日志，不终止巡检
    registry.fail_kv_queries(2);
    registry.set_kv_token(9);

    let generation = timeout(Duration::from_secs(120), signal.changed())
        .await
        .expect("loop survives transient errors")
        .expect("synchronizer alive");
    assert_eq!(generation, 1);
}

// ============================================================
// 服务表同步
// ============================================================

#[tokio::test(start_paused = true)]
async fn service_table_skips_services_without_healthy_instances() {
    let registry = FakeRegistry::new();
    registry.set_service("hello", &[("10.0.0.1", 9050), ("10.0.0.2", 9050)]);
    registry.set_service("ghost", &[]);
    registry.bump_health(5);

    let table = ServiceSynchronizer::new(registry.clone()).start().await.unwrap();

    let snapshot = table.load();
    assert_eq!(snapshot.len(), 1);
    let mut urls = snapshot.get("hello").unwrap().clone();
    urls.sort();
    assert_eq!(urls, ["http://10.0.0.1:9050", "http://10.0.0.2:9050"]);
    assert!(snapshot.get("ghost").is_none());
}

#[tokio::test(start_paused = true)]
async fn service_initial_load_budget_is_exactly_three_attempts() {
    let registry = FakeRegistry::new();
    registry.fail_catalog_queries(usize::MAX);

    let err = ServiceSynchronizer::new(registry.clone())
        .start()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Initialization(_)));
    assert_eq!(registry.catalog_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn health_change_triggers_whole_table_rebuild() {
    let registry = FakeRegistry::new();
    registry.set_service("hello", &[("10.0.0.1", 9050)]);
    registry.bump_health(5);

    let table = ServiceSynchronizer::new(registry.clone()).start().await.unwrap();
    assert_eq!(table.endpoints("hello").unwrap().len(), 1);

    registry.set_service("hello", &[("10.0.0.1", 9050), ("10.0.0.3", 9050)]);
    registry.set_service("world", &[("10.0.0.9", 8000)]);
    registry.bump_health(6);

    timeout(Duration::from_secs(300), async {
        loop {
            if table.load().len() == 2 {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    })
    .await
    .expect("table rebuilt after health change");

    assert_eq!(table.endpoints("hello").unwrap().len(), 2);
    assert_eq!(table.endpoints("world").unwrap(), ["http://10.0.0.9:8000"]);
}

#[tokio::test(start_paused = true)]
async fn failed_rebuild_leaves_previous_table_published() {
    let registry = FakeRegistry::new();
    registry.set_service("hello", &[("10.0.0.1", 9050)]);
    registry.bump_health(5);

    let table = ServiceSynchronizer::new(registry.clone()).start().await.unwrap();

    // 健康状态变了但目录暂时不可达：旧表保持可用
    registry.fail_catalog_queries(1);
    registry.set_service("world", &[("10.0.0.9", 8000)]);
    registry.bump_health(6);

    timeout(Duration::from_secs(300), async {
        loop {
            if table.load().len() == 2 {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    })
    .await
    .expect("rebuild retried after backoff");

    assert!(table.endpoints("hello").is_some());
    assert!(table.endpoints("world").is_some());
}
