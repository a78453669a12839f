//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集。
//! 只安装记录器，指标的对外暴露由宿主进程负责。

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源句柄
pub struct MetricsHandle {
    handle: PrometheusHandle,
}

impl MetricsHandle {
    /// 渲染 Prometheus 文本格式
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// 安装 Prometheus 记录器
pub fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = match PROMETHEUS_HANDLE.get() {
        Some(handle) => handle.clone(),
        None => {
            let handle = PrometheusBuilder::new().install_recorder()?;
            let _ = PROMETHEUS_HANDLE.set(handle.clone());
            handle
        }
    };

    register_common_metrics(&config.service_name);

    Ok(MetricsHandle { handle })
}

/// 注册指标描述，出现在 /metrics 输出的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "achievement_grants_total",
        "Total number of earned achievement records created"
    );
    metrics::describe_counter!(
        "achievement_revocations_total",
        "Total number of earned achievement records removed"
    );
    metrics::describe_counter!(
        "achievement_processor_failures_total",
        "Total number of processor invocations that errored or timed out"
    );
    metrics::describe_counter!(
        "achievement_cache_invalidations_total",
        "Total number of derived view cache invalidations"
    );
    metrics::describe_histogram!(
        "achievement_reevaluation_duration_seconds",
        "Achievement reevaluation duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录成就发放
#[inline]
pub fn record_grant(processor: &str, source: &str) {
    metrics::counter!(
        "achievement_grants_total",
        "processor" => processor.to_string(),
        "source" => source.to_string()
    )
    .increment(1);
}

/// 记录成就撤销
#[inline]
pub fn record_revocations(source: &str, count: u64) {
    metrics::counter!(
        "achievement_revocations_total",
        "source" => source.to_string()
    )
    .increment(count);
}

/// 记录处理器失败（错误或超时）
#[inline]
pub fn record_processor_failure(processor: &str, kind: &str) {
    metrics::counter!(
        "achievement_processor_failures_total",
        "processor" => processor.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// 记录缓存失效
#[inline]
pub fn record_cache_invalidation(reason: &str) {
    metrics::counter!(
        "achievement_cache_invalidations_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录重评估耗时
#[inline]
pub fn record_reevaluation(scope: &str, revoked: u64, duration_secs: f64) {
    metrics::histogram!(
        "achievement_reevaluation_duration_seconds",
        "scope" => scope.to_string()
    )
    .record(duration_secs);

    if revoked > 0 {
        record_revocations("reevaluation", revoked);
    }
}
