//! 重试策略与重试统计
//!
//! RetryPolicy 计算指数退避（带乘性抖动）并判断某类失败是否还能重试；
//! RetryStatistics 是进程级累加器，每个重试循环结束时整体更新一次，可随时 reset。

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::llm::ProviderErrorKind;

/// 重试策略（每次尝试前读取一次）
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大重试次数；0 表示只调用一次
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_factor: f64,
    /// 抖动系数，延迟乘以 [1 - jitter, 1 + jitter] 内的均匀随机数
    pub jitter_factor: f64,
    pub retry_on_rate_limit: bool,
    pub retry_on_server_error: bool,
    pub retry_on_network_error: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(30_000),
            backoff_factor: 2.0,
            jitter_factor: 0.1,
            retry_on_rate_limit: true,
            retry_on_server_error: true,
            retry_on_network_error: true,
        }
    }
}

impl RetryPolicy {
    /// 关闭重试：恰好调用一次
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration, factor: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_factor = factor;
        self
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// 第 attempt 次重试前的等待时间（attempt 从 1 开始；0 为首次调用，无延迟）
    pub fn compute_backoff(&self, attempt: u32) -> Duration {
        let jitter = self.jitter_factor.clamp(0.0, 1.0);
        let multiplier = if jitter > 0.0 {
            rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter)
        } else {
            1.0
        };
        self.backoff_with_multiplier(attempt, multiplier)
    }

    /// 不含随机部分的退避：min(max, initial * factor^(attempt-1)) * multiplier
    pub fn backoff_with_multiplier(&self, attempt: u32, multiplier: f64) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let initial_ms = self.initial_backoff.as_secs_f64() * 1000.0;
        let max_ms = self.max_backoff.as_secs_f64() * 1000.0;
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_ms = initial_ms * self.backoff_factor.max(0.0).powi(exponent);
        let capped_ms = if base_ms.is_finite() {
            base_ms.min(max_ms)
        } else {
            max_ms
        };
        let delay_ms = (capped_ms * multiplier.max(0.0)).max(0.0);
        if !delay_ms.is_finite() || delay_ms >= u64::MAX as f64 / 1_000_000.0 {
            return self.max_backoff;
        }
        Duration::from_nanos((delay_ms * 1_000_000.0).round() as u64)
    }

    /// kind 属于限流 / 5xx / 网络、对应开关打开且 attempt < max_retries 时才可重试
    pub fn is_retryable(&self, kind: ProviderErrorKind, attempt: u32) -> bool {
        let enabled = match kind {
            ProviderErrorKind::RateLimit => self.retry_on_rate_limit,
            ProviderErrorKind::ServerError => self.retry_on_server_error,
            ProviderErrorKind::NetworkError => self.retry_on_network_error,
            _ => false,
        };
        enabled && attempt < self.max_retries
    }
}

/// 统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetryStatsSnapshot {
    pub total_requests_with_retries: u64,
    pub total_retry_attempts: u64,
    pub successful_retried_requests: u64,
    pub failed_after_retries: u64,
    pub reason_counts: BTreeMap<String, u64>,
}

impl RetryStatsSnapshot {
    /// 平均每个被重试请求的重试次数
    pub fn average_retries(&self) -> f64 {
        if self.total_requests_with_retries == 0 {
            0.0
        } else {
            self.total_retry_attempts as f64 / self.total_requests_with_retries as f64
        }
    }
}

/// 进程级重试统计：所有计数在同一把锁下整体更新，读者永远看不到撕裂的计数
#[derive(Debug, Default)]
pub struct RetryStatistics {
    inner: Mutex<RetryStatsSnapshot>,
}

impl RetryStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// attempts 为 0（没有发生重试）时不记录
    pub fn record_outcome(&self, reason: &str, succeeded: bool, attempts: u32) {
        if attempts == 0 {
            return;
        }
        let mut stats = self.lock();
        stats.total_requests_with_retries += 1;
        stats.total_retry_attempts += u64::from(attempts);
        if succeeded {
            stats.successful_retried_requests += 1;
        } else {
            stats.failed_after_retries += 1;
        }
        *stats.reason_counts.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> RetryStatsSnapshot {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = RetryStatsSnapshot::default();
    }

    /// 多行文字报告；原因按名称排序，输出稳定
    pub fn report(&self) -> String {
        let stats = self.snapshot();
        let mut out = String::new();
        let _ = writeln!(out, "Retry statistics:");
        let _ = writeln!(
            out,
            "  Total requests with retries: {}",
            stats.total_requests_with_retries
        );
        let _ = writeln!(out, "  Total retry attempts: {}", stats.total_retry_attempts);
        let _ = writeln!(
            out,
            "  Successful after retries: {}",
            stats.successful_retried_requests
        );
        let _ = writeln!(out, "  Failed after retries: {}", stats.failed_after_retries);
        let _ = writeln!(
            out,
            "  Average retries per request: {:.2}",
            stats.average_retries()
        );
        let _ = writeln!(out, "  Retry reasons:");
        if stats.reason_counts.is_empty() {
            let _ = writeln!(out, "    (none)");
        }
        for (reason, count) in &stats.reason_counts {
            let _ = writeln!(out, "    {}: {}", reason, count);
        }
        out
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RetryStatsSnapshot> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
