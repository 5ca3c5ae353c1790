//! 带重试的 Provider 调用
//!
//! execute_with_retry：调用 operation，失败时按 RetryPolicy 判断是否可重试，可重试则等待退避时间后再试；
//! 循环结束时把结果写入共享的 RetryStatistics。等待期间调用方任务挂起，不支持中途取消。

use std::future::Future;
use std::sync::Arc;

use crate::llm::{ProviderError, RetryFailure, RetryPolicy, RetryStatistics};

/// 重试执行器：持有共享统计，对任意返回 Result<T, ProviderError> 的异步操作施加重试
#[derive(Debug, Clone)]
pub struct ResilientClient {
    stats: Arc<RetryStatistics>,
    retries_enabled: bool,
}

impl ResilientClient {
    pub fn new(stats: Arc<RetryStatistics>) -> Self {
        Self {
            stats,
            retries_enabled: true,
        }
    }

    /// 关闭后每次只调用一次，也不产生统计
    pub fn with_retries_enabled(mut self, enabled: bool) -> Self {
        self.retries_enabled = enabled;
        self
    }

    pub fn retries_enabled(&self) -> bool {
        self.retries_enabled
    }

    pub fn statistics(&self) -> &Arc<RetryStatistics> {
        &self.stats
    }

    /// 执行 operation 直到成功、遇到不可重试的失败或重试次数耗尽。
    /// 返回的 RetryFailure.attempts 为实际发生的重试次数（总调用次数 = attempts + 1）。
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        operation_name: &str,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let disabled;
        let policy = if self.retries_enabled {
            policy
        } else {
            disabled = RetryPolicy::disabled();
            &disabled
        };

        let mut attempt: u32 = 0;
        let mut last_reason: &'static str = "";
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            operation = %operation_name,
                            retries = attempt,
                            reason = %last_reason,
                            "request succeeded after retries"
                        );
                    }
                    self.stats.record_outcome(last_reason, true, attempt);
                    return Ok(value);
                }
                Err(error) => {
                    let reason = error.kind.reason();
                    if !policy.is_retryable(error.kind, attempt) {
                        if attempt > 0 {
                            tracing::warn!(
                                operation = %operation_name,
                                retries = attempt,
                                reason = %reason,
                                error = %error,
                                "request failed after retries"
                            );
                            self.stats.record_outcome(reason, false, attempt);
                        }
                        return Err(RetryFailure {
                            error,
                            attempts: attempt,
                        });
                    }

                    let delay = policy.compute_backoff(attempt + 1);
                    tracing::warn!(
                        operation = %operation_name,
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        reason = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    last_reason = reason;
                    attempt += 1;
                }
            }
        }
    }
}
