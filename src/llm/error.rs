//! Provider 调用错误
//!
//! 每个失败都带一个 ProviderErrorKind，重试层只根据 kind 判断是否可重试（限流 / 5xx / 网络），
//! 其余（鉴权、请求非法、未知模型、解析失败）一律视为终止性错误。

use thiserror::Error;

/// 失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    RateLimit,
    ServerError,
    NetworkError,
    Authentication,
    InvalidRequest,
    ModelNotFound,
    Parse,
    Other,
}

impl ProviderErrorKind {
    /// 统计用的原因标签（与重试统计里的 reason 一致）
    pub fn reason(&self) -> &'static str {
        match self {
            ProviderErrorKind::RateLimit => "rate limiting",
            ProviderErrorKind::ServerError => "server error",
            ProviderErrorKind::NetworkError => "network error",
            ProviderErrorKind::Authentication => "authentication",
            ProviderErrorKind::InvalidRequest => "invalid request",
            ProviderErrorKind::ModelNotFound => "model not found",
            ProviderErrorKind::Parse => "parse error",
            ProviderErrorKind::Other => "other",
        }
    }

    /// 是否属于瞬时故障（仍需 RetryPolicy 的开关与次数上限共同决定是否真正重试）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::RateLimit
                | ProviderErrorKind::ServerError
                | ProviderErrorKind::NetworkError
        )
    }
}

/// 单次 Provider 调用失败
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimit, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ServerError, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NetworkError, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Parse, message)
    }

    /// 按 HTTP 状态码归类：429 限流、5xx 服务端、401/403 鉴权、404 未知模型、其余 4xx 请求非法
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            429 => ProviderErrorKind::RateLimit,
            500..=599 => ProviderErrorKind::ServerError,
            401 | 403 => ProviderErrorKind::Authentication,
            404 => ProviderErrorKind::ModelNotFound,
            400..=499 => ProviderErrorKind::InvalidRequest,
            _ => ProviderErrorKind::Other,
        };
        Self::new(kind, message)
    }
}

/// 重试循环结束后的失败：最后一次错误 + 已执行的重试次数
#[derive(Error, Debug, Clone, PartialEq)]
pub struct RetryFailure {
    pub error: ProviderError,
    pub attempts: u32,
}

impl std::fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.attempts > 0 {
            write!(f, "{} (Retried {} times)", self.error, self.attempts)
        } else {
            write!(f, "{}", self.error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ProviderError::from_status(429, "x").kind, ProviderErrorKind::RateLimit);
        assert_eq!(ProviderError::from_status(503, "x").kind, ProviderErrorKind::ServerError);
        assert_eq!(ProviderError::from_status(401, "x").kind, ProviderErrorKind::Authentication);
        assert_eq!(ProviderError::from_status(404, "x").kind, ProviderErrorKind::ModelNotFound);
        assert_eq!(ProviderError::from_status(422, "x").kind, ProviderErrorKind::InvalidRequest);
    }

    #[test]
    fn test_parse_is_not_transient() {
        assert!(!ProviderErrorKind::Parse.is_transient());
        assert!(ProviderErrorKind::NetworkError.is_transient());
    }

    #[test]
    fn test_retry_failure_annotation() {
        let failure = RetryFailure {
            error: ProviderError::server("Internal Server Error"),
            attempts: 3,
        };
        assert_eq!(failure.to_string(), "Internal Server Error (Retried 3 times)");

        let failure = RetryFailure {
            error: ProviderError::server("boom"),
            attempts: 0,
        };
        assert_eq!(failure.to_string(), "boom");
    }
}
