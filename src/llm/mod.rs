//! Provider 层：适配器抽象、重试策略与统计、带重试的调用、多 Provider 注册表、Mock 实现

pub mod error;
pub mod mock;
pub mod registry;
pub mod resilient;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::{ProviderError, ProviderErrorKind, RetryFailure};
pub use mock::MockProvider;
pub use registry::{AdapterFactory, Listener, ListenerId, ProviderRegistry};
pub use resilient::ResilientClient;
pub use retry::{RetryPolicy, RetryStatistics, RetryStatsSnapshot};
pub use traits::{policy_from_options, ProviderAdapter};
pub use types::{
    CompletionResponse, CompletionStatus, ModelInfo, ProviderOptions, ToolCall, ToolDefinition,
};
