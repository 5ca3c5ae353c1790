//! Provider 注册表与重试层集成测试

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use maestro::core::RegistryError;
use maestro::llm::{
    CompletionResponse, MockProvider, ModelInfo, ProviderAdapter, ProviderError, ProviderOptions,
    ProviderRegistry, ResilientClient, RetryPolicy, RetryStatistics, ToolDefinition,
};
use maestro::memory::Message;
use tokio::sync::Barrier;
use tokio::time::Instant;

fn registry() -> ProviderRegistry {
    ProviderRegistry::new(Arc::new(RetryStatistics::new()))
}

#[test]
fn test_set_active_unknown_keeps_previous_adapter() {
    let registry = registry();
    registry.register_instance("OpenAI", Arc::new(MockProvider::new("OpenAI"))).unwrap();
    registry.register_instance("Local", Arc::new(MockProvider::new("Local"))).unwrap();
    registry.set_active("local").unwrap();

    let err = registry.set_active("unknown").unwrap_err();
    assert_eq!(err, RegistryError::NotRegistered("unknown".into()));
    assert_eq!(registry.active_name().as_deref(), Some("Local"));
    assert_eq!(
        registry.registered_names(),
        vec!["Local".to_string(), "OpenAI".to_string()]
    );
}

#[test]
fn test_provider_listeners_in_registration_order() {
    let registry = registry();
    registry.register_instance("a", Arc::new(MockProvider::new("a"))).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..3 {
        let order = order.clone();
        registry.add_provider_listener(move |name| {
            order.lock().unwrap().push(format!("{i}:{name}"));
            if i == 0 {
                Err("first listener fails".into())
            } else {
                Ok(())
            }
        });
    }
    registry.set_active("A").unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["0:a", "1:a", "2:a"]);
}

#[tokio::test(start_paused = true)]
async fn test_fails_twice_then_succeeds_through_registry() {
    let stats = Arc::new(RetryStatistics::new());
    let registry = ProviderRegistry::new(stats.clone());
    let mock = Arc::new(MockProvider::new("mock").with_retry_policy(
        RetryPolicy::default()
            .with_max_retries(3)
            .with_backoff(Duration::from_millis(100), Duration::from_secs(30), 2.0)
            .with_jitter(0.0),
    ));
    registry.register_instance("mock", mock.clone()).unwrap();
    registry.set_active("mock").unwrap();
    mock.push_error(ProviderError::server("502 Bad Gateway"));
    mock.push_error(ProviderError::network("connection reset"));
    mock.push_text("ok");

    let start = Instant::now();
    let response = registry
        .send_completion_request(&[Message::user("hi")], &[])
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(start.elapsed(), Duration::from_millis(300));
    let snap = stats.snapshot();
    assert_eq!(snap.successful_retried_requests, 1);
    assert_eq!(snap.total_requests_with_retries, 1);
    assert_eq!(snap.reason_counts.get("network error"), Some(&1));
    assert!(stats.report().contains("Successful after retries: 1"));
}

#[tokio::test]
async fn test_disabled_retries_make_single_attempt() {
    let stats = Arc::new(RetryStatistics::new());
    let registry = ProviderRegistry::with_client(
        ResilientClient::new(stats.clone()).with_retries_enabled(false),
    );
    let mock = Arc::new(MockProvider::new("mock"));
    registry.register_instance("mock", mock.clone()).unwrap();
    registry.set_active("mock").unwrap();
    mock.push_error(ProviderError::rate_limited("slow down"));

    let response = registry
        .send_completion_request(&[Message::user("hi")], &[])
        .await
        .unwrap();
    assert!(!response.is_success());
    assert_eq!(response.error_message, "slow down");
    assert_eq!(mock.call_count(), 1);
    assert_eq!(stats.snapshot().total_requests_with_retries, 0);
}

/// 每次请求都在 barrier 上等待，只有两个请求同时在途才能完成
struct RendezvousAdapter {
    barrier: Barrier,
    calls: AtomicUsize,
}

#[async_trait]
impl ProviderAdapter for RendezvousAdapter {
    fn name(&self) -> &str {
        "rendezvous"
    }

    fn initialize(&self, _options: &ProviderOptions) -> bool {
        true
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo::new("r1", "rendezvous")]
    }

    fn current_model_info(&self) -> ModelInfo {
        ModelInfo::new("r1", "rendezvous")
    }

    fn set_current_model(&self, model_id: &str) -> bool {
        model_id == "r1"
    }

    async fn send_completion_request(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.barrier.wait().await;
        Ok(CompletionResponse::text("together"))
    }

    async fn generate_embedding(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![0.0])
    }

    fn options(&self) -> ProviderOptions {
        ProviderOptions::default()
    }

    fn set_options(&self, _options: ProviderOptions) {}

    fn supports_capability(&self, _capability: &str) -> bool {
        false
    }

    fn current_template(&self) -> Option<String> {
        None
    }

    fn set_current_template(&self, _template_id: &str) -> bool {
        false
    }

    fn available_templates(&self) -> Vec<String> {
        Vec::new()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_requests_run_outside_registry_lock() {
    let registry = Arc::new(registry());
    registry.register_instance(
        "rendezvous",
        Arc::new(RendezvousAdapter {
            barrier: Barrier::new(2),
            calls: AtomicUsize::new(0),
        }),
    ).unwrap();
    registry.register_instance("mock", Arc::new(MockProvider::new("mock"))).unwrap();
    registry.set_active("rendezvous").unwrap();

    let messages = vec![Message::user("hi")];
    let first = {
        let registry = registry.clone();
        let messages = messages.clone();
        tokio::spawn(async move { registry.send_completion_request(&messages, &[]).await })
    };
    let second = {
        let registry = registry.clone();
        let messages = messages.clone();
        tokio::spawn(async move { registry.send_completion_request(&messages, &[]).await })
    };

    let (a, b) = tokio::time::timeout(Duration::from_secs(5), async {
        (first.await.unwrap(), second.await.unwrap())
    })
    .await
    .expect("requests were serialized");
    assert_eq!(a.unwrap().content, "together");
    assert_eq!(b.unwrap().content, "together");

    // 在途请求结束后注册表仍可切换
    registry.set_active("mock").unwrap();
    assert_eq!(registry.active_name().as_deref(), Some("mock"));
}

#[tokio::test]
async fn test_queries_follow_active_adapter() {
    let registry = registry();
    assert!(!registry.supports_capability("tools"));
    assert_eq!(
        registry.list_models().unwrap_err(),
        RegistryError::NoActiveProvider
    );

    registry.register_instance("mock", Arc::new(MockProvider::new("mock"))).unwrap();
    registry.set_active("mock").unwrap();
    assert_eq!(registry.list_models().unwrap().len(), 2);
    assert!(registry.supports_capability("tools"));
    assert!(!registry.supports_capability("embeddings"));
    registry.set_current_model("mock-large").unwrap();
    assert!(registry.supports_capability("embeddings"));
    assert_eq!(registry.generate_embedding("abc").await.unwrap().len(), 16);

    let mut options = registry.options().unwrap();
    options.temperature = 0.1;
    registry.set_options(options.clone()).unwrap();
    assert_eq!(registry.options().unwrap(), options);
    assert_eq!(
        registry.available_templates().unwrap(),
        vec!["default".to_string(), "code".to_string()]
    );
}
