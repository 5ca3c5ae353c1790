//! Provider 注册表
//!
//! 按名字（大小写不敏感）注册适配器构造函数，维护当前激活的适配器，并对外提供统一的请求 / 切换模型 / 切换模板接口。
//! 注册表的簿记（适配器表、激活指针、监听器列表）由一把互斥锁保护，锁只在查找与修改期间持有；
//! 远程调用与监听器回调都在锁外执行，并发请求不会被注册表状态串行化。

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::RegistryError;
use crate::llm::{
    CompletionResponse, ModelInfo, ProviderAdapter, ProviderOptions, ResilientClient,
    RetryPolicy, RetryStatistics, ToolDefinition,
};
use crate::memory::Message;

/// 适配器构造函数
pub type AdapterFactory = Arc<dyn Fn() -> Arc<dyn ProviderAdapter> + Send + Sync>;

/// 变更监听器；返回 Err 只会被记录，不影响其它监听器
pub type Listener<T> = Arc<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

/// 监听器注册凭据，用于 remove_listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// 按注册顺序保存的监听器列表
struct ListenerSet<T> {
    entries: Vec<(ListenerId, Listener<T>)>,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ListenerSet<T> {
    fn add(&mut self, id: ListenerId, listener: Listener<T>) {
        self.entries.push((id, listener));
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    fn snapshot(&self) -> Vec<(ListenerId, Listener<T>)> {
        self.entries.clone()
    }
}

struct AdapterEntry {
    display_name: String,
    factory: AdapterFactory,
    instance: Option<Arc<dyn ProviderAdapter>>,
    policy_override: Option<RetryPolicy>,
}

#[derive(Default)]
struct RegistryInner {
    adapters: HashMap<String, AdapterEntry>,
    active: Option<String>,
    provider_listeners: ListenerSet<String>,
    model_listeners: ListenerSet<ModelInfo>,
    template_listeners: ListenerSet<String>,
    next_listener_id: u64,
}

impl RegistryInner {
    fn next_id(&mut self) -> ListenerId {
        self.next_listener_id += 1;
        ListenerId(self.next_listener_id)
    }
}

/// 从锁内取出的激活适配器快照
struct ActiveAdapter {
    name: String,
    adapter: Arc<dyn ProviderAdapter>,
    policy: RetryPolicy,
}

/// 多 Provider 注册表，可在多个调用方之间共享（Arc<ProviderRegistry>）
pub struct ProviderRegistry {
    inner: Mutex<RegistryInner>,
    client: ResilientClient,
}

fn key_of(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ProviderRegistry {
    pub fn new(stats: Arc<RetryStatistics>) -> Self {
        Self::with_client(ResilientClient::new(stats))
    }

    pub fn with_client(client: ResilientClient) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            client,
        }
    }

    pub fn resilient_client(&self) -> &ResilientClient {
        &self.client
    }

    pub fn statistics(&self) -> &Arc<RetryStatistics> {
        self.client.statistics()
    }

    /// 注册构造函数；同名重复注册会替换旧的构造函数、实例与重试策略覆盖。
    /// 替换的是当前激活的适配器时，先在锁外构造并用旧实例的选项初始化新实例，
    /// 初始化失败则保留旧注册并返回 InitializationFailed；成功后激活名不变并通知 provider 监听器。
    pub fn register_adapter<F>(&self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Arc<dyn ProviderAdapter> + Send + Sync + 'static,
    {
        let key = key_of(name);
        let display_name = name.trim().to_string();
        let factory: AdapterFactory = Arc::new(factory);

        loop {
            let (was_active, previous) = {
                let inner = self.lock();
                let was_active = inner.active.as_deref() == Some(key.as_str());
                let previous = match inner.adapters.get(&key) {
                    Some(entry) if was_active => entry.instance.clone(),
                    _ => None,
                };
                (was_active, previous)
            };

            let replacement = if was_active {
                let adapter = factory();
                let options = match &previous {
                    Some(previous) => previous.options(),
                    None => adapter.options(),
                };
                if !adapter.initialize(&options) {
                    tracing::warn!(provider = %display_name, "replacement adapter initialization failed");
                    return Err(RegistryError::InitializationFailed(display_name));
                }
                Some(adapter)
            } else {
                None
            };

            let listeners = {
                let mut inner = self.lock();
                let is_active = inner.active.as_deref() == Some(key.as_str());
                // 两次加锁之间激活状态变了，重新来过
                if is_active != was_active {
                    continue;
                }
                inner.adapters.insert(
                    key.clone(),
                    AdapterEntry {
                        display_name: display_name.clone(),
                        factory: factory.clone(),
                        instance: replacement,
                        policy_override: None,
                    },
                );
                if is_active {
                    Some(inner.provider_listeners.snapshot())
                } else {
                    None
                }
            };

            tracing::debug!(provider = %display_name, "adapter registered");
            if let Some(listeners) = listeners {
                tracing::info!(provider = %display_name, "active provider replaced");
                notify("provider", &listeners, &display_name);
            }
            return Ok(());
        }
    }

    /// 注册已经构造好的实例（每次都返回同一个 Arc）
    pub fn register_instance(
        &self,
        name: &str,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<(), RegistryError> {
        self.register_adapter(name, move || adapter.clone())
    }

    pub fn registered_names(&self) -> Vec<String> {
        let inner = self.lock();
        let mut names: Vec<String> = inner
            .adapters
            .values()
            .map(|e| e.display_name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn active_name(&self) -> Option<String> {
        let inner = self.lock();
        inner
            .active
            .as_ref()
            .and_then(|key| inner.adapters.get(key))
            .map(|e| e.display_name.clone())
    }

    /// 用给定选项创建（如尚未创建）并初始化适配器，不改变激活状态
    pub fn initialize_adapter(
        &self,
        name: &str,
        options: &ProviderOptions,
    ) -> Result<(), RegistryError> {
        loop {
            let (adapter, factory) = self.instance_for(name)?;
            if !adapter.initialize(options) {
                return Err(RegistryError::InitializationFailed(name.to_string()));
            }
            if self.store_instance(name, &factory, adapter) {
                return Ok(());
            }
        }
    }

    /// 切换激活适配器；未注册时返回 NotRegistered 且当前激活不变。
    /// 成功后按注册顺序通知 provider 监听器。
    pub fn set_active(&self, name: &str) -> Result<(), RegistryError> {
        let key = key_of(name);
        loop {
            let (existing, factory) = {
                let inner = self.lock();
                let entry = inner
                    .adapters
                    .get(&key)
                    .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;
                (entry.instance.clone(), entry.factory.clone())
            };

            let created = match existing {
                Some(_) => None,
                None => {
                    let adapter = factory();
                    if !adapter.initialize(&adapter.options()) {
                        tracing::warn!(provider = %name, "adapter initialization failed");
                        return Err(RegistryError::InitializationFailed(name.to_string()));
                    }
                    Some(adapter)
                }
            };

            let (display_name, listeners) = {
                let mut inner = self.lock();
                let entry = inner
                    .adapters
                    .get_mut(&key)
                    .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;
                // 期间同名被重新注册：旧构造函数造出的实例不能放进新条目
                if !Arc::ptr_eq(&entry.factory, &factory) {
                    continue;
                }
                if let Some(adapter) = created {
                    entry.instance.get_or_insert(adapter);
                }
                let display_name = entry.display_name.clone();
                inner.active = Some(key.clone());
                (display_name, inner.provider_listeners.snapshot())
            };
            tracing::info!(provider = %display_name, "active provider changed");
            notify("provider", &listeners, &display_name);
            return Ok(());
        }
    }

    /// 为指定适配器覆盖重试策略（默认使用适配器自己的 retry_policy）
    pub fn set_retry_policy(&self, name: &str, policy: RetryPolicy) -> Result<(), RegistryError> {
        let mut inner = self.lock();
        let entry = inner
            .adapters
            .get_mut(&key_of(name))
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;
        entry.policy_override = Some(policy);
        Ok(())
    }

    /// 发送补全请求：在锁外经 ResilientClient 调用激活适配器。
    /// 重试耗尽或终止性错误转成 ApiError 响应；只有注册表本身的问题（无激活适配器）才返回 Err。
    pub async fn send_completion_request(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<CompletionResponse, RegistryError> {
        let active = self.active()?;
        let adapter: &dyn ProviderAdapter = active.adapter.as_ref();
        let operation = format!("{}.completion", active.name);

        let result = self
            .client
            .execute_with_retry(&operation, &active.policy, || {
                adapter.send_completion_request(messages, tools)
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(failure) => {
                tracing::warn!(provider = %active.name, error = %failure, "completion request failed");
                Ok(CompletionResponse::api_error(failure.to_string())
                    .with_metadata("provider", active.name.clone())
                    .with_metadata("error_kind", failure.error.kind.reason())
                    .with_metadata("retries", failure.attempts.to_string()))
            }
        }
    }

    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, RegistryError> {
        let active = self.active()?;
        let adapter: &dyn ProviderAdapter = active.adapter.as_ref();
        self.client
            .execute_with_retry(
                &format!("{}.embedding", active.name),
                &active.policy,
                || adapter.generate_embedding(text),
            )
            .await
            .map_err(|failure| RegistryError::Provider(failure.to_string()))
    }

    pub fn list_models(&self) -> Result<Vec<ModelInfo>, RegistryError> {
        Ok(self.active()?.adapter.list_models())
    }

    pub fn current_model_info(&self) -> Result<ModelInfo, RegistryError> {
        Ok(self.active()?.adapter.current_model_info())
    }

    /// 校验 model_id 在激活适配器的目录中，切换后通知 model 监听器
    pub fn set_current_model(&self, model_id: &str) -> Result<ModelInfo, RegistryError> {
        let active = self.active()?;
        let known = active.adapter.list_models().iter().any(|m| m.id == model_id);
        if !known || !active.adapter.set_current_model(model_id) {
            return Err(RegistryError::NotFound {
                what: "model",
                id: model_id.to_string(),
            });
        }
        let info = active.adapter.current_model_info();
        let listeners = self.lock().model_listeners.snapshot();
        tracing::info!(provider = %active.name, model = %info.id, "model changed");
        notify("model", &listeners, &info);
        Ok(info)
    }

    pub fn available_templates(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.active()?.adapter.available_templates())
    }

    pub fn current_template(&self) -> Result<Option<String>, RegistryError> {
        Ok(self.active()?.adapter.current_template())
    }

    /// 校验模板在激活适配器的可用列表中，切换后通知 template 监听器
    pub fn set_current_template(&self, template_id: &str) -> Result<(), RegistryError> {
        let active = self.active()?;
        let known = active
            .adapter
            .available_templates()
            .iter()
            .any(|t| t == template_id);
        if !known || !active.adapter.set_current_template(template_id) {
            return Err(RegistryError::NotFound {
                what: "template",
                id: template_id.to_string(),
            });
        }
        let listeners = self.lock().template_listeners.snapshot();
        let template_id = template_id.to_string();
        tracing::info!(provider = %active.name, template = %template_id, "template changed");
        notify("template", &listeners, &template_id);
        Ok(())
    }

    pub fn supports_capability(&self, capability: &str) -> bool {
        self.active()
            .map(|a| a.adapter.supports_capability(capability))
            .unwrap_or(false)
    }

    pub fn options(&self) -> Result<ProviderOptions, RegistryError> {
        Ok(self.active()?.adapter.options())
    }

    pub fn set_options(&self, options: ProviderOptions) -> Result<(), RegistryError> {
        self.active()?.adapter.set_options(options);
        Ok(())
    }

    pub fn add_provider_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&String) -> Result<(), String> + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.provider_listeners.add(id, Arc::new(listener));
        id
    }

    pub fn add_model_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ModelInfo) -> Result<(), String> + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.model_listeners.add(id, Arc::new(listener));
        id
    }

    pub fn add_template_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&String) -> Result<(), String> + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.template_listeners.add(id, Arc::new(listener));
        id
    }

    /// 移除任意类型的监听器；id 不存在时返回 false
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        inner.provider_listeners.remove(id)
            || inner.model_listeners.remove(id)
            || inner.template_listeners.remove(id)
    }

    fn active(&self) -> Result<ActiveAdapter, RegistryError> {
        let inner = self.lock();
        let key = inner.active.as_ref().ok_or(RegistryError::NoActiveProvider)?;
        let entry = inner
            .adapters
            .get(key)
            .ok_or(RegistryError::NoActiveProvider)?;
        let adapter = entry
            .instance
            .clone()
            .ok_or(RegistryError::NoActiveProvider)?;
        let policy = entry
            .policy_override
            .clone()
            .unwrap_or_else(|| adapter.retry_policy());
        Ok(ActiveAdapter {
            name: entry.display_name.clone(),
            adapter,
            policy,
        })
    }

    /// 取已有实例，没有则在锁外调用构造函数；同时返回所用的构造函数
    fn instance_for(
        &self,
        name: &str,
    ) -> Result<(Arc<dyn ProviderAdapter>, AdapterFactory), RegistryError> {
        let (existing, factory) = {
            let inner = self.lock();
            let entry = inner
                .adapters
                .get(&key_of(name))
                .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;
            (entry.instance.clone(), entry.factory.clone())
        };
        let adapter = existing.unwrap_or_else(|| factory());
        Ok((adapter, factory))
    }

    /// 条目仍由同一个构造函数注册时才保存实例；返回 false 表示期间被重新注册
    fn store_instance(
        &self,
        name: &str,
        factory: &AdapterFactory,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> bool {
        let mut inner = self.lock();
        match inner.adapters.get_mut(&key_of(name)) {
            Some(entry) if Arc::ptr_eq(&entry.factory, factory) => {
                entry.instance.get_or_insert(adapter);
                true
            }
            Some(_) => false,
            // 条目不会被删除，这里只为穷尽匹配
            None => true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 依次调用监听器；返回 Err 或 panic 都只记录日志，继续通知后面的监听器
fn notify<T>(kind: &str, listeners: &[(ListenerId, Listener<T>)], event: &T) {
    for (id, listener) in listeners {
        match catch_unwind(AssertUnwindSafe(|| listener(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(kind = %kind, listener = ?id, error = %e, "change listener failed");
            }
            Err(_) => {
                tracing::warn!(kind = %kind, listener = ?id, "change listener panicked");
            }
        }
    }
}
