//! Shared fixtures: two test features and a configurable mock plugin.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::kernel::context::AppContext;
use crate::plugin_system::dependency::{Dependency, Injected};
use crate::plugin_system::feature::{Feature, FeatureKey, FeatureProvider, FeatureWrapper};
use crate::plugin_system::traits::{Plugin, PluginError};

pub trait TestFeature1: Send + Sync {
    fn id(&self) -> &str;
}

impl Feature for dyn TestFeature1 {
    const KEY: FeatureKey = FeatureKey::new("test.feature1");
}

pub trait TestFeature2: Send + Sync {
    fn id(&self) -> &str;
}

impl Feature for dyn TestFeature2 {
    const KEY: FeatureKey = FeatureKey::new("test.feature2");
}

pub struct Feature1Impl(pub String);

impl TestFeature1 for Feature1Impl {
    fn id(&self) -> &str {
        &self.0
    }
}

pub struct Feature2Impl(pub String);

impl TestFeature2 for Feature2Impl {
    fn id(&self) -> &str {
        &self.0
    }
}

pub fn feature1(id: &str) -> Arc<dyn TestFeature1> {
    Arc::new(Feature1Impl(id.to_string()))
}

pub fn feature2(id: &str) -> Arc<dyn TestFeature2> {
    Arc::new(Feature2Impl(id.to_string()))
}

/// Lifecycle calls in the order they happened, as "<hook>:<plugin>".
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

type Hook = Box<dyn Fn(usize) -> Result<(), PluginError> + Send + Sync>;

/// Plugin whose every hook is configurable. Hooks receive the 1-based attempt number.
pub struct MockPlugin {
    name: String,
    api: Vec<FeatureWrapper>,
    dependency: Dependency,
    initialize: Hook,
    after_initialize: Hook,
    log: Option<EventLog>,
    context: OnceLock<Arc<AppContext>>,
    init_calls: AtomicUsize,
    after_calls: AtomicUsize,
    dependency_calls: AtomicUsize,
}

impl MockPlugin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            api: Vec::new(),
            dependency: Dependency::EMPTY,
            initialize: Box::new(|_| Ok(())),
            after_initialize: Box::new(|_| Ok(())),
            log: None,
            context: OnceLock::new(),
            init_calls: AtomicUsize::new(0),
            after_calls: AtomicUsize::new(0),
            dependency_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_api(mut self, wrapper: FeatureWrapper) -> Self {
        self.api.push(wrapper);
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependency = dependency;
        self
    }

    pub fn with_initialize<H>(mut self, hook: H) -> Self
    where
        H: Fn(usize) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.initialize = Box::new(hook);
        self
    }

    /// `initialize` fails for the first `count` attempts.
    pub fn failing_initialize(self, count: usize) -> Self {
        self.with_initialize(move |attempt| {
            if attempt <= count {
                Err(PluginError::InitError(format!("attempt {}", attempt)))
            } else {
                Ok(())
            }
        })
    }

    pub fn with_after_initialize<H>(mut self, hook: H) -> Self
    where
        H: Fn(usize) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.after_initialize = Box::new(hook);
        self
    }

    pub fn with_log(mut self, log: &EventLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    pub fn build(self) -> Arc<MockPlugin> {
        Arc::new(self)
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn after_calls(&self) -> usize {
        self.after_calls.load(Ordering::SeqCst)
    }

    pub fn dependency_calls(&self) -> usize {
        self.dependency_calls.load(Ordering::SeqCst)
    }

    pub fn context(&self) -> Option<&Arc<AppContext>> {
        self.context.get()
    }

    fn record(&self, hook: &str) {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(format!("{}:{}", hook, self.name));
        }
    }
}

impl Plugin for MockPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn api(&self) -> Vec<FeatureWrapper> {
        self.record("api");
        self.api.clone()
    }

    fn dependency(&self) -> Dependency {
        self.dependency_calls.fetch_add(1, Ordering::SeqCst);
        self.dependency.clone()
    }

    fn attach_context(&self, context: Arc<AppContext>) {
        self.record("attach");
        let _ = self.context.set(context);
    }

    fn initialize(&self) -> Result<(), PluginError> {
        let attempt = self.init_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.record("init");
        (self.initialize)(attempt)
    }

    fn do_after_initialize(&self) -> Result<(), PluginError> {
        let attempt = self.after_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.record("after");
        (self.after_initialize)(attempt)
    }
}

/// Publishes `TestFeature1`, optionally depends on `TestFeature2`.
pub struct Plugin1 {
    pub feature: Arc<dyn TestFeature1>,
    pub feature2: Injected<FeatureProvider<dyn TestFeature2>>,
}

impl Plugin1 {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            feature: feature1(id),
            feature2: Injected::new("feature2"),
        })
    }
}

impl Plugin for Plugin1 {
    fn name(&self) -> &str {
        "plugin1"
    }

    fn api(&self) -> Vec<FeatureWrapper> {
        vec![FeatureWrapper::new(FeatureProvider::ready(Arc::clone(&self.feature)))]
    }

    fn dependency(&self) -> Dependency {
        Dependency::builder()
            .optional::<dyn TestFeature2, _>(self.feature2.setter())
            .build()
    }
}

/// Requires `TestFeature1`.
pub struct Plugin0 {
    pub feature1: Injected<FeatureProvider<dyn TestFeature1>>,
}

impl Plugin0 {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            feature1: Injected::new("feature1"),
        })
    }
}

impl Plugin for Plugin0 {
    fn name(&self) -> &str {
        "plugin0"
    }

    fn dependency(&self) -> Dependency {
        Dependency::builder()
            .require::<dyn TestFeature1, _>(self.feature1.setter())
            .build()
    }

    fn initialize(&self) -> Result<(), PluginError> {
        self.feature1.feature().map(|_| ())
    }
}

pub fn context() -> Arc<AppContext> {
    Arc::new(AppContext::new("talkie-test", "0.0.0"))
}
