#![cfg(test)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::aggregation::Component;
use crate::plugin_system::manager::PluginManager;
use crate::plugin_system::spec::{PluginMetadata, PluginState};
use crate::plugin_system::traits::{Plugin, PluginContext, PluginError, PluginFactory, ShutdownFlag, ShutdownNotifier};

/// Shared record of lifecycle calls, as "step:plugin" entries
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Plugin names logged for `step`, in call order
pub fn calls(log: &CallLog, step: &str) -> Vec<String> {
    let prefix = format!("{}:", step);
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ShutdownMode {
    #[default]
    Synchronous,
    /// Signals from a spawned task after the given delay
    AsyncAfter(Duration),
    /// Keeps the notifier and never signals
    AsyncNever,
    /// Returns `Asynchronous` but drops the notifier right away
    AsyncDropped,
}

#[derive(Clone, Debug, Default)]
pub struct Behavior {
    pub fail_initialize: bool,
    pub panic_initialize: bool,
    pub fail_factory: bool,
    pub panic_extensions: bool,
    pub panic_delayed_initialize: bool,
    pub delay_after_delayed_initialize: bool,
    pub shutdown: ShutdownMode,
    /// Publishes a component named after the plugin during `initialize`
    pub publish_object: bool,
}

pub struct MockPlugin {
    name: String,
    log: CallLog,
    behavior: Behavior,
    kept_notifier: Mutex<Option<ShutdownNotifier>>,
}

impl MockPlugin {
    fn record(&self, step: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", step, self.name));
    }
}

/// Capability every mock publishes into the object pool
pub trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct NamedGreeter(String);

impl Greeter for NamedGreeter {
    fn greet(&self) -> String {
        format!("hello from {}", self.0)
    }
}

pub fn greeter_component(name: &str) -> Component {
    Component::builder(name)
        .provide::<dyn Greeter>(Arc::new(NamedGreeter(name.to_string())))
        .build()
}

#[async_trait]
impl Plugin for MockPlugin {
    fn initialize(&self, arguments: &[String], ctx: &PluginContext) -> Result<(), PluginError> {
        self.record("initialize");
        for argument in arguments {
            self.record(&format!("argument={}", argument));
        }
        if self.behavior.panic_initialize {
            panic!("initialize exploded");
        }
        if self.behavior.fail_initialize {
            return Err(PluginError::InitError(format!("{} refused to start", self.name)));
        }
        if self.behavior.publish_object {
            ctx.object_pool().add_object(greeter_component(ctx.plugin_name()));
        }
        Ok(())
    }

    fn extensions_initialized(&self, _ctx: &PluginContext) {
        self.record("extensions");
        if self.behavior.panic_extensions {
            panic!("extensions exploded");
        }
    }

    async fn delayed_initialize(&self) -> bool {
        self.record("delayed");
        if self.behavior.panic_delayed_initialize {
            panic!("delayed initialization exploded");
        }
        self.behavior.delay_after_delayed_initialize
    }

    fn about_to_shutdown(&self, notifier: ShutdownNotifier) -> ShutdownFlag {
        self.record("shutdown");
        match self.behavior.shutdown {
            ShutdownMode::Synchronous => ShutdownFlag::Synchronous,
            ShutdownMode::AsyncAfter(delay) => {
                let log = self.log.clone();
                let name = self.name.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    log.lock().unwrap().push(format!("shutdown-done:{}", name));
                    notifier.notify();
                });
                ShutdownFlag::Asynchronous
            }
            ShutdownMode::AsyncNever => {
                *self.kept_notifier.lock().unwrap() = Some(notifier);
                ShutdownFlag::Asynchronous
            }
            ShutdownMode::AsyncDropped => ShutdownFlag::Asynchronous,
        }
    }

    fn remote_command(&self, options: &[String], working_directory: &str, arguments: &[String]) -> Option<Component> {
        self.record(&format!(
            "remote[{}|{}|{}]",
            options.join(","),
            working_directory,
            arguments.join(",")
        ));
        Some(greeter_component(&format!("{}-remote", self.name)))
    }

    fn create_test_objects(&self) -> Vec<Component> {
        vec![greeter_component(&format!("{}-test", self.name))]
    }
}

impl Drop for MockPlugin {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.push(format!("drop:{}", self.name));
        }
    }
}

pub fn mock_factory(name: &str, log: &CallLog, behavior: Behavior) -> PluginFactory {
    let name = name.to_string();
    let log = log.clone();
    Arc::new(move || {
        if behavior.fail_factory {
            return Err(PluginError::LoadError(format!("cannot open library for {}", name)));
        }
        log.lock().unwrap().push(format!("create:{}", name));
        Ok(Arc::new(MockPlugin {
            name: name.clone(),
            log: log.clone(),
            behavior: behavior.clone(),
            kept_notifier: Mutex::new(None),
        }) as Arc<dyn Plugin>)
    })
}

/// Registers a well-behaved mock plugin
pub fn add_mock(manager: &mut PluginManager, metadata: PluginMetadata, log: &CallLog) {
    add_mock_with(manager, metadata, log, Behavior::default());
}

pub fn add_mock_with(manager: &mut PluginManager, metadata: PluginMetadata, log: &CallLog, behavior: Behavior) {
    let name = metadata.name.clone();
    manager
        .add_plugin(metadata, mock_factory(&name, log, behavior))
        .expect("plugin registers");
}

pub fn state_of(manager: &PluginManager, name: &str) -> PluginState {
    manager.plugin(name).expect("plugin exists").state()
}
