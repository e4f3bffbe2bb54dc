use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::aggregation::Component;
use crate::plugin_system::object_pool::ObjectPool;

/// Error type for plugin operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin loading error: {0}")]
    LoadError(String),
    #[error("Plugin initialization error: {0}")]
    InitError(String),
}

/// How a plugin finishes shutting down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownFlag {
    /// Done by the time `about_to_shutdown` returns
    #[default]
    Synchronous,
    /// Done once the plugin signals its [`ShutdownNotifier`]
    Asynchronous,
}

/// One-shot completion signal handed to [`Plugin::about_to_shutdown`].
///
/// A plugin returning [`ShutdownFlag::Asynchronous`] keeps the notifier and
/// calls [`notify`](ShutdownNotifier::notify) when its shutdown work is done.
/// Dropping it without notifying also counts as done.
pub struct ShutdownNotifier {
    plugin: String,
    sender: oneshot::Sender<()>,
}

impl ShutdownNotifier {
    pub(crate) fn new(plugin: &str, sender: oneshot::Sender<()>) -> Self {
        Self {
            plugin: plugin.to_string(),
            sender,
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn notify(self) {
        log::debug!("Plugin '{}' finished asynchronous shutdown", self.plugin);
        // The engine may have given up waiting already
        let _ = self.sender.send(());
    }
}

impl fmt::Debug for ShutdownNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownNotifier").field("plugin", &self.plugin).finish()
    }
}

/// What the engine hands a plugin during its lifecycle callbacks.
#[derive(Debug, Clone)]
pub struct PluginContext {
    plugin_name: String,
    host_platform: String,
    object_pool: Arc<ObjectPool>,
}

impl PluginContext {
    pub(crate) fn new(plugin_name: &str, host_platform: &str, object_pool: Arc<ObjectPool>) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            host_platform: host_platform.to_string(),
            object_pool,
        }
    }

    /// Name of the plugin being called
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn host_platform(&self) -> &str {
        &self.host_platform
    }

    /// Engine-wide pool where plugins publish their components
    pub fn object_pool(&self) -> &ObjectPool {
        &self.object_pool
    }
}

/// Core trait that all plugins must implement.
///
/// The engine calls, in order: `initialize` (dependencies first),
/// `extensions_initialized` (dependants first), `delayed_initialize` once the
/// host is up, and `about_to_shutdown` (dependants first). Every call happens
/// at most once per plugin.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Sets up the plugin. Dependencies are already initialized. A plugin
    /// that fails here stays out of the run, as do its dependants.
    fn initialize(&self, arguments: &[String], ctx: &PluginContext) -> Result<(), PluginError>;

    /// Every dependant plugin is initialized; objects they published are
    /// available in the pool.
    fn extensions_initialized(&self, ctx: &PluginContext);

    /// Deferred work after startup. Returning `true` makes the engine pause
    /// before the next plugin's delayed initialization.
    async fn delayed_initialize(&self) -> bool {
        false
    }

    fn about_to_shutdown(&self, _notifier: ShutdownNotifier) -> ShutdownFlag {
        ShutdownFlag::Synchronous
    }

    /// Handles a command forwarded from another instance of the host.
    fn remote_command(&self, _options: &[String], _working_directory: &str, _arguments: &[String]) -> Option<Component> {
        None
    }

    /// Components used only when this plugin runs under test
    fn create_test_objects(&self) -> Vec<Component> {
        Vec::new()
    }
}

/// Creates the plugin instance when its spec reaches `Loaded`
pub type PluginFactory = Arc<dyn Fn() -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync>;

/// Wraps an infallible constructor into a [`PluginFactory`]
pub fn factory_fn<P, F>(constructor: F) -> PluginFactory
where
    P: Plugin + 'static,
    F: Fn() -> P + Send + Sync + 'static,
{
    Arc::new(move || Ok(Arc::new(constructor()) as Arc<dyn Plugin>))
}
