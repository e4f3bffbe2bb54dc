use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::aggregation::Component;
use crate::kernel::constants::host_platform_name;
use crate::kernel::error::Result;
use crate::plugin_system::dependency::{DependencyKind, PluginDependency};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::graph::DependencyGraph;
use crate::plugin_system::object_pool::ObjectPool;
use crate::plugin_system::spec::{PluginMetadata, PluginSpec, PluginState, PluginStatus};
use crate::plugin_system::traits::{PluginContext, PluginFactory, ShutdownFlag, ShutdownNotifier};
use crate::settings::{EngineConfig, PluginSettings};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}

/// Why `dependency` is not where its dependants need it to be
fn failure_reason(dependency: &PluginSpec) -> String {
    if let Some(error) = dependency.error() {
        error.to_string()
    } else if !dependency.is_available_for_host_platform() {
        "Plugin is not available on this platform.".to_string()
    } else if !dependency.is_effectively_enabled() {
        "Plugin is disabled.".to_string()
    } else {
        format!("Plugin is {}.", dependency.state())
    }
}

fn apply_settings(config: &EngineConfig, host_platform: &str, spec: &mut PluginSpec) {
    let name = spec.name().to_string();

    let mut enabled = spec.is_enabled_by_default();
    if config.is_ignored(&name) {
        enabled = false;
    }
    if config.is_force_enabled_in_settings(&name) {
        enabled = true;
    }
    if spec.is_required() && !enabled {
        log::warn!("Plugin '{}' is required and stays enabled", name);
        enabled = true;
    }
    spec.set_enabled_by_settings(enabled);

    spec.set_force_enabled(false);
    spec.set_force_disabled(false);
    match config.forced_enablement(&name) {
        Some(true) => spec.set_force_enabled(true),
        Some(false) if spec.is_required() => {
            log::warn!("Ignoring request to skip required plugin '{}'", name)
        }
        Some(false) => spec.set_force_disabled(true),
        None => {}
    }

    spec.set_arguments(config.arguments_for(&name));
    spec.update_host_platform(host_platform);
}

/// Drives plugins through their lifecycle.
///
/// Plugins are registered with [`add_plugin`](Self::add_plugin) as parsed
/// metadata plus a factory. [`load_plugins`](Self::load_plugins) resolves
/// dependencies and takes every enabled plugin through `Loaded`,
/// `Initialized` and `Running`, providers before dependants for the first
/// two and dependants first for the last.
/// [`run_delayed_initialize`](Self::run_delayed_initialize) finishes startup
/// and [`shutdown`](Self::shutdown) unwinds in reverse load order.
///
/// A plugin that fails at any step keeps its state and records the reason
/// as its error; plugins requiring it are disabled indirectly. Nothing else
/// in the run is affected.
pub struct PluginManager {
    specs: Vec<PluginSpec>,
    graph: Option<DependencyGraph>,
    config: EngineConfig,
    object_pool: Arc<ObjectPool>,
    delayed_queue: VecDeque<usize>,
    initialization_done: bool,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            specs: Vec::new(),
            graph: None,
            config,
            object_pool: Arc::new(ObjectPool::new()),
            delayed_queue: VecDeque::new(),
            initialization_done: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the configuration and re-applies it to every registered plugin.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
        let host_platform = self.host_platform();
        for spec in &mut self.specs {
            apply_settings(&self.config, &host_platform, spec);
        }
    }

    /// Platform name matched against each plugin's platform specification
    pub fn host_platform(&self) -> String {
        self.config.platform.clone().unwrap_or_else(host_platform_name)
    }

    /// Registers a plugin.
    ///
    /// Invalid metadata does not fail the call: the plugin is kept in the
    /// `Invalid` state with the problem as its error. A second plugin with
    /// the same name is rejected.
    pub fn add_plugin(&mut self, metadata: PluginMetadata, factory: PluginFactory) -> Result<&PluginSpec> {
        if self.specs.iter().any(|s| s.name() == metadata.name) {
            return Err(PluginSystemError::DuplicatePlugin {
                plugin_id: metadata.name,
            }
            .into());
        }

        let host_platform = self.host_platform();
        let mut spec = PluginSpec::read(metadata, factory, &host_platform);
        apply_settings(&self.config, &host_platform, &mut spec);
        log::debug!("Registered plugin '{}' ({})", spec.name(), spec.state());

        self.specs.push(spec);
        self.graph = None;
        let index = self.specs.len() - 1;
        Ok(&self.specs[index])
    }

    /// All plugins in registration order
    pub fn plugins(&self) -> &[PluginSpec] {
        &self.specs
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginSpec> {
        self.specs.iter().find(|s| s.name() == name)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.specs.iter().position(|s| s.name() == name).ok_or_else(|| {
            PluginSystemError::UnknownPlugin {
                plugin_id: name.to_string(),
            }
            .into()
        })
    }

    pub fn object_pool(&self) -> &Arc<ObjectPool> {
        &self.object_pool
    }

    pub fn is_initialization_done(&self) -> bool {
        self.initialization_done
    }

    pub fn is_under_test(&self, name: &str) -> bool {
        self.config.is_under_test(name)
    }

    /// Matches dependency declarations to providers and computes the load order.
    ///
    /// Plugins in `Read` whose required dependencies all resolve move to
    /// `Resolved`; the others keep `Read` with an error.
    pub fn resolve_dependencies(&mut self) -> Result<()> {
        let graph = DependencyGraph::build(&self.specs);
        for (index, error) in graph.resolution_errors() {
            let spec = &mut self.specs[*index];
            if !spec.has_error() {
                spec.set_error(error.to_string());
            }
        }
        for spec in &mut self.specs {
            if spec.state() == PluginState::Read && !spec.has_error() {
                spec.set_state(PluginState::Resolved)?;
            }
        }
        log::info!(
            "Resolved dependencies: {} plugin(s) in load order, {} with errors",
            graph.forward_order().len(),
            self.specs.iter().filter(|s| s.has_error()).count()
        );
        self.graph = Some(graph);
        Ok(())
    }

    fn load_order(&self) -> Vec<usize> {
        match &self.graph {
            Some(graph) => graph.forward_order().to_vec(),
            None => (0..self.specs.len()).collect(),
        }
    }

    /// Plugins in load order; registration order before resolution
    pub fn load_queue(&self) -> Vec<&PluginSpec> {
        self.load_order().into_iter().map(|i| &self.specs[i]).collect()
    }

    /// Marks disabled dependencies of enabled plugins as enabled indirectly,
    /// transitively. Test dependencies count for plugins under test.
    fn enable_dependencies_indirectly(&mut self) {
        for spec in &mut self.specs {
            spec.set_enabled_indirectly(false);
        }
        let Some(graph) = &self.graph else {
            return;
        };

        let mut queue: VecDeque<usize> = (0..self.specs.len())
            .filter(|i| self.specs[*i].is_effectively_enabled())
            .collect();
        while let Some(index) = queue.pop_front() {
            let under_test = self.config.is_under_test(self.specs[index].name());
            let providers: Vec<usize> = graph
                .providers_of(index)
                .filter(|e| e.kind() == DependencyKind::Required || (under_test && e.kind() == DependencyKind::Test))
                .map(|e| e.to)
                .collect();
            for provider in providers {
                let spec = &self.specs[provider];
                if spec.is_effectively_enabled() || spec.is_force_disabled() || !spec.is_available_for_host_platform() {
                    continue;
                }
                log::info!(
                    "Enabling plugin '{}' indirectly, it is needed by '{}'",
                    spec.name(),
                    self.specs[index].name()
                );
                self.specs[provider].set_enabled_indirectly(true);
                queue.push_back(provider);
            }
        }
    }

    /// Loads, initializes and starts every enabled plugin.
    ///
    /// Per-plugin failures are recorded on the plugins; the returned error
    /// only reports an inconsistency in the engine itself.
    pub fn load_plugins(&mut self) -> Result<()> {
        if self.graph.is_none() {
            self.resolve_dependencies()?;
        }
        self.enable_dependencies_indirectly();

        let order = self.load_order();
        for &index in &order {
            self.load_plugin(index, PluginState::Loaded)?;
        }
        for &index in &order {
            self.load_plugin(index, PluginState::Initialized)?;
        }
        for &index in order.iter().rev() {
            let was_running = self.specs[index].state() == PluginState::Running;
            self.load_plugin(index, PluginState::Running)?;
            let spec = &self.specs[index];
            if !was_running && spec.state() == PluginState::Running && !spec.has_error() {
                self.delayed_queue.push_back(index);
            }
        }

        let failed = self.plugins_with_errors().len();
        if failed > 0 {
            log::warn!("{} plugin(s) failed to load:\n{}", failed, self.format_plugin_errors());
        }
        log::info!(
            "{} plugin(s) running",
            self.specs.iter().filter(|s| s.state() == PluginState::Running).count()
        );
        Ok(())
    }

    fn load_plugin(&mut self, index: usize, destination: PluginState) -> Result<()> {
        let spec = &self.specs[index];
        if spec.has_error() || spec.state().next() != Some(destination) {
            return Ok(());
        }
        if destination == PluginState::Loaded && !spec.is_effectively_enabled() {
            return Ok(());
        }
        if destination == PluginState::Running {
            return self.initialize_extensions(index);
        }

        if let Some(dependency) = self.failed_required_dependency(index, destination) {
            let dependency = &self.specs[dependency];
            let message = format!(
                "Cannot load plugin because dependency failed to load: {} ({})\nReason: {}",
                dependency.name(),
                dependency.metadata().version,
                failure_reason(dependency)
            );
            let spec = &mut self.specs[index];
            spec.set_error(message);
            spec.set_disabled_indirectly(true);
            return Ok(());
        }

        match destination {
            PluginState::Loaded => self.instantiate(index),
            PluginState::Initialized => self.initialize_plugin(index),
            _ => Ok(()),
        }
    }

    /// First required provider of `index` that has not reached `destination`
    fn failed_required_dependency(&self, index: usize, destination: PluginState) -> Option<usize> {
        let graph = self.graph.as_ref()?;
        graph
            .providers_of(index)
            .filter(|e| e.kind() == DependencyKind::Required)
            .map(|e| e.to)
            .find(|provider| self.specs[*provider].state() != destination)
    }

    fn context_for(&self, index: usize) -> PluginContext {
        PluginContext::new(self.specs[index].name(), &self.host_platform(), self.object_pool.clone())
    }

    fn instantiate(&mut self, index: usize) -> Result<()> {
        let factory = self.specs[index].factory().clone();
        let spec = &mut self.specs[index];
        match catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(Ok(instance)) => {
                spec.set_instance(instance);
                spec.set_state(PluginState::Loaded)?;
            }
            Ok(Err(e)) => spec.set_error(format!("Loading the plugin failed: {}", e)),
            Err(payload) => spec.set_error(format!("Loading the plugin failed: panic: {}", panic_message(&*payload))),
        }
        Ok(())
    }

    fn initialize_plugin(&mut self, index: usize) -> Result<()> {
        let ctx = self.context_for(index);
        let spec = &mut self.specs[index];
        let Some(plugin) = spec.instance() else {
            spec.set_error("Internal error: no plugin instance to initialize".to_string());
            return Ok(());
        };
        let arguments = spec.arguments().to_vec();
        match catch_unwind(AssertUnwindSafe(|| plugin.initialize(&arguments, &ctx))) {
            Ok(Ok(())) => spec.set_state(PluginState::Initialized)?,
            Ok(Err(e)) => spec.set_error(format!("Plugin initialization failed: {}", e)),
            Err(payload) => spec.set_error(format!("Plugin initialization failed: panic: {}", panic_message(&*payload))),
        }
        Ok(())
    }

    fn initialize_extensions(&mut self, index: usize) -> Result<()> {
        let ctx = self.context_for(index);
        let spec = &mut self.specs[index];
        let Some(plugin) = spec.instance() else {
            spec.set_error("Internal error: no plugin instance to run".to_string());
            return Ok(());
        };
        match catch_unwind(AssertUnwindSafe(|| plugin.extensions_initialized(&ctx))) {
            Ok(()) => spec.set_state(PluginState::Running)?,
            Err(payload) => spec.set_error(format!("Plugin extension initialization failed: panic: {}", panic_message(&*payload))),
        }
        Ok(())
    }

    /// Runs `delayed_initialize` of every plugin started by `load_plugins`,
    /// dependants first, pausing after each plugin that asks for it.
    pub async fn run_delayed_initialize(&mut self) {
        let interval = Duration::from_millis(self.config.delayed_initialize_interval_ms);
        while let Some(index) = self.delayed_queue.pop_front() {
            let spec = &self.specs[index];
            if spec.state() != PluginState::Running || spec.has_error() {
                continue;
            }
            let Some(plugin) = spec.instance() else {
                continue;
            };

            let delay = match tokio::spawn(async move { plugin.delayed_initialize().await }).await {
                Ok(delay) => delay,
                Err(e) => {
                    let reason = if e.is_panic() {
                        format!("panic: {}", panic_message(&*e.into_panic()))
                    } else {
                        e.to_string()
                    };
                    self.specs[index].set_error(format!("Delayed initialization failed: {}", reason));
                    false
                }
            };
            if delay && !self.delayed_queue.is_empty() {
                tokio::time::sleep(interval).await;
            }
        }
        if !self.initialization_done {
            self.initialization_done = true;
            log::info!("Plugin initialization done");
        }
    }

    /// Stops every running plugin in reverse load order, waits for
    /// asynchronous shutdowns, then drops all instances.
    ///
    /// A plugin is only stopped once every plugin depending on it has
    /// finished shutting down. Every stopped plugin ends up `Deleted`, keeping
    /// any error it picked up on the way. With `shutdown_timeout_ms` set, plugins that
    /// do not finish in time get an error and make the call fail after all
    /// instances are dropped.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.delayed_queue.clear();
        let reverse = self.graph.as_ref().map(DependencyGraph::reverse_order).unwrap_or_default();

        let mut pending: Vec<(usize, oneshot::Receiver<()>)> = Vec::new();
        let mut timed_out: Vec<String> = Vec::new();
        for &index in &reverse {
            // Running plugins that failed later on still get to stop
            if self.specs[index].state() != PluginState::Running {
                continue;
            }
            let dependants = self.graph.as_ref().map(|g| g.dependants_of(index)).unwrap_or_default();
            for dependant in dependants {
                if let Some(position) = pending.iter().position(|(p, _)| *p == dependant) {
                    let (_, receiver) = pending.remove(position);
                    self.await_shutdown(dependant, receiver, &mut timed_out).await;
                }
            }
            if let Some(receiver) = self.stop_plugin(index)? {
                pending.push((index, receiver));
            }
        }

        for (index, receiver) in pending {
            self.await_shutdown(index, receiver, &mut timed_out).await;
        }

        for &index in &reverse {
            let spec = &mut self.specs[index];
            let instance = spec.take_instance();
            if spec.state() == PluginState::Stopped {
                spec.set_state(PluginState::Deleted)?;
            }
            drop(instance);
        }
        for spec in &mut self.specs {
            spec.take_instance();
        }

        let leftovers = self.object_pool.all_objects();
        if !leftovers.is_empty() {
            let names: Vec<&str> = leftovers.iter().map(|o| o.name()).collect();
            log::warn!(
                "There are {} object(s) left in the object pool: {}",
                leftovers.len(),
                names.join(", ")
            );
        }

        match timed_out.first() {
            None => {
                log::info!("Plugin shutdown complete");
                Ok(())
            }
            Some(first) => Err(PluginSystemError::ShutdownError {
                plugin_id: first.clone(),
                message: format!("asynchronous shutdown did not finish for: {}", timed_out.join(", ")),
            }
            .into()),
        }
    }

    fn stop_plugin(&mut self, index: usize) -> Result<Option<oneshot::Receiver<()>>> {
        let spec = &mut self.specs[index];
        let Some(plugin) = spec.instance() else {
            return Ok(None);
        };
        let (sender, receiver) = oneshot::channel();
        let notifier = ShutdownNotifier::new(spec.name(), sender);
        match catch_unwind(AssertUnwindSafe(|| plugin.about_to_shutdown(notifier))) {
            Ok(flag) => {
                spec.set_state(PluginState::Stopped)?;
                if flag == ShutdownFlag::Asynchronous {
                    log::debug!("Plugin '{}' shuts down asynchronously", spec.name());
                    return Ok(Some(receiver));
                }
            }
            Err(payload) => spec.set_error(format!("Plugin shutdown failed: panic: {}", panic_message(&*payload))),
        }
        Ok(None)
    }

    async fn await_shutdown(&mut self, index: usize, receiver: oneshot::Receiver<()>, timed_out: &mut Vec<String>) {
        let name = self.specs[index].name().to_string();
        let outcome = match self.config.shutdown_timeout_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), receiver).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.specs[index].set_error(format!("Asynchronous shutdown timed out after {} ms", ms));
                    timed_out.push(name);
                    return;
                }
            },
            None => receiver.await,
        };
        match outcome {
            Ok(()) => log::debug!("Plugin '{}' finished shutting down", name),
            Err(_) => log::warn!(
                "Plugin '{}' dropped its shutdown notifier without signalling; treating shutdown as finished",
                name
            ),
        }
    }

    /// Forwards a command to a running plugin.
    pub fn remote_command(
        &self,
        name: &str,
        options: &[String],
        working_directory: &str,
        arguments: &[String],
    ) -> Result<Option<Component>> {
        let spec = &self.specs[self.index_of(name)?];
        if spec.state() != PluginState::Running {
            return Err(PluginSystemError::WrongState {
                plugin_id: name.to_string(),
                state: spec.state(),
                expected: PluginState::Running,
            }
            .into());
        }
        let plugin = spec
            .instance()
            .ok_or_else(|| PluginSystemError::InternalError(format!("Running plugin '{}' has no instance", name)))?;
        catch_unwind(AssertUnwindSafe(|| plugin.remote_command(options, working_directory, arguments))).map_err(
            |payload| {
                PluginSystemError::InternalError(format!(
                    "Plugin '{}' panicked while handling a remote command: {}",
                    name,
                    panic_message(&*payload)
                ))
                .into()
            },
        )
    }

    /// Test objects of every running plugin under test, in load order
    pub fn create_test_objects(&self) -> Vec<Component> {
        let mut objects = Vec::new();
        for spec in self.load_queue() {
            if spec.state() != PluginState::Running || !self.config.is_under_test(spec.name()) {
                continue;
            }
            let Some(plugin) = spec.instance() else {
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| plugin.create_test_objects())) {
                Ok(created) => objects.extend(created),
                Err(payload) => log::error!(
                    "Plugin '{}' panicked while creating test objects: {}",
                    spec.name(),
                    panic_message(&*payload)
                ),
            }
        }
        objects
    }

    /// Resolved declarations of `name` with the plugin providing each
    pub fn dependency_specs(&self, name: &str) -> Result<Vec<(PluginDependency, &PluginSpec)>> {
        let index = self.index_of(name)?;
        Ok(self
            .graph
            .as_ref()
            .map(|g| {
                g.providers_of(index)
                    .map(|e| (e.declaration.clone(), &self.specs[e.to]))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Plugins that need `name`, directly or through other plugins
    pub fn plugins_requiring(&self, name: &str) -> Result<Vec<&PluginSpec>> {
        let index = self.index_of(name)?;
        Ok(self.required_closure(index, true))
    }

    /// Plugins `name` needs, directly or through other plugins
    pub fn plugins_required_by(&self, name: &str) -> Result<Vec<&PluginSpec>> {
        let index = self.index_of(name)?;
        Ok(self.required_closure(index, false))
    }

    fn required_closure(&self, start: usize, towards_dependants: bool) -> Vec<&PluginSpec> {
        let Some(graph) = &self.graph else {
            return Vec::new();
        };
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for edge in graph.edges().iter().filter(|e| e.kind() == DependencyKind::Required) {
                let next = if towards_dependants {
                    (edge.to == node).then_some(edge.from)
                } else {
                    (edge.from == node).then_some(edge.to)
                };
                if let Some(next) = next {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        seen.remove(&start);

        let order = graph.forward_order();
        let mut found: Vec<usize> = seen.into_iter().collect();
        found.sort_by_key(|i| (order.iter().position(|o| o == i).unwrap_or(usize::MAX), *i));
        found.into_iter().map(|i| &self.specs[i]).collect()
    }

    /// Status of every plugin in registration order
    pub fn snapshot(&self) -> Vec<PluginStatus> {
        self.specs.iter().map(PluginSpec::status).collect()
    }

    pub fn plugins_with_errors(&self) -> Vec<&PluginSpec> {
        self.specs.iter().filter(|s| s.has_error()).collect()
    }

    /// Human readable list of every plugin error
    pub fn format_plugin_errors(&self) -> String {
        self.specs
            .iter()
            .filter_map(|s| s.error().map(|e| format!("{} ({})\n{}", s.name(), s.metadata().version, e)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Enables or disables a plugin for future runs. Required plugins cannot
    /// be disabled.
    pub fn set_enabled_by_settings(&mut self, name: &str, enabled: bool) -> Result<()> {
        let index = self.index_of(name)?;
        let spec = &mut self.specs[index];
        if !enabled && spec.is_required() {
            return Err(PluginSystemError::RequiredPlugin {
                plugin_id: name.to_string(),
            }
            .into());
        }
        spec.set_enabled_by_settings(enabled);
        Ok(())
    }

    /// Enablement choices that differ from each plugin's default
    pub fn write_settings(&self) -> PluginSettings {
        let mut settings = PluginSettings::default();
        for spec in &self.specs {
            if spec.is_enabled_by_default() && !spec.is_enabled_by_settings() {
                settings.ignored.push(spec.name().to_string());
            } else if !spec.is_enabled_by_default() && spec.is_enabled_by_settings() {
                settings.force_enabled.push(spec.name().to_string());
            }
        }
        settings
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.specs)
            .field("resolved", &self.graph.is_some())
            .field("initialization_done", &self.initialization_done)
            .finish()
    }
}
