//! Registry of render features and base-pass hooks.
//!
//! Features and hooks are registered explicitly and removed with the token
//! returned at registration time. The scheduler snapshots the registry once per
//! camera, so registering or unregistering during a frame takes effect on the
//! next graph.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::backend::Camera;
use crate::error::PassResult;
use crate::pipeline::RenderFeature;
use crate::render_graph::PassContext;

/// Callback fired at a fixed point inside the base pass
pub type HookFn = dyn Fn(&Camera, &mut PassContext<'_>) -> PassResult + Send + Sync;

/// Points inside the base pass where hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookPoint {
    AfterSkybox,
    AfterOpaque,
    AfterTransparent,
}

/// Token identifying one registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Registration(u64);

impl Registration {
    pub fn id(&self) -> u64 {
        self.0
    }
}

struct FeatureEntry {
    token: Registration,
    order: i32,
    feature: Arc<dyn RenderFeature>,
}

struct HookEntry {
    token: Registration,
    point: HookPoint,
    hook: Arc<HookFn>,
}

#[derive(Default)]
struct Entries {
    next_token: u64,
    /// Kept sorted by `(order, token)`
    features: Vec<FeatureEntry>,
    /// Kept in registration order
    hooks: Vec<HookEntry>,
}

impl Entries {
    fn issue_token(&mut self) -> Registration {
        let token = Registration(self.next_token);
        self.next_token += 1;
        token
    }
}

/// Thread-safe registry of render features and hooks
#[derive(Default)]
pub struct PassRegistry {
    entries: RwLock<Entries>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<PassRegistry> {
        static GLOBAL: OnceLock<Arc<PassRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(PassRegistry::new())).clone()
    }

    /// Register a feature. Features record their passes in ascending `order`;
    /// equal orders keep registration order.
    pub fn register_feature(&self, order: i32, feature: Arc<dyn RenderFeature>) -> Registration {
        let mut entries = self.entries.write();
        let token = entries.issue_token();
        log::debug!(
            "Registered feature '{}' (order {}, {:?})",
            feature.name(),
            order,
            token
        );

        let position = entries
            .features
            .partition_point(|e| (e.order, e.token) < (order, token));
        entries.features.insert(
            position,
            FeatureEntry {
                token,
                order,
                feature,
            },
        );
        token
    }

    /// Register a hook fired at `point`, after previously registered hooks.
    pub fn register_hook<F>(&self, point: HookPoint, hook: F) -> Registration
    where
        F: Fn(&Camera, &mut PassContext<'_>) -> PassResult + Send + Sync + 'static,
    {
        let mut entries = self.entries.write();
        let token = entries.issue_token();
        log::debug!("Registered hook at {:?} ({:?})", point, token);
        entries.hooks.push(HookEntry {
            token,
            point,
            hook: Arc::new(hook),
        });
        token
    }

    /// Remove exactly the entry identified by `token`.
    ///
    /// Returns `false` if the token was already removed.
    pub fn unregister(&self, token: Registration) -> bool {
        let mut entries = self.entries.write();
        if let Some(index) = entries.features.iter().position(|e| e.token == token) {
            let entry = entries.features.remove(index);
            log::debug!("Unregistered feature '{}'", entry.feature.name());
            return true;
        }
        if let Some(index) = entries.hooks.iter().position(|e| e.token == token) {
            let entry = entries.hooks.remove(index);
            log::debug!("Unregistered hook at {:?}", entry.point);
            return true;
        }
        false
    }

    /// Remove every feature and hook.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        log::debug!(
            "Clearing registry ({} features, {} hooks)",
            entries.features.len(),
            entries.hooks.len()
        );
        entries.features.clear();
        entries.hooks.clear();
    }

    /// Registered features in recording order.
    pub fn features(&self) -> Vec<Arc<dyn RenderFeature>> {
        self.entries
            .read()
            .features
            .iter()
            .map(|e| e.feature.clone())
            .collect()
    }

    /// Hooks registered at `point`, in registration order.
    pub fn hooks(&self, point: HookPoint) -> Vec<Arc<HookFn>> {
        self.entries
            .read()
            .hooks
            .iter()
            .filter(|e| e.point == point)
            .map(|e| e.hook.clone())
            .collect()
    }

    /// Snapshot of every hook, grouped by point.
    pub fn hook_table(&self) -> HookTable {
        let entries = self.entries.read();
        let mut table = HookTable::default();
        for entry in &entries.hooks {
            table
                .hooks
                .entry(entry.point)
                .or_default()
                .push(entry.hook.clone());
        }
        table
    }

    pub fn feature_count(&self) -> usize {
        self.entries.read().features.len()
    }

    pub fn hook_count(&self) -> usize {
        self.entries.read().hooks.len()
    }
}

impl fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        let features: Vec<&str> = entries.features.iter().map(|e| e.feature.name()).collect();
        f.debug_struct("PassRegistry")
            .field("features", &features)
            .field("hooks", &entries.hooks.len())
            .finish()
    }
}

/// Immutable set of hooks captured for one graph
#[derive(Clone, Default)]
pub struct HookTable {
    hooks: BTreeMap<HookPoint, Vec<Arc<HookFn>>>,
}

impl HookTable {
    pub fn len(&self, point: HookPoint) -> usize {
        self.hooks.get(&point).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }

    /// Run the hooks at `point` in order, stopping at the first failure.
    pub fn fire(&self, point: HookPoint, camera: &Camera, ctx: &mut PassContext<'_>) -> PassResult {
        for hook in self.hooks.get(&point).into_iter().flatten() {
            hook(camera, ctx)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (point, hooks) in &self.hooks {
            map.entry(point, &hooks.len());
        }
        map.finish()
    }
}
