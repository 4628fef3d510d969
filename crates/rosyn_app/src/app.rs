//! The plugin host.
//!
//! An [`App`] holds plugins, the APIs they publish and read-only globals. It
//! has no behavior of its own.
//!
//! # Phases
//!
//! 1. **Order** - plugins are sorted so dependencies come first
//! 2. **Build** - `plugin.build()` runs in that order
//! 3. **Ready** - `plugin.ready()` runs in that order
//! 4. **Cleanup** - `plugin.cleanup()` runs in reverse

use core::any::{Any, TypeId};

use hashbrown::{HashMap, HashSet};

use crate::api::API;
use crate::plugin::{Plugin, PluginId};

type Erased = Box<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Collecting,
    Building,
    Finished,
}

struct Slot {
    id: PluginId,
    name: String,
    plugin: Box<dyn Plugin>,
}

/// Hosts plugins and the values they publish.
///
/// # Example
///
/// ```ignore
/// use rosyn::prelude::*;
///
/// let mut app = App::new();
/// app.add_plugins(TracingPlugin::default())
///     .add_plugins(ComponentsPlugin::new(tree, tags))
///     .run();
///
/// let rosyn = app.api::<Rosyn>().unwrap().clone();
/// ```
#[derive(Default)]
pub struct App {
    globals: HashMap<TypeId, Erased>,
    apis: HashMap<TypeId, Erased>,
    /// Added but not built yet.
    queued: Vec<Slot>,
    /// Built, in build order.
    built: Vec<Slot>,
    seen: HashSet<PluginId>,
    phase: Phase,
}

impl App {
    /// Creates an app with no plugins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin.
    ///
    /// A plugin added from another plugin's `build()` is built right away.
    ///
    /// # Panics
    ///
    /// Panics if the plugin is unique and its type was already added.
    pub fn add_plugins<P: Plugin>(&mut self, plugin: P) -> &mut Self {
        let id = PluginId::of::<P>();
        let name = plugin.name().to_owned();
        if !self.seen.insert(id) && plugin.is_unique() {
            panic!("Plugin '{name}' is unique and was already added.");
        }

        let slot = Slot {
            id,
            name,
            plugin: Box::new(plugin),
        };
        if self.phase == Phase::Building {
            tracing::debug!(plugin = %slot.name, "building nested plugin");
            slot.plugin.build(self);
            self.built.push(slot);
        } else {
            self.queued.push(slot);
        }
        self
    }

    /// Returns true if a plugin of type `P` was added.
    #[must_use]
    pub fn has_plugin<P: Plugin>(&self) -> bool {
        self.seen.contains(&PluginId::of::<P>())
    }

    /// Returns true once [`finish`](Self::finish) has returned.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Stores a global, returning the one of the same type it replaced.
    pub fn insert_global<R: Send + Sync + 'static>(&mut self, value: R) -> Option<R> {
        take(self.globals.insert(TypeId::of::<R>(), Box::new(value)))
    }

    /// Returns the global of type `R`.
    #[must_use]
    pub fn get_global<R: Send + Sync + 'static>(&self) -> Option<&R> {
        self.globals.get(&TypeId::of::<R>())?.downcast_ref()
    }

    /// Publishes an API, returning the one of the same type it replaced.
    pub fn insert_api<A: API>(&mut self, api: A) -> Option<A> {
        take(self.apis.insert(TypeId::of::<A>(), Box::new(api)))
    }

    /// Returns the published API of type `A`.
    #[must_use]
    pub fn api<A: API>(&self) -> Option<&A> {
        self.apis.get(&TypeId::of::<A>())?.downcast_ref()
    }

    /// Returns true if an API of type `A` was published.
    #[must_use]
    pub fn contains_api<A: API>(&self) -> bool {
        self.apis.contains_key(&TypeId::of::<A>())
    }

    /// Orders, builds and readies every added plugin.
    ///
    /// # Panics
    ///
    /// Panics if called twice, if a dependency was never added, or if
    /// dependencies form a cycle.
    pub fn finish(&mut self) {
        if self.phase != Phase::Collecting {
            panic!("App::finish() was already called.");
        }

        let ordered = self.order();
        self.phase = Phase::Building;
        for slot in ordered {
            tracing::debug!(plugin = %slot.name, "building plugin");
            slot.plugin.build(self);
            self.built.push(slot);
        }

        // ready() may add plugins; those are built immediately and kept.
        let mut built = core::mem::take(&mut self.built);
        for slot in &built {
            slot.plugin.ready(self);
        }
        built.append(&mut self.built);
        self.built = built;
        self.phase = Phase::Finished;
    }

    /// Shorthand for [`finish`](Self::finish).
    pub fn run(&mut self) {
        self.finish();
    }

    /// Runs every plugin's `cleanup()`, last built first.
    pub fn cleanup(&mut self) {
        let built = core::mem::take(&mut self.built);
        for slot in built.iter().rev() {
            tracing::debug!(plugin = %slot.name, "cleaning up plugin");
            slot.plugin.cleanup(self);
        }
        self.built = built;
    }

    /// Depth-first topological order of the queued plugins. Plugins without
    /// dependencies keep the order they were added in.
    fn order(&mut self) -> Vec<Slot> {
        let queued = core::mem::take(&mut self.queued);
        let index: HashMap<PluginId, usize> = queued
            .iter()
            .enumerate()
            .map(|(position, slot)| (slot.id, position))
            .collect();

        let mut marks = vec![Mark::Unvisited; queued.len()];
        let mut order = Vec::with_capacity(queued.len());
        for start in 0..queued.len() {
            let mut path = Vec::new();
            self.visit(start, &queued, &index, &mut marks, &mut path, &mut order);
        }

        let mut slots: Vec<Option<Slot>> = queued.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|position| slots[position].take())
            .collect()
    }

    fn visit(
        &self,
        position: usize,
        queued: &[Slot],
        index: &HashMap<PluginId, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) {
        match marks[position] {
            Mark::Done => return,
            Mark::OnPath => {
                let cycle: Vec<&str> = path
                    .iter()
                    .skip_while(|step| **step != position)
                    .map(|step| queued[*step].name.as_str())
                    .collect();
                panic!("Circular dependency detected among plugins: {cycle:?}");
            }
            Mark::Unvisited => {}
        }

        marks[position] = Mark::OnPath;
        path.push(position);
        let slot = &queued[position];
        for dependency in slot.plugin.dependencies() {
            if let Some(&next) = index.get(&dependency) {
                self.visit(next, queued, index, marks, path, order);
            } else if !self.built.iter().any(|done| done.id == dependency) {
                panic!("Plugin '{}' requires '{dependency}' which was not added.", slot.name);
            }
        }
        path.pop();
        marks[position] = Mark::Done;
        order.push(position);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

fn take<T: 'static>(old: Option<Erased>) -> Option<T> {
    old.and_then(|boxed| boxed.downcast::<T>().ok()).map(|boxed| *boxed)
}
