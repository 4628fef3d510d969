//! Plugin lifecycle ordering.

use std::sync::{Arc, Mutex};

use rosyn_app::prelude::*;

type Log = Arc<Mutex<Vec<String>>>;

struct Recording<const N: u8> {
    log: Log,
    deps: Vec<PluginId>,
}

impl<const N: u8> Recording<N> {
    fn new(log: &Log) -> Self {
        Self {
            log: Arc::clone(log),
            deps: Vec::new(),
        }
    }

    fn after(mut self, dep: PluginId) -> Self {
        self.deps.push(dep);
        self
    }

    fn push(&self, phase: &str) {
        self.log.lock().unwrap().push(format!("{phase}:{N}"));
    }
}

impl<const N: u8> Plugin for Recording<N> {
    fn build(&self, _app: &mut App) {
        self.push("build");
    }

    fn ready(&self, _app: &mut App) {
        self.push("ready");
    }

    fn cleanup(&self, _app: &mut App) {
        self.push("cleanup");
    }

    fn dependencies(&self) -> Vec<PluginId> {
        self.deps.clone()
    }
}

#[test]
fn plugins_build_in_dependency_order_and_clean_up_in_reverse() {
    let log: Log = Arc::default();

    let mut app = App::new();
    app.add_plugins(Recording::<2>::new(&log).after(PluginId::of::<Recording<1>>()))
        .add_plugins(Recording::<1>::new(&log))
        .add_plugins(Recording::<3>::new(&log).after(PluginId::of::<Recording<2>>()));
    app.finish();
    app.cleanup();

    assert!(app.is_built());
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "build:1", "build:2", "build:3", "ready:1", "ready:2", "ready:3", "cleanup:3",
            "cleanup:2", "cleanup:1",
        ]
    );
}

#[test]
#[should_panic(expected = "was not added")]
fn missing_dependency_panics() {
    let log: Log = Arc::default();
    let mut app = App::new();
    app.add_plugins(Recording::<1>::new(&log).after(PluginId::of::<Recording<9>>()));
    app.finish();
}

#[test]
#[should_panic(expected = "Circular dependency")]
fn dependency_cycle_panics() {
    let log: Log = Arc::default();
    let mut app = App::new();
    app.add_plugins(Recording::<1>::new(&log).after(PluginId::of::<Recording<2>>()))
        .add_plugins(Recording::<2>::new(&log).after(PluginId::of::<Recording<1>>()));
    app.finish();
}

#[test]
#[should_panic(expected = "is unique and was already added")]
fn duplicate_unique_plugin_panics() {
    let log: Log = Arc::default();
    let mut app = App::new();
    app.add_plugins(Recording::<1>::new(&log))
        .add_plugins(Recording::<1>::new(&log));
}

struct Inner;

impl Plugin for Inner {
    fn build(&self, app: &mut App) {
        app.insert_global(7_u32);
    }
}

struct Outer;

impl Plugin for Outer {
    fn build(&self, app: &mut App) {
        app.add_plugins(Inner);
    }
}

#[test]
fn plugins_added_during_build_are_built_immediately() {
    let mut app = App::new();
    app.add_plugins(Outer).run();

    assert!(app.has_plugin::<Inner>());
    assert_eq!(app.get_global::<u32>(), Some(&7));
}
