//! Damageable zombies demo.
//!
//! # Usage
//!
//! ```bash
//! damageable [zombies]
//! ```
//!
//! Spawns the given number of zombies (default 3), hits each of them on the
//! arm, removes the first one and shuts down. Set `RUST_LOG=debug` to watch
//! the component lifecycle.

use std::time::Duration;

use example::{DAMAGEABLE, Health, Scene};
use rosyn_app::app::App;
use rosyn_components::{ComponentType, ComponentsPlugin, Rosyn};
use rosyn_core_plugins::{TracingFormat, TracingPlugin};

#[tokio::main]
async fn main() {
    let zombies: usize = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(3);

    let scene = Scene::new().unwrap_or_else(|e| {
        eprintln!("Error: cannot build the scene: {e}");
        std::process::exit(1);
    });

    let mut app = App::new();
    app.add_plugins(TracingPlugin::default().with_format(TracingFormat::Compact));
    app.add_plugins(
        ComponentsPlugin::new(scene.tree.clone(), scene.tags.clone())
            .with_default_timeout(Duration::from_secs(5)),
    );
    app.finish();

    let Some(rosyn) = app.api::<Rosyn>().cloned() else {
        eprintln!("Error: components plugin did not start");
        std::process::exit(1);
    };

    let health = ComponentType::of::<Health>();
    if let Err(e) = rosyn.register(DAMAGEABLE, &[health], scene.workspace) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let mut spawned = Vec::with_capacity(zombies);
    for index in 1..=zombies {
        match scene.spawn_zombie(&format!("Zombie{index}")) {
            Ok(zombie) => spawned.push(zombie),
            Err(e) => eprintln!("Error: cannot spawn zombie {index}: {e}"),
        }
    }

    for zombie in &spawned {
        if let Err(e) = rosyn.await_component_init(zombie.body, &health, None).await {
            eprintln!("Error: {e}");
            continue;
        }
        let hit = rosyn
            .get_component_from_descendant(zombie.arm, &health)
            .and_then(|instance| instance.downcast_arc::<Health>());
        if let Some(target) = hit {
            println!("{} has {} health left", zombie.body, target.damage(25));
        }
    }

    if let Some(first) = spawned.first() {
        if let Err(e) = scene.tree.remove(first.body) {
            eprintln!("Error: {e}");
        }
    }
    println!(
        "{} zombies still standing",
        rosyn.get_instances_of_class(&health).len()
    );

    app.cleanup();
}
