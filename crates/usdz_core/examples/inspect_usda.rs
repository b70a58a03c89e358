//! Example: Load and inspect a USDA file.
//!
//! Run with: cargo run --example inspect_usda -- scene.usda

use std::env;

use usdz_core::usd::load_usda;
use usdz_core::Visit;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: inspect_usda <path-to-usda-file>");
        println!("\nExample:");
        println!("  cargo run --example inspect_usda -- scene.usda");
        return;
    }

    let path = &args[1];
    println!("Loading USDA file: {}", path);

    let stage = match load_usda(path) {
        Ok(stage) => stage,
        Err(e) => {
            eprintln!("Error loading USDA: {}", e);
            std::process::exit(1);
        }
    };

    println!("\n=== Layer ===");
    println!("Default prim: {}", stage.metadata.default_prim.as_deref().unwrap_or("<none>"));
    if let Some(mpu) = stage.metadata.meters_per_unit {
        println!("Meters per unit: {}", mpu);
    }
    for (key, value) in &stage.metadata.custom_layer_data {
        println!("customLayerData {} = {}", key, value);
    }

    println!("\n--- Prims ---");
    stage.walk(|prim_path, prim| {
        let depth = prim_path.matches('/').count();
        let type_name = if prim.type_name.is_empty() { "-" } else { prim.type_name.as_str() };
        println!("{}{} [{}]", "  ".repeat(depth), prim.name, type_name);
        Visit::Continue
    });

    println!("\n--- Material bindings ---");
    for geom in stage.geometry_paths() {
        match stage.bound_material(&geom) {
            Some(material) => println!("  {} -> {}", geom, material),
            None => println!("  {} (unbound)", geom),
        }
    }

    println!("\n--- Textures ---");
    for texture in stage.texture_asset_paths() {
        println!("  {}", texture);
    }
}
