use super::{json_pretty, load_manifest, EXIT_SUCCESS};
use stackplan_core::Engine;
use std::path::Path;

pub fn run(engine: &Engine, manifest: &Path, profile: &str, json: bool) -> Result<u8, String> {
    let m = load_manifest(engine, manifest)?;
    let resolved = engine.resolve(&m, profile).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&resolved)?);
    } else if resolved.is_empty() {
        println!("profile {profile} resolves to no services");
    } else {
        for service in &resolved.services {
            println!(
                "{:<20} {:<10} {}",
                service.name,
                service.spec.category,
                service.spec.description
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
