use super::{json_pretty, load_manifest, EXIT_SUCCESS};
use stackplan_core::{Engine, ExposureMode};
use std::path::Path;

pub fn run(
    engine: &Engine,
    manifest: &Path,
    profile: &str,
    mode: ExposureMode,
    json: bool,
) -> Result<u8, String> {
    let m = load_manifest(engine, manifest)?;
    let resolved = engine.resolve(&m, profile).map_err(|e| e.to_string())?;
    let planned = engine.plan(&resolved, mode);
    if json {
        println!("{}", json_pretty(&planned)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("profile {profile}, {mode} exposure");
    for service in &planned.services {
        if service.bindings.is_empty() {
            println!("  {:<20} (no host ports)", service.name);
            continue;
        }
        for (i, binding) in service.bindings.iter().enumerate() {
            let name = if i == 0 { service.name.as_str() } else { "" };
            println!("  {name:<20} {binding}");
        }
        if service.withheld > 0 {
            println!("  {:<20} {} withheld", "", service.withheld);
        }
    }
    Ok(EXIT_SUCCESS)
}
