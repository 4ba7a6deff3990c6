use super::{json_pretty, load_manifest, EXIT_SUCCESS};
use stackplan_core::{resolve, Engine};
use std::path::Path;

pub fn run(engine: &Engine, manifest: &Path, json: bool) -> Result<u8, String> {
    let m = load_manifest(engine, manifest)?;
    let mut rows = Vec::with_capacity(m.profiles.len());
    for (name, spec) in &m.profiles {
        let resolved = resolve(&m, name).map_err(|e| e.to_string())?;
        let services: Vec<String> = resolved.names().iter().map(ToString::to_string).collect();
        rows.push((name, spec, services));
    }

    if json {
        let payload: Vec<_> = rows
            .iter()
            .map(|(name, spec, services)| {
                serde_json::json!({
                    "name": name,
                    "description": spec.description,
                    "services": services,
                })
            })
            .collect();
        println!("{}", json_pretty(&payload)?);
    } else if rows.is_empty() {
        println!("no profiles defined; every enabled service runs under 'all'");
    } else {
        for (name, spec, services) in &rows {
            println!("{:<14} {:>3} service(s)  {}", name, services.len(), spec.description);
        }
    }
    Ok(EXIT_SUCCESS)
}
