use super::{colorize_enabled, json_pretty, load_manifest, EXIT_SUCCESS};
use stackplan_core::{services_by_category, Engine};
use std::path::Path;

pub fn run(engine: &Engine, manifest: &Path, json: bool) -> Result<u8, String> {
    let m = load_manifest(engine, manifest)?;
    let groups = services_by_category(&m);
    if json {
        let payload: serde_json::Map<String, serde_json::Value> = groups
            .iter()
            .map(|(category, services)| {
                let entries = services
                    .iter()
                    .map(|(name, spec)| serde_json::json!({ "name": name, "service": spec }))
                    .collect();
                ((*category).to_owned(), serde_json::Value::Array(entries))
            })
            .collect();
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    if groups.is_empty() {
        println!("no services defined");
        return Ok(EXIT_SUCCESS);
    }
    let default_ip = m.global.default_host_ip;
    for (category, services) in &groups {
        println!("{category}");
        for (name, spec) in services {
            println!(
                "  {:<20} {:<10} {}",
                name,
                colorize_enabled(spec.enabled),
                spec.description
            );
            for (i, port) in spec.ports.iter().enumerate() {
                println!(
                    "      #{} {}:{} -> {}/{}",
                    i + 1,
                    port.effective_host_ip(default_ip),
                    port.host_port,
                    port.container_port,
                    port.protocol
                );
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
