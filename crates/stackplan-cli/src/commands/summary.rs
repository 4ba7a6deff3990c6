use super::{json_pretty, load_manifest, EXIT_SUCCESS};
use stackplan_core::{access_urls, plan_by_category, Engine, ExposureMode};
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
    let groups = plan_by_category(&planned);
    let urls = access_urls(&planned);

    if json {
        let payload = serde_json::json!({
            "project": planned.project_name,
            "profile": profile,
            "exposure": mode,
            "services": planned.services.len(),
            "categories": groups,
            "access_urls": urls,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    println!(
        "{}: profile {profile}, {mode} exposure, {} service(s)",
        planned.project_name,
        planned.services.len()
    );
    for (category, names) in &groups {
        let names: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
        println!("  {category:<14} {}", names.join(", "));
    }
    if !urls.is_empty() {
        println!("access:");
        for url in &urls {
            println!("  {:<20} {}", url.service, url.url);
        }
    }
    Ok(EXIT_SUCCESS)
}
