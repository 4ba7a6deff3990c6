use super::{json_pretty, load_manifest, print_diagnostics, EXIT_REJECTED, EXIT_SUCCESS};
use stackplan_core::Engine;
use std::path::Path;

pub fn run(
    engine: &Engine,
    manifest: &Path,
    profile: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let m = load_manifest(engine, manifest)?;
    let diagnostics = engine.validate(&m, profile);
    let fatal = diagnostics.has_fatal();

    if json {
        let payload = serde_json::json!({
            "valid": !fatal,
            "profile": profile,
            "diagnostics": diagnostics,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_diagnostics(&diagnostics);
        if fatal {
            println!("{} is invalid ({diagnostics})", manifest.display());
        } else {
            println!(
                "{} is valid ({} warning(s))",
                manifest.display(),
                diagnostics.len()
            );
        }
    }
    Ok(if fatal { EXIT_REJECTED } else { EXIT_SUCCESS })
}
