use super::{json_pretty, load_manifest, print_diagnostics, EXIT_SUCCESS};
use stackplan_core::{CoreError, Engine, ExposureMode};
use std::path::Path;

pub fn run(
    engine: &Engine,
    manifest: &Path,
    profile: &str,
    mode: ExposureMode,
    out_dir: &Path,
    json: bool,
) -> Result<u8, String> {
    let m = load_manifest(engine, manifest)?;
    let generated = match engine.generate_to_dir(&m, profile, mode, out_dir) {
        Ok(generated) => generated,
        Err(CoreError::Rejected(diagnostics)) => {
            if json {
                let payload = serde_json::json!({
                    "status": "rejected",
                    "diagnostics": diagnostics,
                });
                println!("{}", json_pretty(&payload)?);
            } else {
                print_diagnostics(&diagnostics);
            }
            return Err(CoreError::Rejected(diagnostics).to_string());
        }
        Err(e) => return Err(e.to_string()),
    };

    if json {
        let payload = serde_json::json!({
            "status": "written",
            "profile": profile,
            "exposure": mode,
            "fingerprint": generated.artifacts.fingerprint(),
            "paths": generated.paths,
            "diagnostics": generated.diagnostics,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_diagnostics(&generated.diagnostics);
        for path in &generated.paths {
            println!("wrote {}", path.display());
        }
        println!("fingerprint: {}", generated.artifacts.fingerprint());
    }
    Ok(EXIT_SUCCESS)
}
