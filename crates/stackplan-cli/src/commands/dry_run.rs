use super::{json_pretty, load_manifest, print_diagnostics, EXIT_REJECTED, EXIT_SUCCESS};
use stackplan_core::{Engine, ExposureMode};
use std::path::Path;

pub fn run(
    engine: &Engine,
    manifest: &Path,
    profile: &str,
    mode: ExposureMode,
    quiet: bool,
    json: bool,
) -> Result<u8, String> {
    let m = load_manifest(engine, manifest)?;
    let run = engine
        .dry_run(&m, profile, mode)
        .map_err(|e| e.to_string())?;
    let code = if run.is_rejected() {
        EXIT_REJECTED
    } else {
        EXIT_SUCCESS
    };

    if json {
        let payload = serde_json::json!({
            "profile": profile,
            "exposure": mode,
            "rejected": run.is_rejected(),
            "fingerprint": run.artifacts.as_ref().map(stackplan_core::Artifacts::fingerprint),
            "diagnostics": run.diagnostics,
            "artifacts": run.artifacts,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(code);
    }

    print_diagnostics(&run.diagnostics);
    let Some(artifacts) = run.artifacts else {
        println!("dry run rejected ({})", run.diagnostics);
        return Ok(code);
    };
    if !quiet {
        for artifact in artifacts.iter() {
            println!("==> {} <==", artifact.file_name);
            print!("{}", artifact.content);
            println!();
        }
    }
    println!("fingerprint: {}", artifacts.fingerprint());
    Ok(code)
}
