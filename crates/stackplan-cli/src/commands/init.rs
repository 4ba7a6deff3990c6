use super::{json_pretty, EXIT_SUCCESS};
use stackplan_schema::{get_template, list_templates};
use std::path::Path;

fn print_templates(json: bool) -> Result<(), String> {
    if json {
        let entries: Vec<_> = list_templates()
            .iter()
            .map(|t| serde_json::json!({ "name": t.name, "description": t.description }))
            .collect();
        println!("{}", json_pretty(&entries)?);
    } else {
        for template in list_templates() {
            println!("{:<12} {}", template.name, template.description);
        }
    }
    Ok(())
}

pub fn run(
    manifest: &Path,
    template: &str,
    force: bool,
    list: bool,
    json: bool,
) -> Result<u8, String> {
    if list {
        print_templates(json)?;
        return Ok(EXIT_SUCCESS);
    }

    let names: Vec<&str> = list_templates().iter().map(|t| t.name).collect();
    let tpl = get_template(template).ok_or_else(|| {
        format!(
            "unknown template '{template}' (expected: {})",
            names.join(", ")
        )
    })?;
    if manifest.exists() && !force {
        return Err(format!(
            "refusing to overwrite existing {} (pass --force)",
            manifest.display()
        ));
    }

    let parsed = tpl.parse().map_err(|e| format!("template parse error: {e}"))?;
    parsed.write_to_file(manifest).map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "status": "written",
            "path": manifest.display().to_string(),
            "template": tpl.name,
            "services": parsed.services.len(),
            "profiles": parsed.profiles.len(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "wrote {} ({} services, {} profiles)",
            manifest.display(),
            parsed.services.len(),
            parsed.profiles.len()
        );
        println!("template: {}", tpl.name);
    }
    Ok(EXIT_SUCCESS)
}
