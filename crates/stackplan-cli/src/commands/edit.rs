use super::{colorize_enabled, json_pretty, print_diagnostics, EXIT_SUCCESS};
use stackplan_core::{CoreError, Engine, ManifestEditor};
use stackplan_schema::HostIp;
use std::path::Path;

fn save(editor: &mut ManifestEditor, engine: &Engine, json: bool) -> Result<(), String> {
    match editor.save(&engine.validator()) {
        Ok(warnings) => {
            if !json {
                print_diagnostics(&warnings);
            }
            Ok(())
        }
        Err(CoreError::Rejected(diagnostics)) => {
            print_diagnostics(&diagnostics);
            Err(CoreError::Rejected(diagnostics).to_string())
        }
        Err(e) => Err(e.to_string()),
    }
}

/// `Some(flag)` sets every service to `flag`; `None` toggles each one.
pub fn set_enabled(
    engine: &Engine,
    manifest: &Path,
    services: &[String],
    enabled: Option<bool>,
    json: bool,
) -> Result<u8, String> {
    let mut editor = ManifestEditor::open(manifest).map_err(|e| e.to_string())?;
    let mut changes = Vec::with_capacity(services.len());
    for name in services {
        let state = match enabled {
            Some(flag) => {
                editor.set_enabled(name, flag).map_err(|e| e.to_string())?;
                flag
            }
            None => editor.toggle(name).map_err(|e| e.to_string())?,
        };
        changes.push((name.as_str(), state));
    }
    if editor.is_dirty() {
        save(&mut editor, engine, json)?;
    }

    if json {
        let payload: Vec<_> = changes
            .iter()
            .map(|(name, state)| serde_json::json!({ "service": name, "enabled": state }))
            .collect();
        println!("{}", json_pretty(&payload)?);
    } else {
        for (name, state) in &changes {
            println!("{name}: {}", colorize_enabled(*state));
        }
    }
    Ok(EXIT_SUCCESS)
}

/// `index` counts from 1, as printed by `list`.
pub fn set_port(
    engine: &Engine,
    manifest: &Path,
    service: &str,
    index: usize,
    host_ip: Option<&str>,
    host_port: Option<u16>,
    json: bool,
) -> Result<u8, String> {
    if host_ip.is_none() && host_port.is_none() {
        return Err("nothing to change: pass --host-port and/or --host-ip".to_owned());
    }
    let position = index
        .checked_sub(1)
        .ok_or_else(|| "port index starts at 1".to_owned())?;
    let host_ip = host_ip
        .map(str::parse::<HostIp>)
        .transpose()?;

    let mut editor = ManifestEditor::open(manifest).map_err(|e| e.to_string())?;
    editor
        .set_port(service, position, host_ip, host_port)
        .map_err(|e| match e {
            CoreError::PortIndexOutOfRange { service, count, .. } => {
                format!("{service} has no port #{index} ({count} declared)")
            }
            other => other.to_string(),
        })?;
    save(&mut editor, engine, json)?;

    let m = editor.manifest();
    let binding = m
        .service(service)
        .and_then(|spec| spec.ports.get(position))
        .copied()
        .ok_or_else(|| format!("unknown service: {service}"))?;
    let effective = binding.effective_host_ip(m.global.default_host_ip);
    if json {
        let payload = serde_json::json!({
            "service": service,
            "index": index,
            "binding": binding,
            "effective_host_ip": effective,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "{service} #{index}: {effective}:{} -> {}/{}",
            binding.host_port, binding.container_port, binding.protocol
        );
    }
    Ok(EXIT_SUCCESS)
}
