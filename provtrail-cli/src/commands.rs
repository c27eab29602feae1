//! CLI subcommand handlers.

use std::path::Path;

use provtrail_core::{Coordinate, Format, Provenance, ProvtrailConfig, render};

use crate::bench;
use crate::catalog::Catalog;
use crate::sample;
use crate::{Commands, ConfigAction};

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    config: ProvtrailConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Load { catalog } => handle_load(&catalog, &config),
        Commands::Trace {
            store,
            variable,
            reference,
            format,
            json,
        } => {
            let coord = Coordinate::new(store, variable, reference);
            let format = format.unwrap_or(config.output.format);
            print!("{}", trace_output(&config, &coord, format, json)?);
            Ok(())
        }
        Commands::Demo {
            rows,
            format,
            persist,
        } => {
            let format = format.unwrap_or(config.output.format);
            print!("{}", demo_output(config, rows, format, persist)?);
            Ok(())
        }
        Commands::Bench { sizes, repeat, keep } => {
            for record in bench::run(&sizes, repeat, keep, workspace)? {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
        Commands::Stats { json } => handle_stats(&config, json),
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

fn handle_load(path: &Path, config: &ProvtrailConfig) -> anyhow::Result<()> {
    let catalog = Catalog::from_path(path)?;
    let mut prov = Provenance::open(config)?;
    let summary = catalog.apply(&mut prov)?;
    prov.close()?;
    println!(
        "Loaded {} definitions ({} new) and {} events ({} new) from {}",
        summary.definitions,
        summary.new_elements,
        summary.events,
        summary.new_events,
        path.display()
    );
    Ok(())
}

fn trace_output(
    config: &ProvtrailConfig,
    coord: &Coordinate,
    format: Format,
    json: bool,
) -> anyhow::Result<String> {
    let prov = Provenance::open(config)?;
    let lineage = prov.trace(coord)?;
    prov.close()?;

    if json {
        let mut out = serde_json::to_string_pretty(&lineage)?;
        out.push('\n');
        return Ok(out);
    }
    if lineage.is_empty() {
        eprintln!("No recorded provenance for {coord}");
    }
    Ok(render::render(&lineage, format)?)
}

fn demo_output(
    mut config: ProvtrailConfig,
    rows: usize,
    format: Format,
    persist: bool,
) -> anyhow::Result<String> {
    if rows == 0 {
        anyhow::bail!("demo needs at least one row");
    }
    if !persist {
        config.database.in_memory = true;
    }
    let mut prov = Provenance::open(&config)?;
    sample::register(&mut prov)?;
    sample::record_rows(&mut prov, rows)?;
    let coord = sample::average_pulse(rows);
    let out = prov.get_provenance(&coord.store, &coord.variable, &coord.reference, format)?;
    prov.close()?;
    Ok(out)
}

fn handle_stats(config: &ProvtrailConfig, json: bool) -> anyhow::Result<()> {
    let prov = Provenance::open(config)?;
    let stats = prov.stats()?;
    prov.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    if config.database.in_memory {
        println!("Catalog: in memory");
    } else {
        println!("Catalog: {}", config.database.path.display());
    }
    for (table, rows) in &stats.rows {
        println!("  {:<16} {}", table, rows);
    }
    println!("  {:<16} {}", "total", stats.total());
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    config: &ProvtrailConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".provtrail");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&ProvtrailConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn in_memory() -> ProvtrailConfig {
        let mut config = ProvtrailConfig::default();
        config.database.in_memory = true;
        config
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, in_memory(), workspace).unwrap();

        let config_path = workspace.join(".provtrail").join("config.toml");
        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: ProvtrailConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, ProvtrailConfig::default());

        // Second run leaves the file alone.
        std::fs::write(&config_path, "[lineage]\nmax_depth = 3\n").unwrap();
        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, in_memory(), workspace).unwrap();
        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            "[lineage]\nmax_depth = 3\n"
        );
    }

    #[test]
    fn test_demo_renders_every_format() {
        for format in Format::ALL {
            let out = demo_output(in_memory(), 2, format, false).unwrap();
            assert!(out.contains("avg_pulse"), "{format}: {out}");
        }
        let flow = demo_output(in_memory(), 1, Format::MermaidFlow, false).unwrap();
        assert!(flow.starts_with("graph TD\n"));
    }

    #[test]
    fn test_demo_rejects_zero_rows() {
        assert!(demo_output(in_memory(), 0, Format::LogText, false).is_err());
    }

    #[test]
    fn test_load_then_trace_from_file() {
        let dir = TempDir::new().unwrap();
        let mut config = ProvtrailConfig::default();
        config.database.path = dir.path().join("prov.db");

        let catalog = dir.path().join("catalog.toml");
        std::fs::write(
            &catalog,
            r#"
[[definition]]
id = "pulse"
name = "pulse"
source = "stg"
source_variable = "pulse"
destination = "dwh"
destination_variable = "Pulse"

[definition.steward]
name = "Hr. Koch"
role = "Data Steward"

[[event]]
definition = "pulse"
source_reference = "1"
destination_reference = "10001"
quality = "good"
timestamp = "2022-05-12T08:30:00Z"
"#,
        )
        .unwrap();

        handle_load(&catalog, &config).unwrap();
        let out = trace_output(
            &config,
            &Coordinate::new("dwh", "Pulse", "10001"),
            Format::LogText,
            false,
        )
        .unwrap();
        assert_eq!(
            out,
            "stg.pulse.1 was converted by   to dwh.Pulse.10001 by Hr. Koch Data Steward\n"
        );

        let json = trace_output(&config, &Coordinate::new("dwh", "Pulse", "10001"), Format::LogText, true)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["target"]["store"], "dwh");
        assert_eq!(value["entries"].as_array().unwrap().len(), 1);

        handle_stats(&config, false).unwrap();
    }
}
