use crate::ui;
use anyhow::Result;
use exporter_config::parse_config_from_file;
use std::path::PathBuf;

pub async fn execute(config_file: PathBuf) -> Result<()> {
    ui::title("Validating Config");
    println!("File: {}", config_file.display());

    match parse_config_from_file(&config_file).await {
        Ok(config) => {
            println!();
            ui::verdict(true, "Config is valid!");

            if let Some(startup) = &config.startup {
                println!("\nStartup: {}", startup.command().description());
            }

            println!("\nScripts: {}", config.scripts.len());
            if config.scripts.is_empty() {
                ui::notice("Config has no scripts");
            }

            for (i, script) in config.scripts.iter().enumerate() {
                ui::script_entry(i + 1, script);
            }

            Ok(())
        }
        Err(e) => {
            println!();
            ui::verdict(false, "Config is invalid!");
            Err(e)
        }
    }
}
