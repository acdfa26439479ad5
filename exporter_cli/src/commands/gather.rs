use crate::ui;
use anyhow::Result;
use exporter_config::parse_config_from_file;
use exporter_core::run_startup;
use exporter_metrics::Aggregator;
use std::path::PathBuf;
use tracing::info;

pub async fn execute(config_file: PathBuf, json: bool, with_startup: bool) -> Result<()> {
    let config = parse_config_from_file(&config_file).await?;

    if with_startup {
        if let Some(startup) = &config.startup {
            info!("Running startup script: {}", startup.command().description());
            run_startup(startup).await?;
        }
    }

    let (snapshot, errors) = Aggregator::with_defaults()
        .gather_all(&config.scripts)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", snapshot.encode());
    }

    ui::gather_errors(&errors);

    Ok(())
}
