use anyhow::{Context, Result};
use placetmachine::{
    cli::config_path_from_args, config::Config, logging::init_tracing, machine,
};

fn main() -> Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let logging_guard = init_tracing(&config.logging)?;

    // Knobs share elements through Rc handles, so everything runs on one thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let report = runtime.block_on(machine::run(config))?;

    tracing::info!(
        target: "placetmachine",
        run_id = %logging_guard.run_id(),
        corrections = report.corrections.len(),
        scans = report.scans.len(),
        "run_completed"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to serialize run results")?
    );
    Ok(())
}
