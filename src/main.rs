use anyhow::{Context, Result};
use censoscraper::{Config, HttpTransport, Pipeline, Summary};
use std::{env, fs, path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("CENSO_CONFIG").ok())
        .map(PathBuf::from);
    let cfg = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    info!(?config_path, retries = cfg.max_retries, "config loaded");

    // ─── 3) configure dirs ───────────────────────────────────────────
    for d in cfg.dirs() {
        fs::create_dir_all(d).with_context(|| format!("creating {}", d.display()))?;
    }

    // ─── 4) run pipelines ────────────────────────────────────────────
    let urls = cfg.urls();
    println!(
        "Downloading and extracting {} archive(s), years {}-{}",
        urls.len(),
        cfg.first_year,
        cfg.last_year
    );

    let transport = Arc::new(HttpTransport::new(cfg.timeout())?);
    let pipeline = Arc::new(Pipeline::from_config(&cfg, transport));
    info!(workers = pipeline.workers(), "dispatching");
    let results = pipeline.run_all(urls, |r| println!("{}", r)).await;

    // ─── 5) summary ──────────────────────────────────────────────────
    let summary = Summary::from_results(&results);
    println!("\n{}", summary);
    info!(failed = summary.failed(), "all done");
    Ok(())
}
