//! audience-probe - simulate one homepage load through the audience selector
//!
//! Feeds a URL and referrer into the selector, optionally performs a manual
//! selection, and prints every component, analytics and page event as a
//! JSON line on stdout. With `--storage` the session survives between runs,
//! the way browser session storage survives a reload.

use alumnet_audience::controller::{AudienceSelectorController, SelectorConfig};
use alumnet_audience::notify::{AnalyticsEvent, AnalyticsSink, ComponentEvent};
use alumnet_audience::signals::StaticEnvironment;
use alumnet_audience::storage::{FileStorage, MemoryStorage, Storage};
use alumnet_audience::{AnalyticsError, AudienceType};
use alumnet_common::config::{load_config, CONFIG_ENV_VAR};
use alumnet_common::events::{EventBus, PageEvent};
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "audience-probe",
    version,
    about = "Resolve the homepage audience for a simulated page load"
)]
struct Args {
    /// Page URL, e.g. "https://alumnet.example/?audience=institutional"
    #[arg(long)]
    url: Option<String>,

    /// Document referrer
    #[arg(long)]
    referrer: Option<String>,

    /// Audience shown before detection (overrides config)
    #[arg(long, value_name = "AUDIENCE")]
    default: Option<AudienceType>,

    /// Skip auto-detection on mount
    #[arg(long)]
    no_auto_detect: bool,

    /// Omit option descriptions from the summary
    #[arg(long)]
    hide_description: bool,

    /// Simulate a click on this audience after mount
    #[arg(long, value_name = "AUDIENCE")]
    select: Option<AudienceType>,

    /// JSON file backing session storage (in-memory when omitted)
    #[arg(long, value_name = "PATH")]
    storage: Option<PathBuf>,

    /// Detection delay in milliseconds (overrides config)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Config file path
    #[arg(long, value_name = "PATH", env = "ALUMNET_CONFIG")]
    config: Option<PathBuf>,
}

/// Prints analytics events as JSON lines
struct StdoutAnalytics;

impl AnalyticsSink for StdoutAnalytics {
    fn track(&self, event_name: &str, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        println!("{}", json!({ "channel": "analytics", "name": event_name, "payload": event }));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config =
        load_config(args.config.as_deref(), CONFIG_ENV_VAR).context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting audience-probe v{}", env!("CARGO_PKG_VERSION"));

    let mut selector_config = SelectorConfig::from(&config.selector);
    if let Some(default) = args.default {
        selector_config.default_audience = default;
    }
    if args.no_auto_detect {
        selector_config.auto_detect = false;
    }
    if args.hide_description {
        selector_config.show_description = false;
    }
    if let Some(delay_ms) = args.delay_ms {
        selector_config.detection_delay = alumnet_common::time::millis_to_duration(delay_ms);
    }

    let storage: Arc<dyn Storage> = match &args.storage {
        Some(path) => {
            info!("Session storage: {}", path.display());
            Arc::new(FileStorage::new(path))
        }
        None => Arc::new(MemoryStorage::new()),
    };

    let environment = StaticEnvironment::new(args.url.clone(), args.referrer.clone());
    let controller = Arc::new(
        AudienceSelectorController::new(
            selector_config,
            Arc::new(environment),
            storage,
            EventBus::default(),
        )
        .with_analytics(Arc::new(StdoutAnalytics)),
    );

    let component_rx = controller.subscribe_component_events();
    let page_rx = controller.page_events().subscribe();

    if let Some(handle) = controller.mount() {
        if let Err(e) = handle.await {
            warn!("Audience detection task failed: {}", e);
        }
    }

    if let Some(audience) = args.select {
        controller.select(audience);
    }

    print_component_events(component_rx);
    print_page_events(page_rx);

    let options: Vec<_> = controller
        .options()
        .into_iter()
        .map(|o| {
            json!({
                "audience": o.audience,
                "label": o.label,
                "description": o.description,
                "selected": o.selected,
            })
        })
        .collect();
    println!(
        "{}",
        json!({
            "channel": "summary",
            "audience": controller.current_audience(),
            "phase": format!("{:?}", controller.phase()),
            "options": options,
        })
    );

    Ok(())
}

fn print_component_events(mut rx: broadcast::Receiver<ComponentEvent>) {
    while let Ok(event) = rx.try_recv() {
        println!("{}", json!({ "channel": "component", "event": event }));
    }
}

fn print_page_events(mut rx: broadcast::Receiver<PageEvent>) {
    while let Ok(event) = rx.try_recv() {
        println!("{}", json!({ "channel": "page", "event": event }));
    }
}
