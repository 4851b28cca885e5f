use fxlens::config::{Config, FeedKind};
use fxlens::services::{AnalysisSession, TickHub};
use fxlens::sources::{AlphaVantageClient, FinnhubWs, PollingTransport, RemoteForecaster, RuleReasoner};
use fxlens::types::PriceUpdate;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fxlens=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Starting fxlens for {} on {} ({:?} feed)",
        config.pairs.join(", "),
        config.timeframe,
        config.feed
    );

    let alpha_vantage = config.alpha_vantage_api_key.as_ref().map(|api_key| {
        info!("Alpha Vantage API key found, enabling bars and quotes");
        Arc::new(AlphaVantageClient::new(api_key.clone()))
    });

    match &alpha_vantage {
        Some(bars) => {
            let reasoner = Arc::new(RuleReasoner::new());
            let session = match &config.forecast_url {
                Some(url) => AnalysisSession::new(
                    bars.clone(),
                    Arc::new(RemoteForecaster::new(
                        url.clone(),
                        config.forecast_api_key.clone(),
                        config.indicators.clone(),
                    )),
                    reasoner,
                    config.indicators.clone(),
                ),
                None => {
                    warn!("FORECAST_URL not set, skipping predictions");
                    AnalysisSession::without_forecaster(
                        bars.clone(),
                        reasoner,
                        config.indicators.clone(),
                    )
                }
            };
            analyze(&session, &config).await;
        }
        None => warn!("ALPHA_VANTAGE_API_KEY not set, skipping analysis"),
    }

    let hub = TickHub::with_fixed_delay(config.reconnect_delay());
    for pair in &config.pairs {
        hub.watch(pair);
    }
    hub.subscribe(Arc::new(|update: &PriceUpdate| -> anyhow::Result<()> {
        info!(
            "{} {:.5} ({:+.5}, {:+.3}%)",
            update.symbol, update.price, update.change, update.change_percent
        );
        Ok(())
    }));

    let task = match start_feed(&hub, &config, alpha_vantage) {
        Some(task) => task,
        None => {
            warn!("No live feed configured, exiting");
            return Ok(());
        }
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    hub.disconnect();
    task.await??;

    Ok(())
}

/// Log a prediction and an advice record for every configured pair.
async fn analyze(session: &AnalysisSession, config: &Config) {
    for pair in &config.pairs {
        if config.forecast_url.is_some() {
            if let Err(e) = session.predict(pair, config.timeframe).await {
                warn!("Prediction for {} failed: {}", pair, e);
            }
        }
        match session.advise(pair, config.timeframe).await {
            Ok(advice) => info!("{} advice: {}", pair, advice.reasoning),
            Err(e) => warn!("Advice for {} failed: {}", pair, e),
        }
    }
}

/// Spawn the hub on the configured transport.
fn start_feed(
    hub: &Arc<TickHub>,
    config: &Config,
    alpha_vantage: Option<Arc<AlphaVantageClient>>,
) -> Option<JoinHandle<fxlens::Result<()>>> {
    if config.feed == FeedKind::Streaming {
        if let Some(api_key) = &config.finnhub_api_key {
            info!("Starting Finnhub WebSocket feed");
            return Some(hub.spawn(FinnhubWs::new(api_key.clone())));
        }
        warn!("Streaming feed requested without FINNHUB_API_KEY, falling back to polling");
    }

    let quotes = alpha_vantage?;
    info!("Polling Alpha Vantage quotes every {:?}", config.poll_interval());
    Some(hub.spawn(PollingTransport::with_interval(quotes, config.poll_interval())))
}
