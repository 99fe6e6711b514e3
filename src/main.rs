use anyhow::{Context, Result};
use axum::middleware;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};
use tokio::time::MissedTickBehavior;
use tower_http::trace::TraceLayer;
use tracing::{Level, error, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use stableguard_oracle::{
    alerts::{BreachAlertDispatcher, HttpWebhookSender},
    api::{
        AppState, GuardSettings, GuardState, HttpSecurityConfig, SecureHttpClient, create_router,
        middleware::{
            auth_middleware, body_size_middleware, logging_middleware, rate_limit_middleware,
            security_headers_middleware,
        },
    },
    attestation::{EnvSecretStore, GeminiGenerator},
    config::{GuardConfig, log_config_warnings, sanitize_for_logging},
    context::Capabilities,
    crypto::ReportSigner,
    ledger::{HttpLedgerClient, LedgerClient, LedgerEndpoint, SimulatedLedger},
    report::LedgerLog,
    reserve::HttpReserveFetcher,
    workflows::{
        CycleGate, CycleStatus, handle_report_event, run_health_check, run_regulatory_parser,
        run_safeguard,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates all security requirements
    let config = GuardConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check STABLEGUARD_* environment variables and the config file.");
        e
    })?;

    init_secure_logging(&config)?;

    info!("Starting StableGuard Compliance Oracle");
    info!(
        "Tracking {} stablecoins: {}",
        config.stablecoins.len(),
        config.stablecoin_symbols().join(", ")
    );
    log_config_warnings(&config);

    let signer = Arc::new(match &config.signing.seed_hex {
        Some(seed) => ReportSigner::from_hex_seed(seed).context("Invalid signing seed")?,
        None => ReportSigner::generate(),
    });
    info!("Report signing key: {}", signer.public_key_hex());

    // Ledger: in-process simulation feeds its own event stream, the relay
    // delivers events through POST /events/report-updated
    let (ledger, ledger_events): (Arc<dyn LedgerClient>, Option<broadcast::Receiver<LedgerLog>>) =
        if config.ledger.simulate {
            let simulated = Arc::new(SimulatedLedger::default());
            let events = simulated.subscribe();
            (simulated as Arc<dyn LedgerClient>, Some(events))
        } else {
            info!(
                "Ledger relay: {}",
                sanitize_for_logging(&config.ledger.rpc_url)
            );
            let client = HttpLedgerClient::new(
                http_client(&config, config.ledger.timeout_secs)?,
                LedgerEndpoint {
                    rpc_url: config.ledger.rpc_url.clone(),
                    oracle_address: config.ledger.oracle_address.clone(),
                    safeguard_address: config.ledger.safeguard_address.clone(),
                    gas_limit: config.ledger.gas_limit,
                },
            );
            (Arc::new(client) as Arc<dyn LedgerClient>, None)
        };

    let caps = Capabilities {
        fetcher: Arc::new(HttpReserveFetcher::new(http_client(&config, 30)?)),
        ledger,
        generator: Arc::new(GeminiGenerator::new(
            http_client(&config, config.generator.timeout_secs)?,
            config.generator.base_url.clone(),
            config.generator.model.clone(),
        )),
        webhook: Arc::new(HttpWebhookSender::new(
            http_client(&config, config.webhook.timeout_secs)?,
            config.webhook.url.clone(),
        )),
        secrets: Arc::new(EnvSecretStore),
        signer,
        settings: Arc::new(config.pipeline_settings()),
        cycle_gate: Arc::new(CycleGate::new()),
    };
    let dispatcher = Arc::new(RwLock::new(BreachAlertDispatcher::default()));

    if let Some(events) = ledger_events {
        tokio::spawn(listen_for_reports(caps.clone(), dispatcher.clone(), events));
    }

    // Scheduled triggers
    let schedule = &config.schedule;
    spawn_schedule("health_check", schedule.health_check_interval_secs, {
        let caps = caps.clone();
        move || {
            let caps = caps.clone();
            async move {
                let summary = run_health_check(&caps.invocation_now()).await;
                match summary.status {
                    CycleStatus::Completed => info!("Health check complete: {}", summary.summary),
                    CycleStatus::AlreadyRunning => warn!("Health check skipped: {}", summary.summary),
                }
            }
        }
    });
    spawn_schedule("safeguard", schedule.safeguard_interval_secs, {
        let caps = caps.clone();
        move || {
            let caps = caps.clone();
            async move {
                let status = run_safeguard(&caps.invocation_now()).await;
                info!("Safeguard trigger: {}", status);
            }
        }
    });
    spawn_schedule("regulatory", schedule.regulatory_interval_secs, {
        let caps = caps.clone();
        move || {
            let caps = caps.clone();
            async move {
                let status = run_regulatory_parser(&caps.invocation_now()).await;
                info!("Regulatory parser: {}", status);
            }
        }
    });

    // Request guards
    let guard_state = GuardState::new(GuardSettings::from_config(&config));
    {
        let limiter = guard_state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(300));
            loop {
                ticker.tick().await;
                limiter.prune();
            }
        });
    }

    // Apply guard layers (outermost last)
    let app = create_router(AppState::new(caps, dispatcher))
        .layer(middleware::from_fn_with_state(
            guard_state.clone(),
            body_size_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            guard_state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            guard_state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            guard_state.clone(),
            logging_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("StableGuard oracle listening on {}", bind_addr);
    info!(
        "Request guards: Auth={}, Rate limit={}/min, Max body={}KB",
        config.security.enable_auth,
        config.security.rate_limit_per_minute,
        config.security.max_request_size / 1024
    );

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("StableGuard oracle stopped");
    Ok(())
}

/// Initialize logging from configuration
fn init_secure_logging(config: &GuardConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Secure logging initialized with data sanitization enabled");
    }

    Ok(())
}

/// Outbound client with the shared security settings and a per-use timeout
fn http_client(config: &GuardConfig, timeout_secs: u64) -> Result<SecureHttpClient> {
    SecureHttpClient::new(HttpSecurityConfig {
        require_https: config.security.require_https,
        timeout_secs,
        max_response_size: config.security.max_response_size,
        allowed_domains: config.security.allowed_domains.clone(),
    })
    .context("Failed to create secure HTTP client")
}

/// Run `job` every `interval_secs`; 0 disables it. Overlapping ticks are
/// skipped rather than queued.
fn spawn_schedule<F, Fut>(name: &'static str, interval_secs: u64, job: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    if interval_secs == 0 {
        info!("Trigger {} disabled", name);
        return;
    }
    info!("Trigger {} every {}s", name, interval_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            job().await;
        }
    });
}

/// Feed ledger events to the report listener, one invocation per event
async fn listen_for_reports(
    caps: Capabilities,
    dispatcher: Arc<RwLock<BreachAlertDispatcher>>,
    mut events: broadcast::Receiver<LedgerLog>,
) {
    info!("Listening for ReportUpdated events");
    loop {
        match events.recv().await {
            Ok(log) => {
                let ctx = caps.invocation_now();
                if let Err(e) = handle_report_event(&ctx, &dispatcher, &log).await {
                    error!("Report event {} failed: {}", log.tx_hash, e);
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Report listener lagged, {} events dropped", missed);
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("Ledger event stream closed");
                break;
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
