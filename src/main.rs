use estatedesk::config::Config;
use estatedesk::infrastructure::observability;
use estatedesk::infrastructure::realtime::LocalRealtimeHub;
use estatedesk::infrastructure::toast::TracingToaster;
use estatedesk::shared::resilience::CircuitBreakerRegistry;
use estatedesk::{NotificationCenter, SessionContext};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing and metrics
    let _guard = observability::init(&config).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tracing::info!("Configuration loaded for {}", config.service_name);
    tracing::debug!("Default retry options: {:?}", config.retry_options());

    let breakers = CircuitBreakerRegistry::new(
        config.breaker_failure_threshold,
        config.breaker_reset_timeout(),
    );
    for dependency in [&config.realtime.maintenance_table, &config.realtime.payments_table] {
        let breaker = breakers.breaker(dependency).await;
        tracing::info!("Circuit breaker ready for {} ({})", breaker.name(), breaker.state());
    }

    let hub = LocalRealtimeHub::default();
    let mut center = NotificationCenter::mount(
        &hub,
        Arc::new(TracingToaster::new()),
        SessionContext::new(format!("{}-local", config.service_name)),
        config.realtime.clone(),
    );

    tracing::info!("Listening for realtime changes, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    center.unmount();
    tracing::info!(
        "Shutting down with {} notifications ({} unread)",
        center.notifications().len(),
        center.unread_count()
    );

    Ok(())
}
