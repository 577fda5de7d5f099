use devboard_pipeline::{config::Env, metrics::PrometheusClient, notify::WebhookSubscriber};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = Env::from_env()?;
    let webhook = env.webhook_url.clone().map(WebhookSubscriber::new);

    let subscriber = tracing_subscriber::registry()
        .with(webhook)
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus = PrometheusClient::default();

    tokio::select! {
        result = devboard_pipeline::run(&env) => {
            match result {
                Ok(report) => {
                    prometheus.record(&report);
                    info!(
                        "Ranked {} contributors over {} periods with {} errors",
                        report.contributors.len(),
                        report.periods.len(),
                        report.errors.len()
                    );
                }
                Err(e) => {
                    error!("Batch failed: {e:#}");
                    return Err(e);
                }
            }
        }
        _ = signal::ctrl_c() => {
            warn!("Received SIGINT. Exiting without writing output.");
        }
    }

    if let Some(path) = &env.metrics_file {
        prometheus.write_to(path)?;
    }

    Ok(())
}
