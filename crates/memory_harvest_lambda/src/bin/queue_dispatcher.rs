//! Long-running worker pool fed directly from the work queue. Stops taking
//! new messages on Ctrl-C and exits once in-flight units have settled.

use std::sync::Arc;

use memory_harvest_lambda::adapters::log_query::CloudWatchLogInsights;
use memory_harvest_lambda::adapters::queue::SqsQueue;
use memory_harvest_lambda::adapters::record_sink::ConfiguredSink;
use memory_harvest_lambda::config::DispatcherConfig;
use memory_harvest_lambda::handlers::dispatcher::Dispatcher;
use memory_harvest_lambda::handlers::worker::WorkerSettings;
use memory_harvest_lambda::logging::init_tracing;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();
    let config = DispatcherConfig::from_env()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let queue = SqsQueue::new(aws_sdk_sqs::Client::new(&aws_config), config.queue_url)
        .with_visibility_timeout(config.visibility_timeout);
    let dispatcher = Dispatcher::new(
        Arc::new(queue),
        Arc::new(CloudWatchLogInsights::new(&aws_config)),
        Arc::new(ConfiguredSink::from_config(&config.worker.sink, &aws_config)),
        WorkerSettings::from(&config.worker),
        config.concurrency,
    );

    dispatcher
        .run_until(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(event = "signal_listener_failed", error = %error);
            }
        })
        .await;
    Ok(())
}
