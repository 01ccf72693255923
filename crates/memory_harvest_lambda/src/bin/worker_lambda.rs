use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use memory_harvest_lambda::adapters::log_query::CloudWatchLogInsights;
use memory_harvest_lambda::adapters::record_sink::ConfiguredSink;
use memory_harvest_lambda::config::WorkerConfig;
use memory_harvest_lambda::handlers::worker::{handle_worker_event, WorkerSettings};
use memory_harvest_lambda::logging::init_tracing;
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    let config = WorkerConfig::from_env()?;
    let settings = WorkerSettings::from(&config);

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let insights = CloudWatchLogInsights::new(&aws_config);
    let sink = ConfiguredSink::from_config(&config.sink, &aws_config);

    let (insights, sink) = (&insights, &sink);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        let outcomes = handle_worker_event(&event.payload, settings, insights, sink, Utc::now())
            .await
            .map_err(Error::from)?;
        Ok::<Value, Error>(json!({
            "status": "ok",
            "outcomes": outcomes.iter().map(|outcome| outcome.as_str()).collect::<Vec<_>>(),
        }))
    }))
    .await
}
