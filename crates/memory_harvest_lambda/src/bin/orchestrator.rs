//! Drives the enumerate/decide loop against the deployed enumerator function
//! and prints the run summary as JSON.

use memory_harvest_lambda::adapters::invoke::AwsLambdaEnumeratorInvoker;
use memory_harvest_lambda::config::OrchestratorConfig;
use memory_harvest_lambda::handlers::orchestrator::run_orchestration;
use memory_harvest_lambda::logging::init_tracing;
use memory_harvest_lambda::runtime::contract::EnumerateRequest;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();
    let config = OrchestratorConfig::from_env()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let invoker = AwsLambdaEnumeratorInvoker::new(
        aws_sdk_lambda::Client::new(&aws_config),
        config.enumerator_function,
    );

    let parameters = EnumerateRequest {
        next_token: None,
        regions: config.regions,
        days: config.days,
    };
    let summary = run_orchestration(&invoker, parameters, config.timeout).await?;

    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
