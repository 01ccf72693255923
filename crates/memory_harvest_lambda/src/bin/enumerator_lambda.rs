use lambda_runtime::{service_fn, Error, LambdaEvent};
use memory_harvest_lambda::adapters::catalog::AwsFunctionCatalog;
use memory_harvest_lambda::adapters::queue::SqsQueue;
use memory_harvest_lambda::adapters::work_source::RegionalFunctionSource;
use memory_harvest_lambda::config::EnumeratorConfig;
use memory_harvest_lambda::handlers::enumerator::handle_enumerate_request;
use memory_harvest_lambda::logging::init_tracing;
use memory_harvest_lambda::runtime::contract::EnumerateRequest;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    let config = EnumeratorConfig::from_env()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let source = RegionalFunctionSource::new(AwsFunctionCatalog::new(&aws_config));
    let queue = SqsQueue::new(aws_sdk_sqs::Client::new(&aws_config), config.queue_url);
    let default_days = config.default_days;

    let (source, queue) = (&source, &queue);
    lambda_runtime::run(service_fn(
        move |event: LambdaEvent<EnumerateRequest>| async move {
            handle_enumerate_request(event.payload, default_days, source, queue)
                .await
                .map_err(Error::from)
        },
    ))
    .await
}
