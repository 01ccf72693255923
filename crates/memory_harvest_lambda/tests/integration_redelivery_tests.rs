mod support;

use std::sync::Arc;
use std::time::Duration;

use memory_harvest_lambda::adapters::memory_queue::InMemoryQueue;
use memory_harvest_lambda::adapters::queue::WorkQueue;
use memory_harvest_lambda::handlers::dispatcher::Dispatcher;
use memory_harvest_lambda::handlers::worker::WorkerSettings;
use memory_harvest_lambda::runtime::contract::{encode_message, Architecture, WorkUnit};
use support::fakes::{CollectingSink, SwitchableInsights};

const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(180);

fn unit() -> WorkUnit {
    WorkUnit {
        function_name: "nightly-report".to_string(),
        log_group_name: "/aws/lambda/nightly-report".to_string(),
        architecture: Architecture::Arm64,
        region: "eu-central-1".to_string(),
        days: 30,
    }
}

fn settings() -> WorkerSettings {
    WorkerSettings {
        query_timeout: Duration::from_secs(150),
        poll_interval: Duration::from_secs(5),
    }
}

#[tokio::test(start_paused = true)]
async fn timed_out_query_leaves_message_for_redelivery() {
    let queue = Arc::new(InMemoryQueue::new(VISIBILITY_TIMEOUT, 5));
    queue
        .push(encode_message(&unit()).expect("unit encodes"))
        .await
        .expect("push succeeds");

    let insights = Arc::new(SwitchableInsights::stalled());
    let sink = Arc::new(CollectingSink::default());
    let dispatcher = Dispatcher::new(
        Arc::clone(&queue),
        Arc::clone(&insights),
        Arc::clone(&sink),
        settings(),
        10,
    );

    let first = dispatcher.run_once().await.expect("batch should run");
    assert_eq!(first.received, 1);
    assert_eq!(first.failed, 1);
    assert!(sink.records().is_empty());
    assert_eq!(queue.pending_bodies().len(), 1);

    // Still inside the visibility window: nothing to receive.
    assert_eq!(dispatcher.run_once().await.expect("batch should run").received, 0);

    insights.recover();
    tokio::time::advance(VISIBILITY_TIMEOUT).await;

    let second = dispatcher.run_once().await.expect("batch should run");
    assert_eq!(second.received, 1);
    assert_eq!(second.emitted, 1);
    assert_eq!(insights.started_log_groups().len(), 2);
    assert_eq!(sink.function_names(), vec!["nightly-report"]);
    assert!(queue.pending_bodies().is_empty());
}

#[tokio::test(start_paused = true)]
async fn message_that_keeps_failing_ends_in_dead_letters() {
    let queue = Arc::new(InMemoryQueue::new(VISIBILITY_TIMEOUT, 2));
    let body = encode_message(&unit()).expect("unit encodes");
    queue.push(body.clone()).await.expect("push succeeds");

    let dispatcher = Dispatcher::new(
        Arc::clone(&queue),
        Arc::new(SwitchableInsights::stalled()),
        Arc::new(CollectingSink::default()),
        settings(),
        10,
    );

    for _ in 0..2 {
        assert_eq!(dispatcher.run_once().await.expect("batch should run").failed, 1);
        tokio::time::advance(VISIBILITY_TIMEOUT).await;
    }

    assert_eq!(dispatcher.run_once().await.expect("batch should run").received, 0);
    assert_eq!(queue.dead_letters(), vec![body]);
}
