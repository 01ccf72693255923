mod support;

use std::sync::Arc;
use std::time::Duration;

use memory_harvest_lambda::adapters::memory_queue::InMemoryQueue;
use memory_harvest_lambda::adapters::work_source::RegionalFunctionSource;
use memory_harvest_lambda::handlers::dispatcher::{DispatchStats, Dispatcher};
use memory_harvest_lambda::handlers::enumerator::InProcessEnumerator;
use memory_harvest_lambda::handlers::orchestrator::{run_orchestration, OrchestrationSummary};
use memory_harvest_lambda::handlers::worker::WorkerSettings;
use memory_harvest_lambda::runtime::contract::{decode_message, EnumerateRequest};
use support::fakes::{CollectingSink, PagedCatalog, SwitchableInsights};

fn settings() -> WorkerSettings {
    WorkerSettings {
        query_timeout: Duration::from_secs(150),
        poll_interval: Duration::from_secs(5),
    }
}

#[tokio::test(start_paused = true)]
async fn two_page_account_is_enumerated_and_harvested() {
    let queue = Arc::new(InMemoryQueue::new(Duration::from_secs(180), 5));
    let catalog = PagedCatalog::new(&[("eu-west-1", vec![vec!["A", "B"], vec!["C"]])]);
    let enumerator = InProcessEnumerator::new(
        RegionalFunctionSource::new(catalog),
        Arc::clone(&queue),
        30,
    );

    let summary = run_orchestration(
        &enumerator,
        EnumerateRequest::default(),
        Duration::from_secs(3600),
    )
    .await
    .expect("orchestration should finish");

    assert_eq!(
        summary,
        OrchestrationSummary {
            invocations: 2,
            items_enqueued: 3,
        }
    );
    let mut queued: Vec<String> = queue
        .pending_bodies()
        .iter()
        .map(|body| decode_message(body).expect("queued body decodes").function_name)
        .collect();
    queued.sort();
    assert_eq!(queued, vec!["A", "B", "C"]);

    let sink = Arc::new(CollectingSink::default());
    let dispatcher = Dispatcher::new(
        Arc::clone(&queue),
        Arc::new(SwitchableInsights::healthy()),
        Arc::clone(&sink),
        settings(),
        10,
    );
    let stats = dispatcher.run_once().await.expect("batch should run");

    assert_eq!(
        stats,
        DispatchStats {
            received: 3,
            emitted: 3,
            skipped: 0,
            failed: 0,
        }
    );
    assert_eq!(sink.function_names(), vec!["A", "B", "C"]);
    assert!(queue.pending_bodies().is_empty());

    for record in sink.records() {
        assert_eq!(record.log_group_name, format!("/aws/lambda/{}", record.function_name));
        assert_eq!(record.over_provisioned_memory_mb, 1024 - 300);
    }
}

#[tokio::test(start_paused = true)]
async fn explicit_regions_are_walked_in_the_given_order() {
    let queue = Arc::new(InMemoryQueue::new(Duration::from_secs(180), 5));
    let catalog = PagedCatalog::new(&[
        ("us-east-1", vec![vec!["east"]]),
        ("ap-south-1", vec![vec!["south-1", "south-2"]]),
    ]);
    let enumerator = InProcessEnumerator::new(
        RegionalFunctionSource::new(catalog),
        Arc::clone(&queue),
        30,
    );

    let summary = run_orchestration(
        &enumerator,
        EnumerateRequest {
            next_token: None,
            regions: Some("us-east-1,ap-south-1".to_string()),
            days: Some(14),
        },
        Duration::from_secs(3600),
    )
    .await
    .expect("orchestration should finish");

    assert_eq!(summary.invocations, 2);
    let units: Vec<_> = queue
        .pending_bodies()
        .iter()
        .map(|body| decode_message(body).expect("queued body decodes"))
        .collect();
    assert_eq!(
        units
            .iter()
            .map(|unit| unit.region.as_str())
            .collect::<Vec<_>>(),
        vec!["us-east-1", "ap-south-1", "ap-south-1"]
    );
    assert!(units.iter().all(|unit| unit.days == 14));
}
