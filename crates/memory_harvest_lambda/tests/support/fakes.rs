#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use memory_harvest_lambda::adapters::catalog::{FunctionCatalog, FunctionListing, FunctionSummary};
use memory_harvest_lambda::adapters::log_query::{
    LogInsights, LogQueryError, QueryResults, QueryStatus, QueryWindow,
};
use memory_harvest_lambda::adapters::record_sink::RecordSink;
use memory_harvest_lambda::adapters::AdapterError;
use memory_harvest_lambda::runtime::contract::{Architecture, WorkUnit};
use memory_harvest_lambda::runtime::metrics::MetricRecord;

/// Account whose regions hold fixed pages of function names. Listing markers
/// are page indexes.
pub struct PagedCatalog {
    regions: Vec<String>,
    pages: HashMap<String, Vec<Vec<String>>>,
}

impl PagedCatalog {
    pub fn new(pages: &[(&str, Vec<Vec<&str>>)]) -> Self {
        Self {
            regions: pages.iter().map(|(region, _)| region.to_string()).collect(),
            pages: pages
                .iter()
                .map(|(region, region_pages)| {
                    (
                        region.to_string(),
                        region_pages
                            .iter()
                            .map(|names| names.iter().map(|name| name.to_string()).collect())
                            .collect(),
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl FunctionCatalog for PagedCatalog {
    async fn enabled_regions(&self) -> Result<Vec<String>, AdapterError> {
        Ok(self.regions.clone())
    }

    async fn list_functions(
        &self,
        region: &str,
        marker: Option<&str>,
    ) -> Result<FunctionListing, AdapterError> {
        let pages = self.pages.get(region).cloned().unwrap_or_default();
        let index = match marker {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| AdapterError::new(format!("invalid marker '{raw}'")))?,
            None => 0,
        };
        Ok(FunctionListing {
            functions: pages
                .get(index)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|function_name| FunctionSummary {
                    function_name,
                    log_group_name: None,
                    architecture: Architecture::X86_64,
                })
                .collect(),
            next_marker: (index + 1 < pages.len()).then(|| (index + 1).to_string()),
        })
    }
}

/// Answers every query with the same statistics row, or keeps every query
/// `Running` while stalled.
pub struct SwitchableInsights {
    stalled: AtomicBool,
    started: Mutex<Vec<String>>,
}

impl SwitchableInsights {
    pub fn healthy() -> Self {
        Self {
            stalled: AtomicBool::new(false),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn stalled() -> Self {
        let insights = Self::healthy();
        insights.stalled.store(true, Ordering::SeqCst);
        insights
    }

    pub fn recover(&self) {
        self.stalled.store(false, Ordering::SeqCst);
    }

    pub fn started_log_groups(&self) -> Vec<String> {
        self.started.lock().expect("poisoned mutex").clone()
    }
}

#[async_trait]
impl LogInsights for SwitchableInsights {
    async fn start_query(
        &self,
        _region: &str,
        log_group_name: &str,
        _query: &str,
        _window: QueryWindow,
    ) -> Result<String, LogQueryError> {
        self.started
            .lock()
            .expect("poisoned mutex")
            .push(log_group_name.to_string());
        Ok(format!("query-for-{log_group_name}"))
    }

    async fn query_results(
        &self,
        _region: &str,
        _query_id: &str,
    ) -> Result<QueryResults, LogQueryError> {
        if self.stalled.load(Ordering::SeqCst) {
            return Ok(QueryResults {
                status: QueryStatus::Running,
                rows: Vec::new(),
            });
        }
        Ok(QueryResults {
            status: QueryStatus::Complete,
            rows: vec![[
                ("provisioned_memory_mb", "1024"),
                ("min_memory_used_mb", "180"),
                ("avg_memory_used_mb", "240.5"),
                ("max_memory_used_mb", "300"),
                ("avg_billed_duration_ms", "120"),
                ("invocations", "900"),
            ]
            .into_iter()
            .map(|(field, value)| (field.to_string(), value.to_string()))
            .collect()],
        })
    }
}

#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<(WorkUnit, MetricRecord)>>,
}

impl CollectingSink {
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .lock()
            .expect("poisoned mutex")
            .iter()
            .map(|(unit, _)| unit.function_name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn records(&self) -> Vec<MetricRecord> {
        self.records
            .lock()
            .expect("poisoned mutex")
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }
}

#[async_trait]
impl RecordSink for CollectingSink {
    async fn emit(&self, unit: &WorkUnit, record: &MetricRecord) -> Result<(), AdapterError> {
        self.records
            .lock()
            .expect("poisoned mutex")
            .push((unit.clone(), record.clone()));
        Ok(())
    }
}
