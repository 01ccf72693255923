use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_account::types::RegionOptStatus;

use crate::adapters::AdapterError;
use crate::runtime::contract::Architecture;

/// Page size requested from the function listing API.
pub const FUNCTION_PAGE_SIZE: i32 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSummary {
    pub function_name: String,
    pub log_group_name: Option<String>,
    pub architecture: Architecture,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionListing {
    pub functions: Vec<FunctionSummary>,
    pub next_marker: Option<String>,
}

/// Read-only view of the account's regions and deployed functions.
#[async_trait]
pub trait FunctionCatalog: Send + Sync {
    async fn enabled_regions(&self) -> Result<Vec<String>, AdapterError>;

    async fn list_functions(
        &self,
        region: &str,
        marker: Option<&str>,
    ) -> Result<FunctionListing, AdapterError>;
}

pub struct AwsFunctionCatalog {
    sdk_config: SdkConfig,
    account_client: aws_sdk_account::Client,
}

impl AwsFunctionCatalog {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
            account_client: aws_sdk_account::Client::new(sdk_config),
        }
    }

    fn lambda_client(&self, region: &str) -> aws_sdk_lambda::Client {
        let config = aws_sdk_lambda::config::Builder::from(&self.sdk_config)
            .region(aws_sdk_lambda::config::Region::new(region.to_string()))
            .build();
        aws_sdk_lambda::Client::from_conf(config)
    }
}

#[async_trait]
impl FunctionCatalog for AwsFunctionCatalog {
    async fn enabled_regions(&self) -> Result<Vec<String>, AdapterError> {
        let mut regions = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .account_client
                .list_regions()
                .max_results(50)
                .region_opt_status_contains(RegionOptStatus::Enabled)
                .region_opt_status_contains(RegionOptStatus::EnabledByDefault)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|error| AdapterError::new(format!("failed to list regions: {error}")))?;

            regions.extend(
                response
                    .regions()
                    .iter()
                    .filter_map(|region| region.region_name().map(str::to_string)),
            );

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(regions)
    }

    async fn list_functions(
        &self,
        region: &str,
        marker: Option<&str>,
    ) -> Result<FunctionListing, AdapterError> {
        let response = self
            .lambda_client(region)
            .list_functions()
            .max_items(FUNCTION_PAGE_SIZE)
            .set_marker(marker.map(str::to_string))
            .send()
            .await
            .map_err(|error| {
                AdapterError::new(format!("failed to list functions in {region}: {error}"))
            })?;

        let functions = response
            .functions()
            .iter()
            .filter_map(|function| {
                let function_name = function.function_name()?.to_string();
                let log_group_name = function
                    .logging_config()
                    .and_then(|logging| logging.log_group())
                    .map(str::to_string);
                // The platform default when no architecture is reported.
                let architecture = match function.architectures().first() {
                    Some(aws_sdk_lambda::types::Architecture::Arm64) => Architecture::Arm64,
                    _ => Architecture::X86_64,
                };
                Some(FunctionSummary {
                    function_name,
                    log_group_name,
                    architecture,
                })
            })
            .collect();

        Ok(FunctionListing {
            functions,
            next_marker: response.next_marker().map(str::to_string),
        })
    }
}
