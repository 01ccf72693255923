use serde::{Deserialize, Serialize};

pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;
pub const MAX_LOOKBACK_DAYS: u32 = 365;

/// Instruction set a function is deployed on. Determines the GB-second price
/// used for savings estimates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Architecture {
    #[default]
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64")]
    Arm64,
}

impl Architecture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One monitorable function in one region. This is also the body of every
/// queued message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WorkUnit {
    pub function_name: String,
    pub log_group_name: String,
    pub architecture: Architecture,
    pub region: String,
    pub days: u32,
}

/// Result of one call to the work-unit source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<WorkUnit>,
    pub next_token: Option<String>,
}

/// Enumerator input. The orchestrator feeds the previous output back in, so
/// `regions` and `days` are echoed by [`EnumerateResponse`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnumerateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnumerateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    pub items: Vec<WorkUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<String>,
    pub days: u32,
}

impl EnumerateResponse {
    /// Input for the follow-up enumerator invocation, if one is needed.
    pub fn continuation(&self) -> Option<EnumerateRequest> {
        self.next_token.as_ref().map(|token| EnumerateRequest {
            next_token: Some(token.clone()),
            regions: self.regions.clone(),
            days: Some(self.days),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEnumerateRequest {
    pub next_token: Option<String>,
    /// Explicit region list, or `None` to discover every enabled region.
    pub regions: Option<Vec<String>>,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn normalize_request(
    payload: EnumerateRequest,
    default_days: u32,
) -> Result<NormalizedEnumerateRequest, ValidationError> {
    let days = payload.days.unwrap_or(default_days);
    if days == 0 {
        return Err(ValidationError::new("days must be a positive integer"));
    }
    if days > MAX_LOOKBACK_DAYS {
        return Err(ValidationError::new(format!(
            "days exceeds MAX_LOOKBACK_DAYS={MAX_LOOKBACK_DAYS}"
        )));
    }

    let next_token = match payload.next_token {
        Some(token) if token.trim().is_empty() => {
            return Err(ValidationError::new("next_token cannot be empty"));
        }
        other => other,
    };

    let regions = match payload.regions.as_deref().map(parse_regions).transpose()? {
        Some(list) if list.is_empty() => None,
        other => other,
    };

    Ok(NormalizedEnumerateRequest {
        next_token,
        regions,
        days,
    })
}

/// Splits a comma-separated region list, dropping blanks and duplicates while
/// keeping the caller's order.
pub fn parse_regions(raw: &str) -> Result<Vec<String>, ValidationError> {
    let mut regions: Vec<String> = Vec::new();
    for candidate in raw.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        if !is_valid_region_name(candidate) {
            return Err(ValidationError::new(format!(
                "Region '{candidate}' is not a valid region name"
            )));
        }
        if !regions.iter().any(|existing| existing == candidate) {
            regions.push(candidate.to_string());
        }
    }
    Ok(regions)
}

pub fn is_valid_region_name(region: &str) -> bool {
    !region.is_empty()
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

pub fn default_log_group_name(function_name: &str) -> String {
    format!("/aws/lambda/{function_name}")
}

pub fn encode_message(unit: &WorkUnit) -> Result<String, serde_json::Error> {
    serde_json::to_string(unit)
}

pub fn decode_message(body: &str) -> Result<WorkUnit, ValidationError> {
    let unit: WorkUnit = serde_json::from_str(body)
        .map_err(|error| ValidationError::new(format!("invalid work unit message: {error}")))?;
    if unit.function_name.trim().is_empty() {
        return Err(ValidationError::new("function_name cannot be empty"));
    }
    if unit.log_group_name.trim().is_empty() {
        return Err(ValidationError::new("log_group_name cannot be empty"));
    }
    if unit.days == 0 {
        return Err(ValidationError::new("days must be a positive integer"));
    }
    if unit.days > MAX_LOOKBACK_DAYS {
        return Err(ValidationError::new(format!(
            "days exceeds MAX_LOOKBACK_DAYS={MAX_LOOKBACK_DAYS}"
        )));
    }
    Ok(unit)
}
