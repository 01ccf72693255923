//! Continuation-token cursor over a region-partitioned function listing.
//!
//! Callers treat the encoded token as opaque. Internally it names the region
//! being listed and, when that region has more results, the upstream listing
//! marker to resume from.

use crate::contract::{is_valid_region_name, ValidationError};

const MARKER_SEPARATOR: char = '#';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub region: String,
    pub marker: Option<String>,
}

impl ContinuationToken {
    pub fn start_of(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            marker: None,
        }
    }

    pub fn encode(&self) -> String {
        match &self.marker {
            Some(marker) => format!("{}{MARKER_SEPARATOR}{marker}", self.region),
            None => self.region.clone(),
        }
    }

    pub fn decode(raw: &str) -> Result<Self, ValidationError> {
        let (region, marker) = match raw.split_once(MARKER_SEPARATOR) {
            Some((region, marker)) => {
                if marker.is_empty() {
                    return Err(ValidationError::new(
                        "next_token carries an empty listing marker",
                    ));
                }
                (region, Some(marker.to_string()))
            }
            None => (raw, None),
        };

        if !is_valid_region_name(region) {
            return Err(ValidationError::new(format!(
                "next_token refers to invalid region '{region}'"
            )));
        }

        Ok(Self {
            region: region.to_string(),
            marker,
        })
    }
}

/// Position to list from for this invocation. `None` means there is nothing
/// to list at all (an empty region set).
pub fn resume_cursor(
    regions: &[String],
    next_token: Option<&str>,
) -> Result<Option<ContinuationToken>, ValidationError> {
    let Some(raw) = next_token else {
        return Ok(regions.first().cloned().map(ContinuationToken::start_of));
    };

    let token = ContinuationToken::decode(raw)?;
    if !regions.iter().any(|region| region == &token.region) {
        return Err(ValidationError::new(format!(
            "next_token refers to region '{}' outside the enumerated region set",
            token.region
        )));
    }
    Ok(Some(token))
}

/// Cursor following a listed page. A marker keeps the cursor in the same
/// region; otherwise it moves to the next region, and past the last region
/// there is no token.
pub fn advance_cursor(
    regions: &[String],
    current_region: &str,
    upstream_marker: Option<String>,
) -> Result<Option<ContinuationToken>, ValidationError> {
    if let Some(marker) = upstream_marker.filter(|m| !m.is_empty()) {
        return Ok(Some(ContinuationToken {
            region: current_region.to_string(),
            marker: Some(marker),
        }));
    }

    let position = regions
        .iter()
        .position(|region| region == current_region)
        .ok_or_else(|| {
            ValidationError::new(format!(
                "region '{current_region}' is not part of the enumerated region set"
            ))
        })?;

    Ok(regions
        .get(position + 1)
        .cloned()
        .map(ContinuationToken::start_of))
}
