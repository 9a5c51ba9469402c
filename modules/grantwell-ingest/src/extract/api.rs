//! Fixed field-selector mapping for structured (API) sources.

use grantwell_common::types::{
    DeadlineInfo, EligibilityInfo, EntityType, ExtractedGrant, FundingInfo, FundingType,
    GeographyInfo, GrantStatus,
};
use grantwell_common::IngestError;
use serde_json::Value;

use crate::extract::text::{parse_date, parse_deadline_text};
use crate::registry::{ApiFieldMap, SourceConfig};

/// Confidence reported for direct field mapping. Structured sources are
/// trustworthy but still occasionally publish junk in the mapped fields.
const API_MAPPING_CONFIDENCE: u8 = 95;

/// Map one JSON record into a candidate using the source's field map.
/// Returns the source-native record ID alongside the candidate.
pub fn map_json_record(
    record: &Value,
    map: &ApiFieldMap,
    source: &SourceConfig,
) -> Result<(String, ExtractedGrant), IngestError> {
    let id = string_at(record, &map.id)
        .ok_or_else(|| IngestError::Extraction(format!("record has no id at {}", map.id)))?;

    let title = string_at(record, &map.title).unwrap_or_default();
    let sponsor = string_at(record, &map.sponsor)
        .or_else(|| source.default_sponsor.clone())
        .unwrap_or_default();
    let description = string_at(record, &map.description).unwrap_or_default();
    let apply_url = string_at(record, &map.apply_url).unwrap_or_default();

    let deadline = match map.deadline.as_deref().and_then(|p| string_at(record, p)) {
        Some(raw) => match parse_date(&raw) {
            Some(d) => DeadlineInfo {
                deadline_type: grantwell_common::types::DeadlineType::Fixed,
                date: Some(d),
                text: Some(raw),
            },
            None => parse_deadline_text(&raw),
        },
        None => DeadlineInfo::default(),
    };

    let source_status = map
        .status
        .as_deref()
        .and_then(|p| string_at(record, p))
        .and_then(|s| GrantStatus::from_str_loose(&s));

    let funding = FundingInfo {
        min: map.funding_min.as_deref().and_then(|p| number_at(record, p)),
        max: map.funding_max.as_deref().and_then(|p| number_at(record, p)),
        text: None,
        funding_type: FundingType::Grant,
    };

    let categories = map
        .categories
        .as_deref()
        .map(|p| string_list_at(record, p))
        .unwrap_or_default();

    let states: Vec<String> = map
        .states
        .as_deref()
        .map(|p| string_list_at(record, p))
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| s.len() == 2)
        .collect();

    let entity_types = map
        .entity_types
        .as_deref()
        .map(|p| string_list_at(record, p))
        .unwrap_or_default()
        .iter()
        .filter_map(|s| parse_entity_type_loose(s))
        .collect();

    let geography = GeographyInfo {
        is_national: states.is_empty() && source.default_national,
        states,
    };

    let candidate = ExtractedGrant {
        title,
        sponsor,
        description,
        apply_url,
        funding,
        deadline,
        geography,
        eligibility: EligibilityInfo {
            entity_types,
            industries: Vec::new(),
            restrictions: Vec::new(),
            requirements: Vec::new(),
        },
        categories,
        source_status,
        extraction_confidence: API_MAPPING_CONFIDENCE,
    };

    Ok((id, candidate))
}

/// Loose entity-type recognition for the audience strings APIs publish.
pub fn parse_entity_type_loose(s: &str) -> Option<EntityType> {
    let lower = s.trim().to_lowercase();
    if lower.contains("nonprofit") || lower.contains("501") {
        Some(EntityType::Nonprofit)
    } else if lower.contains("small business") {
        Some(EntityType::SmallBusiness)
    } else if lower.contains("individual") {
        Some(EntityType::Individual)
    } else if lower.contains("for-profit") || lower.contains("for profit") {
        Some(EntityType::ForProfit)
    } else if lower.contains("education")
        || lower.contains("university")
        || lower.contains("school")
    {
        Some(EntityType::Educational)
    } else if lower.contains("tribal") || lower.contains("tribe") {
        Some(EntityType::Tribal)
    } else if lower.contains("government")
        || lower.contains("state")
        || lower.contains("county")
        || lower.contains("city")
    {
        Some(EntityType::Government)
    } else {
        None
    }
}

fn string_at(record: &Value, pointer: &str) -> Option<String> {
    match record.pointer(pointer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_at(record: &Value, pointer: &str) -> Option<f64> {
    match record.pointer(pointer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace([',', '$'], "").parse().ok(),
        _ => None,
    }
}

fn string_list_at(record: &Value, pointer: &str) -> Vec<String> {
    match record.pointer(pointer) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split([';', '|'])
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
