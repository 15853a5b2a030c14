//! Resolution history records.
//!
//! Every resolution attempt, successful or not, is normalized into a
//! [`HistoryRecordRaw`] and then stored with a generated id.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DappError, DappResult};
use crate::types::ResolutionResponse;

/// Display name used when the document carries no organization name
pub const UNKNOWN_ORGID: &str = "Unknown organization";

/// Paths tried, in order, to find the organization name in a DID document
const NAME_PATHS: &[&str] = &["legalEntity.legalName", "organizationalUnit.name"];

/// Outcome of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionResult {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

/// A history record before it gets an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecordRaw {
    pub name: String,
    pub date: DateTime<Utc>,
    pub did: String,
    pub result: ResolutionResult,
    pub report: ResolutionResponse,
}

/// A stored resolution history record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    #[serde(flatten)]
    pub record: HistoryRecordRaw,
}

impl HistoryRecord {
    pub fn new(id: String, record: HistoryRecordRaw) -> Self {
        Self { id, record }
    }

    pub fn did(&self) -> &str {
        &self.record.did
    }

    pub fn is_error(&self) -> bool {
        self.record.result == ResolutionResult::Error
    }
}

/// Maps a resolution outcome into a history record.
///
/// `response` is `None` when the resolution itself failed; a report carrying
/// `error` is synthesized in that case.
pub fn normalize(
    did: &str,
    started: DateTime<Utc>,
    response: Option<ResolutionResponse>,
    error: Option<String>,
) -> HistoryRecordRaw {
    let name = organization_name(response.as_ref());

    match response {
        Some(report) => HistoryRecordRaw {
            name,
            date: report.did_resolution_metadata.retrieved,
            did: did.to_string(),
            result: if report.is_error() {
                ResolutionResult::Error
            } else {
                ResolutionResult::Ok
            },
            report,
        },
        None => {
            let error = error.unwrap_or_else(|| "Unknown resolution error".to_string());
            HistoryRecordRaw {
                name,
                date: Utc::now(),
                did: did.to_string(),
                result: ResolutionResult::Error,
                report: ResolutionResponse::build(did, started, None, None, Some(error)),
            }
        }
    }
}

/// Organization display name found in the response's DID document
pub fn organization_name(response: Option<&ResolutionResponse>) -> String {
    response
        .and_then(|r| r.did_document.as_ref())
        .and_then(|document| {
            NAME_PATHS
                .iter()
                .filter_map(|path| deep_value(document, path))
                .filter_map(Value::as_str)
                .find(|name| !name.is_empty())
        })
        .unwrap_or(UNKNOWN_ORGID)
        .to_string()
}

/// Looks a dot-separated path up in a JSON value
pub fn deep_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

/// Checks a raw record before it is stored
pub fn validate_record(record: &HistoryRecordRaw) -> DappResult<()> {
    if record.name.trim().is_empty() {
        return Err(DappError::InvalidRecord("name must not be empty".to_string()));
    }
    if record.did.trim().is_empty() {
        return Err(DappError::InvalidRecord("did must not be empty".to_string()));
    }
    if record.report.did != record.did {
        return Err(DappError::InvalidRecord(format!(
            "report is for {} but the record is for {}",
            record.report.did, record.did
        )));
    }
    Ok(())
}

pub fn get_record_by_id<'a>(records: &'a [HistoryRecord], id: &str) -> Option<&'a HistoryRecord> {
    records.iter().find(|r| r.id == id)
}

pub fn get_record_by_did<'a>(records: &'a [HistoryRecord], did: &str) -> Option<&'a HistoryRecord> {
    records.iter().find(|r| r.did() == did)
}

/// Earlier successful record for the DID, reused instead of resolving again
pub fn cached_record<'a>(records: &'a [HistoryRecord], did: &str) -> Option<&'a HistoryRecord> {
    records.iter().find(|r| r.did() == did && !r.is_error())
}

/// Random alphanumeric record id
pub fn simple_uid(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DidDocumentMetadata;
    use serde_json::json;

    const DID: &str = "did:orgid:4:0xabc";

    fn response(document: Option<Value>, error: Option<&str>) -> ResolutionResponse {
        ResolutionResponse::build(
            DID,
            Utc::now(),
            document,
            Some(DidDocumentMetadata::default()),
            error.map(String::from),
        )
    }

    #[test]
    fn test_decision_table() {
        let started = Utc::now();

        let ok = normalize(DID, started, Some(response(Some(json!({})), None)), None);
        assert_eq!(ok.result, ResolutionResult::Ok);
        assert_eq!(ok.date, ok.report.did_resolution_metadata.retrieved);

        let reported = normalize(DID, started, Some(response(None, Some("ORGiD not found"))), None);
        assert_eq!(reported.result, ResolutionResult::Error);
        assert_eq!(reported.report.did_resolution_metadata.error.as_deref(), Some("ORGiD not found"));

        let thrown = normalize(DID, started, None, Some("x".to_string()));
        assert_eq!(thrown.result, ResolutionResult::Error);
        assert_eq!(thrown.name, UNKNOWN_ORGID);
        assert_eq!(thrown.report.did, DID);
        assert!(thrown.report.did_resolution_metadata.error.unwrap().contains('x'));
    }

    #[test]
    fn test_organization_name() {
        let test_cases = vec![
            (json!({ "legalEntity": { "legalName": "Acme" } }), "Acme"),
            (json!({ "organizationalUnit": { "name": "Acme Travel" } }), "Acme Travel"),
            (
                json!({ "legalEntity": { "legalName": "Acme" }, "organizationalUnit": { "name": "Unit" } }),
                "Acme",
            ),
            (json!({ "legalEntity": { "legalName": "" }, "organizationalUnit": { "name": "Unit" } }), "Unit"),
            (json!({ "legalEntity": {} }), UNKNOWN_ORGID),
            (json!({ "legalEntity": { "legalName": 42 } }), UNKNOWN_ORGID),
        ];

        for (document, expected) in test_cases {
            let record = normalize(DID, Utc::now(), Some(response(Some(document), None)), None);
            assert_eq!(record.name, expected);
        }

        assert_eq!(organization_name(None), UNKNOWN_ORGID);
    }

    #[test]
    fn test_record_serialization() {
        let raw = normalize(DID, Utc::now(), Some(response(Some(json!({})), None)), None);
        let record = HistoryRecord::new("abcd1234".to_string(), raw);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["id"], "abcd1234");
        assert_eq!(value["did"], DID);
        assert_eq!(value["result"], "OK");
        assert!(value["report"]["didResolutionMetadata"]["retrieved"].is_string());
        assert_eq!(serde_json::from_value::<HistoryRecord>(value).unwrap(), record);
    }

    #[test]
    fn test_validation() {
        let mut raw = normalize(DID, Utc::now(), None, Some("x".to_string()));
        assert!(validate_record(&raw).is_ok());

        raw.name = " ".to_string();
        assert!(matches!(validate_record(&raw), Err(DappError::InvalidRecord(_))));

        raw.name = "Acme".to_string();
        raw.did = "did:orgid:4:0xdef".to_string();
        assert!(matches!(validate_record(&raw), Err(DappError::InvalidRecord(_))));
    }

    #[test]
    fn test_lookups_and_cache() {
        let failed = HistoryRecord::new("a".into(), normalize(DID, Utc::now(), None, Some("x".into())));
        let ok = HistoryRecord::new(
            "b".into(),
            normalize(DID, Utc::now(), Some(response(Some(json!({})), None)), None),
        );
        let records = vec![failed, ok];

        assert_eq!(get_record_by_did(&records, DID).unwrap().id, "a");
        assert_eq!(cached_record(&records, DID).unwrap().id, "b");
        assert_eq!(get_record_by_id(&records, "b").unwrap().id, "b");
        assert!(get_record_by_id(&records, "c").is_none());
        assert!(cached_record(&records[..1], DID).is_none());
    }

    #[test]
    fn test_simple_uid() {
        let id = simple_uid(8);
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(simple_uid(16), simple_uid(16));
    }
}
