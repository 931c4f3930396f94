//! Normalization of raw change-feed payloads.
//!
//! The hosted feed has used several envelope shapes over time: the client
//! library shape (`eventType`, `new`, `old`), the wire shape
//! (`payload.data.type`, `record`, `old_record`) and a few in between. All of
//! them are folded into one [`ChangeEvent`] here so nothing downstream has to
//! look at raw JSON.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::event::{ChangeEvent, ChangeKind, Provenance};
use crate::models::{Record, RecordId};
use crate::{Error, Result};

const KIND_KEYS: [&str; 3] = ["eventType", "event", "type"];
const NEW_KEYS: [&str; 2] = ["new", "record"];
const OLD_KEYS: [&str; 2] = ["old", "old_record"];
const ENVELOPE_KEYS: [&str; 2] = ["payload", "data"];
const MAX_ENVELOPE_DEPTH: usize = 3;

/// Convert a raw feed payload into a typed event.
pub fn normalize_change<R>(raw: &Value, provenance: Provenance) -> Result<ChangeEvent<R>>
where
    R: Record + DeserializeOwned,
{
    let (body, kind) = locate_change(raw)
        .ok_or_else(|| Error::InvalidPayload("payload has no recognizable change kind".into()))?;
    let new_row = first_row(body, &NEW_KEYS);
    let old_row = first_row(body, &OLD_KEYS);

    match kind {
        ChangeKind::Insert => {
            let record = decode_required(new_row, "insert")?;
            Ok(ChangeEvent::Inserted { record, provenance })
        }
        ChangeKind::Update => {
            let record = decode_required(new_row, "update")?;
            Ok(ChangeEvent::Updated {
                record,
                prior: decode_partial(old_row),
                provenance,
            })
        }
        ChangeKind::Delete => {
            let prior: Option<R> = decode_partial(old_row);
            let id = match (&prior, old_row) {
                (Some(prior), _) => prior.id(),
                (None, Some(old_row)) => row_id(old_row)?,
                (None, None) => {
                    return Err(Error::InvalidPayload(
                        "delete payload has no prior row".into(),
                    ))
                }
            };
            Ok(ChangeEvent::Deleted {
                id,
                prior,
                provenance,
            })
        }
    }
}

/// Walk through `payload`/`data` envelopes until a level names a change kind.
fn locate_change(raw: &Value) -> Option<(&Map<String, Value>, ChangeKind)> {
    let mut current = raw;
    for _ in 0..MAX_ENVELOPE_DEPTH {
        let object = current.as_object()?;
        let kind = KIND_KEYS
            .iter()
            .filter_map(|key| object.get(*key).and_then(Value::as_str))
            .find_map(|value| value.parse::<ChangeKind>().ok());
        if let Some(kind) = kind {
            return Some((object, kind));
        }
        current = ENVELOPE_KEYS
            .iter()
            .find_map(|key| object.get(*key).filter(|value| value.is_object()))?;
    }
    None
}

/// First non-empty object under any of `keys`.
fn first_row<'a>(body: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| body.get(*key))
        .find(|value| value.as_object().is_some_and(|row| !row.is_empty()))
}

fn decode_required<R: DeserializeOwned>(row: Option<&Value>, kind: &str) -> Result<R> {
    let row =
        row.ok_or_else(|| Error::InvalidPayload(format!("{kind} payload has no new row")))?;
    serde_json::from_value(row.clone())
        .map_err(|error| Error::InvalidPayload(format!("{kind} row did not decode: {error}")))
}

/// Old rows are frequently trimmed to the primary key, so failing to decode
/// one is expected and not an error.
fn decode_partial<R: DeserializeOwned>(row: Option<&Value>) -> Option<R> {
    let row = row?;
    match serde_json::from_value(row.clone()) {
        Ok(decoded) => Some(decoded),
        Err(error) => {
            tracing::trace!("Prior row is partial, keeping id only: {}", error);
            None
        }
    }
}

fn row_id(row: &Value) -> Result<RecordId> {
    row.get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidPayload("prior row has no id".into()))?
        .parse()
        .map_err(|error| Error::InvalidPayload(format!("prior row id is invalid: {error}")))
}
