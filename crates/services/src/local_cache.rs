//! Element-level decoding of the persisted local cache.
//!
//! The v2 array is decoded one element at a time. Elements this build does
//! not understand (an unknown item type, a missing id) are kept verbatim and
//! written back on every save, so one foreign entry never costs the rest of
//! the cache.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use progress_core::model::{ItemId, ItemType, LearnedItem};

/// One element of the v2 array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub(crate) enum CacheEntry {
    Item(LearnedItem),
    /// Not interpretable here; persisted unchanged.
    Opaque(Value),
}

impl CacheEntry {
    pub(crate) fn decode(value: Value) -> Self {
        match decode_item(&value) {
            Some(item) => CacheEntry::Item(item),
            None => CacheEntry::Opaque(value),
        }
    }

    pub(crate) fn item(&self) -> Option<&LearnedItem> {
        match self {
            CacheEntry::Item(item) => Some(item),
            CacheEntry::Opaque(_) => None,
        }
    }

    /// Whether a remote read of `item_type` (within `video_id`, if given)
    /// supersedes this entry.
    ///
    /// Opaque entries carrying the same type tag are only superseded by an
    /// unscoped read; their parent video cannot be trusted.
    pub(crate) fn replaced_by(&self, item_type: ItemType, video_id: Option<ItemId>) -> bool {
        match self {
            CacheEntry::Item(item) => item.in_scope(item_type, video_id),
            CacheEntry::Opaque(value) => {
                video_id.is_none()
                    && value.get("itemType").and_then(Value::as_str) == Some(item_type.as_str())
            }
        }
    }
}

impl From<LearnedItem> for CacheEntry {
    fn from(item: LearnedItem) -> Self {
        CacheEntry::Item(item)
    }
}

pub(crate) fn decode_entries(elements: Vec<Value>) -> Vec<CacheEntry> {
    let entries: Vec<CacheEntry> = elements.into_iter().map(CacheEntry::decode).collect();
    let opaque = entries
        .iter()
        .filter(|entry| matches!(entry, CacheEntry::Opaque(_)))
        .count();
    if opaque > 0 {
        warn!(count = opaque, "keeping unrecognized local entries as-is");
    }
    entries
}

fn decode_item(value: &Value) -> Option<LearnedItem> {
    let object = value.as_object()?;
    let item_type = object
        .get("itemType")?
        .as_str()?
        .parse::<ItemType>()
        .ok()?;
    let item_id = coerce_id(object.get("itemId")?)?;
    let video_id = match object.get("videoId") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(coerce_id(raw)?),
    };
    Some(LearnedItem::new(item_type, item_id).in_video(video_id))
}

/// Video-only v1 entries become typed v2 entries. Entries that are not
/// integral numbers or numeric strings are dropped.
pub(crate) fn migrate_legacy(entries: &[Value]) -> Vec<CacheEntry> {
    entries
        .iter()
        .filter_map(|entry| {
            let id = coerce_id(entry);
            if id.is_none() {
                warn!(entry = %entry, "dropping non-numeric legacy id");
            }
            id
        })
        .map(|id| LearnedItem::video(id).into())
        .collect()
}

/// Integral JSON numbers and numeric strings.
fn coerce_id(entry: &Value) -> Option<ItemId> {
    let raw = match entry {
        Value::Number(n) => n.as_i64().or_else(|| integral(n.as_f64()?)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| integral(s.parse::<f64>().ok()?))
        }
        _ => None,
    };
    raw.map(ItemId::new)
}

#[allow(clippy::cast_possible_truncation)]
fn integral(value: f64) -> Option<i64> {
    let in_range = value.is_finite() && value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15;
    in_range.then_some(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(raw: &str) -> Vec<CacheEntry> {
        decode_entries(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn legacy_ids_accept_numbers_and_numeric_strings() {
        let entries: Vec<Value> = serde_json::from_str(r#"[3, "7", 8.0, " 9 ", "x", null, 1.5]"#).unwrap();
        let ids: Vec<i64> = migrate_legacy(&entries)
            .iter()
            .filter_map(CacheEntry::item)
            .map(|item| item.item_id.value())
            .collect();
        assert_eq!(ids, vec![3, 7, 8, 9]);
    }

    #[test]
    fn unknown_types_are_kept_opaque() {
        let entries = decode(
            r#"[{"itemType":"video","itemId":1},{"itemType":"podcast","itemId":9},42,{"itemId":3}]"#,
        );
        assert_eq!(entries[0], CacheEntry::Item(LearnedItem::video(ItemId::new(1))));
        assert_eq!(entries[1], CacheEntry::Opaque(json!({"itemType":"podcast","itemId":9})));
        assert_eq!(entries[2], CacheEntry::Opaque(json!(42)));
        assert_eq!(entries[3], CacheEntry::Opaque(json!({"itemId":3})));

        let written = serde_json::to_value(&entries).unwrap();
        assert_eq!(
            written,
            json!([
                {"itemType":"video","itemId":1},
                {"itemType":"podcast","itemId":9},
                42,
                {"itemId":3}
            ])
        );
    }

    #[test]
    fn numeric_string_ids_are_normalized() {
        let entries = decode(r#"[{"itemType":"video","itemId":"3"},{"itemType":"vocab","itemId":4,"videoId":"2"}]"#);
        assert_eq!(entries[0], CacheEntry::Item(LearnedItem::video(ItemId::new(3))));
        let vocab = LearnedItem::new(ItemType::Vocab, ItemId::new(4)).in_video(Some(ItemId::new(2)));
        assert_eq!(entries[1], CacheEntry::Item(vocab));
    }

    #[test]
    fn bad_parent_video_keeps_entry_opaque() {
        let entries = decode(r#"[{"itemType":"sentence","itemId":4,"videoId":"x"}]"#);
        assert!(matches!(entries[0], CacheEntry::Opaque(_)));
    }

    #[test]
    fn opaque_entries_are_replaced_only_by_unscoped_reads_of_their_tag() {
        let entry = CacheEntry::Opaque(json!({"itemType":"video","itemId":"abc"}));
        assert!(entry.replaced_by(ItemType::Video, None));
        assert!(!entry.replaced_by(ItemType::Vocab, None));

        let sentence = CacheEntry::Opaque(json!({"itemType":"sentence","itemId":null}));
        assert!(!sentence.replaced_by(ItemType::Sentence, Some(ItemId::new(1))));

        let podcast = CacheEntry::Opaque(json!({"itemType":"podcast","itemId":9}));
        assert!(ItemType::ALL.iter().all(|t| !podcast.replaced_by(*t, None)));
    }
}
