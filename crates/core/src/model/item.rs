use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::ItemId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ItemTypeError {
    #[error("unknown item type: {0}")]
    Unknown(String),
}

/// Category of a trackable item.
///
/// The lowercase tag is what both the local cache and the remote `item_type`
/// column store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Video,
    Sentence,
    Vocab,
}

impl ItemType {
    pub const ALL: [ItemType; 3] = [ItemType::Video, ItemType::Sentence, ItemType::Vocab];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Video => "video",
            ItemType::Sentence => "sentence",
            ItemType::Vocab => "vocab",
        }
    }

    /// Whether remote rows of this type carry the legacy `video_id` column.
    #[must_use]
    pub fn mirrors_video_id(self) -> bool {
        match self {
            ItemType::Video => true,
            ItemType::Sentence | ItemType::Vocab => false,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = ItemTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "video" => Ok(ItemType::Video),
            "sentence" => Ok(ItemType::Sentence),
            "vocab" => Ok(ItemType::Vocab),
            other => Err(ItemTypeError::Unknown(other.to_owned())),
        }
    }
}

/// One tracked `(item type, item id)` pair in the local cache.
///
/// Persisted as `{"itemType":"video","itemId":3}`. Sentences and vocabulary
/// entries may also name the video they belong to (`"videoId"`); videos never
/// do, their own id already is the video id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedItem {
    pub item_type: ItemType,
    pub item_id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<ItemId>,
}

impl LearnedItem {
    #[must_use]
    pub fn new(item_type: ItemType, item_id: ItemId) -> Self {
        Self {
            item_type,
            item_id,
            video_id: None,
        }
    }

    #[must_use]
    pub fn video(item_id: ItemId) -> Self {
        Self::new(ItemType::Video, item_id)
    }

    /// Attach the parent video. Ignored for videos.
    #[must_use]
    pub fn in_video(mut self, video_id: Option<ItemId>) -> Self {
        if !self.item_type.mirrors_video_id() {
            self.video_id = video_id;
        }
        self
    }

    #[must_use]
    pub fn matches(&self, item_type: ItemType, item_id: ItemId) -> bool {
        self.item_type == item_type && self.item_id == item_id
    }

    /// Whether this entry is of `item_type` and, when `video_id` is given,
    /// belongs to that video.
    #[must_use]
    pub fn in_scope(&self, item_type: ItemType, video_id: Option<ItemId>) -> bool {
        self.item_type == item_type && video_id.is_none_or(|v| self.video_id == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_round_trips_through_tag() {
        for item_type in ItemType::ALL {
            assert_eq!(item_type.as_str().parse::<ItemType>().unwrap(), item_type);
        }
    }

    #[test]
    fn unknown_item_type_is_rejected() {
        let err = "podcast".parse::<ItemType>().unwrap_err();
        assert_eq!(err, ItemTypeError::Unknown("podcast".into()));
    }

    #[test]
    fn only_videos_mirror_video_id() {
        assert!(ItemType::Video.mirrors_video_id());
        assert!(!ItemType::Sentence.mirrors_video_id());
        assert!(!ItemType::Vocab.mirrors_video_id());
    }

    #[test]
    fn learned_item_uses_camel_case_json() {
        let item = LearnedItem::new(ItemType::Sentence, ItemId::new(9));
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"itemType":"sentence","itemId":9}"#);

        let back: LearnedItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn parent_video_is_kept_for_parts_only() {
        let sentence =
            LearnedItem::new(ItemType::Sentence, ItemId::new(9)).in_video(Some(ItemId::new(2)));
        let json = serde_json::to_string(&sentence).unwrap();
        assert_eq!(json, r#"{"itemType":"sentence","itemId":9,"videoId":2}"#);
        assert!(sentence.in_scope(ItemType::Sentence, Some(ItemId::new(2))));
        assert!(sentence.in_scope(ItemType::Sentence, None));
        assert!(!sentence.in_scope(ItemType::Sentence, Some(ItemId::new(3))));

        let video = LearnedItem::video(ItemId::new(4)).in_video(Some(ItemId::new(2)));
        assert_eq!(video.video_id, None);
    }

    #[test]
    fn matches_requires_type_and_id() {
        let item = LearnedItem::video(ItemId::new(3));
        assert!(item.matches(ItemType::Video, ItemId::new(3)));
        assert!(!item.matches(ItemType::Vocab, ItemId::new(3)));
        assert!(!item.matches(ItemType::Video, ItemId::new(4)));
    }
}
