use serde::{Deserialize, Serialize};
use crate::entities::{MediaItem, RawLink, TagOperation, TagUpdate};

pub mod client;

pub use client::ApiClient;

pub const SEARCH_PATH: &str = "/search";
pub const FULLSIZE_PATH: &str = "/fullsize";
pub const MANAGE_TAGS_PATH: &str = "/manage-tags";
pub const NOTIFICATIONS_PATH: &str = "/send_notification_sns";

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
pub struct FullsizeResponse {
    #[serde(rename = "fileURL")]
    pub file_url: String,
}

#[derive(Debug, Serialize)]
pub struct ManageTagsRequest<'a> {
    pub urls: &'a [String],
    pub operation: TagOperation,
    pub tags: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct ManageTagsResponse {
    pub updated: Vec<TagUpdate>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionRequest<'a> {
    pub species: &'a str,
    pub email: &'a str,
    #[serde(rename = "enableNotifications", skip_serializing_if = "Option::is_none")]
    pub enable_notifications: Option<bool>,
}

/// Media items built from a search response, plus how many links were dropped as malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub items: Vec<MediaItem>,
    pub rejected: usize,
}
