use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize, Serializer};
use crate::error::BirdError;

pub type MediaId = u64;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Species name to count, in insertion order.
///
/// Used both for the counts observed on a media item and for the minimum
/// counts of a species filter. Inserting a name that is already present
/// replaces its count without moving it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SpeciesCounts(Vec<(String, u32)>);

pub type SpeciesFilter = SpeciesCounts;

impl SpeciesCounts {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, count: u32) {
        let name = name.into();
        match self.0.iter_mut().find(|(x, _)| *x == name) {
            Some(entry) => entry.1 = count,
            None => self.0.push((name, count)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<u32> {
        let index = self.0.iter().position(|(x, _)| x == name)?;
        Some(self.0.remove(index).1)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.0.iter().find(|(x, _)| x == name).map(|(_, count)| *count)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn first_name(&self) -> Option<&str> {
        self.0.first().map(|(name, _)| name.as_str())
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for SpeciesCounts {
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        let mut counts = SpeciesCounts::new();
        for (name, count) in iter {
            counts.insert(name, count);
        }
        counts
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MediaItem {
    pub id: MediaId,
    pub kind: MediaKind,
    pub url: String,
    pub filename: String,
    pub species: SpeciesCounts,
    pub uploader: String,
    pub date: String,
    pub file_url: Option<String>,
    pub thumb_url: Option<String>,
}

/// One entry of a search response, exactly as the backend sends it.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawLink {
    #[serde(rename = "fileURL")]
    pub file_url: Option<String>,
    #[serde(rename = "thumbURL")]
    pub thumb_url: Option<String>,
}

/// A validated search link, one variant per media kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLink {
    Image { file_url: String, thumb_url: String },
    Audio { file_url: String },
    Video { file_url: String },
}

impl TryFrom<RawLink> for MediaLink {
    type Error = BirdError;

    fn try_from(value: RawLink) -> Result<Self, Self::Error> {
        let file_url = value.file_url
            .map(|x| x.trim().to_string())
            .filter(|x| !x.is_empty())
            .ok_or_else(|| BirdError::malformed("link without fileURL"))?;
        if let Some(thumb_url) = value.thumb_url {
            let thumb_url = thumb_url.trim().to_string();
            if thumb_url.is_empty() {
                return Err(BirdError::malformed(format!("empty thumbURL for {}", file_url)));
            }
            return Ok(MediaLink::Image { file_url, thumb_url });
        }
        let is_video = url_path(&file_url).to_ascii_lowercase().ends_with(".mp4");
        if is_video {
            Ok(MediaLink::Video { file_url })
        } else {
            Ok(MediaLink::Audio { file_url })
        }
    }
}

impl MediaLink {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaLink::Image { .. } => MediaKind::Image,
            MediaLink::Audio { .. } => MediaKind::Audio,
            MediaLink::Video { .. } => MediaKind::Video,
        }
    }

    pub fn file_url(&self) -> &str {
        match self {
            MediaLink::Image { file_url, .. } => file_url,
            MediaLink::Audio { file_url } => file_url,
            MediaLink::Video { file_url } => file_url,
        }
    }

    pub fn into_media_item(self, id: MediaId) -> MediaItem {
        let kind = self.kind();
        let filename = filename_from_url(self.file_url());
        let (url, file_url, thumb_url) = match self {
            MediaLink::Image { file_url, thumb_url } => (thumb_url.clone(), file_url, Some(thumb_url)),
            MediaLink::Audio { file_url } | MediaLink::Video { file_url } => (file_url.clone(), file_url, None),
        };
        MediaItem {
            id,
            kind,
            url,
            filename,
            species: SpeciesCounts::new(),
            uploader: String::new(),
            date: String::new(),
            file_url: Some(file_url),
            thumb_url,
        }
    }
}

fn url_path(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn filename_from_url(url: &str) -> String {
    let last_segment = url_path(url).rsplit('/').next().unwrap_or_default();
    urlencoding::decode(last_segment)
        .map(|x| x.into_owned())
        .unwrap_or_else(|_| last_segment.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOperation {
    Remove,
    Add,
}

impl TagOperation {
    pub fn code(&self) -> u8 {
        match self {
            TagOperation::Remove => 0,
            TagOperation::Add => 1,
        }
    }
}

impl Serialize for TagOperation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TagUpdate {
    pub url: String,
    pub status: String,
}
