use std::str::FromStr;
use itertools::Itertools;
use crate::entities::{MediaItem, MediaKind, SpeciesFilter};

pub const DEFAULT_PAGE_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileTypeFilter {
    #[default]
    All,
    Images,
    Audio,
    Videos,
}

impl FileTypeFilter {
    pub fn matches(&self, kind: MediaKind) -> bool {
        match self {
            FileTypeFilter::All => true,
            FileTypeFilter::Images => kind == MediaKind::Image,
            FileTypeFilter::Audio => kind == MediaKind::Audio,
            FileTypeFilter::Videos => kind == MediaKind::Video,
        }
    }
}

impl FromStr for FileTypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(FileTypeFilter::All),
            "images" | "image" => Ok(FileTypeFilter::Images),
            "audio" => Ok(FileTypeFilter::Audio),
            "videos" | "video" => Ok(FileTypeFilter::Videos),
            _ => Err(format!("unknown file type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Date,
    Species,
    FileType,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "date" => Ok(SortKey::Date),
            "species" => Ok(SortKey::Species),
            "filetype" | "type" => Ok(SortKey::FileType),
            _ => Err(format!("unknown sort key: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub file_type: FileTypeFilter,
    pub species: SpeciesFilter,
    pub thumbnail_substring: Option<String>,
    pub min_count: u32,
}

impl FilterCriteria {
    /// Keeps only the criteria that can be checked on items without species counts.
    pub fn without_species(&self) -> Self {
        Self {
            file_type: self.file_type,
            species: SpeciesFilter::new(),
            thumbnail_substring: self.thumbnail_substring.clone(),
            min_count: 0,
        }
    }

    pub fn accepts(&self, item: &MediaItem) -> bool {
        if !self.file_type.matches(item.kind) {
            return false;
        }
        let species_met = self.species.iter()
            .all(|(name, min)| item.species.get(name).is_some_and(|count| count >= min));
        if !species_met {
            return false;
        }
        if let Some(needle) = self.thumbnail_substring.as_deref().filter(|x| !x.is_empty()) {
            if !item.url.contains(needle) && !item.filename.contains(needle) {
                return false;
            }
        }
        if self.min_count > 1 && !item.species.iter().any(|(_, count)| count >= self.min_count) {
            return false;
        }
        true
    }
}

/// Query string for the search endpoint.
///
/// A single species with a count of one maps to the simple `?species=` form,
/// anything else to numbered `tagN`/`countN` pairs in insertion order.
pub fn build_query_string(filter: &SpeciesFilter) -> String {
    if filter.is_empty() {
        return String::new();
    }
    if filter.len() == 1 {
        if let Some((name, 1)) = filter.iter().next() {
            return format!("?species={}", urlencoding::encode(name));
        }
    }
    let pairs = filter.iter()
        .enumerate()
        .map(|(index, (name, count))| format!("tag{n}={}&count{n}={}", urlencoding::encode(name), count, n = index + 1))
        .join("&");
    format!("?{}", pairs)
}

pub fn apply_filters(items: &[MediaItem], criteria: &FilterCriteria) -> Vec<MediaItem> {
    items.iter()
        .filter(|x| criteria.accepts(x))
        .cloned()
        .collect()
}

/// Stable in-place sort.
///
/// Dates are compared as plain strings, newest first. This is only correct for
/// ISO-formatted dates; other formats sort lexicographically.
pub fn sort_items(items: &mut [MediaItem], key: SortKey) {
    match key {
        SortKey::Date => items.sort_by(|a, b| b.date.cmp(&a.date)),
        SortKey::Species => items.sort_by(|a, b| {
            let a = a.species.first_name().unwrap_or_default();
            let b = b.species.first_name().unwrap_or_default();
            a.cmp(b)
        }),
        SortKey::FileType => items.sort_by(|a, b| a.kind.as_str().cmp(b.kind.as_str())),
    }
}

pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    total_items.div_ceil(page_size).max(1)
}

pub fn clamp_page(page: usize, total_items: usize, page_size: usize) -> usize {
    page.clamp(1, total_pages(total_items, page_size))
}

pub fn paginate<T>(items: &[T], page_size: usize, page: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(page_size).min(items.len());
    let end = page.saturating_mul(page_size).min(items.len());
    &items[start..end]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Filter, sort and slice out one page.
pub fn browse(items: &[MediaItem], criteria: &FilterCriteria, sort: SortKey, page_size: usize, page: usize) -> Page<MediaItem> {
    let mut filtered = apply_filters(items, criteria);
    sort_items(&mut filtered, sort);
    let total_items = filtered.len();
    let page = clamp_page(page, total_items, page_size);
    Page {
        items: paginate(&filtered, page_size, page).to_vec(),
        page,
        total_pages: total_pages(total_items, page_size),
        total_items,
    }
}
