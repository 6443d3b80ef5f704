use std::fmt::Write;
use itertools::Itertools;
use log::info;
use crate::api::ApiClient;
use crate::entities::{MediaItem, TagOperation, TagUpdate};
use crate::fixtures::mock_media;
use crate::query::{browse, FileTypeFilter, FilterCriteria, Page, SortKey, DEFAULT_PAGE_SIZE};
use crate::session::{Session, SessionStore};
use crate::views::Toasts;

const PAGES_BEFORE: usize = 3;
const PAGES_AFTER: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ResultSource {
    #[default]
    Fixtures,
    Remote,
}

/// Filter state and the current result set of the browse page.
#[derive(Debug, Clone)]
pub struct BrowseView {
    pub criteria: FilterCriteria,
    pub sort: SortKey,
    pub page: usize,
    pub page_size: usize,
    results: Vec<MediaItem>,
    source: ResultSource,
}

impl Default for BrowseView {
    fn default() -> Self {
        Self {
            criteria: FilterCriteria::default(),
            sort: SortKey::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            results: Vec::new(),
            source: ResultSource::default(),
        }
    }
}

impl BrowseView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_species(&mut self, name: &str, count: u32, toasts: &mut Toasts) -> bool {
        let name = name.trim();
        if name.is_empty() {
            toasts.error("Enter a species name");
            return false;
        }
        if count < 1 {
            toasts.error("Count must be at least 1");
            return false;
        }
        self.criteria.species.insert(name, count);
        self.page = 1;
        true
    }

    pub fn remove_species(&mut self, name: &str) {
        self.criteria.species.remove(name);
        self.page = 1;
    }

    pub fn set_file_type(&mut self, file_type: FileTypeFilter) {
        self.criteria.file_type = file_type;
        self.page = 1;
    }

    pub fn set_thumbnail_substring(&mut self, needle: Option<String>) {
        self.criteria.thumbnail_substring = needle.filter(|x| !x.is_empty());
        self.page = 1;
    }

    pub fn set_min_count(&mut self, min_count: u32) {
        self.criteria.min_count = min_count;
        self.page = 1;
    }

    pub fn reset_filters(&mut self) {
        self.criteria = FilterCriteria::default();
        self.page = 1;
    }

    pub fn load_fixtures(&mut self) {
        self.results = mock_media();
        self.source = ResultSource::Fixtures;
        self.page = 1;
    }

    /// Runs the whole filter, sort and page pipeline over the built-in sample media.
    pub fn browse_local(&mut self) -> Page<MediaItem> {
        let page = self.page;
        self.load_fixtures();
        self.go_to_page(page);
        self.current_page()
    }

    pub fn results(&self) -> &[MediaItem] {
        &self.results
    }

    pub async fn search<S: SessionStore>(&mut self, client: &ApiClient, session: &Session<S>, toasts: &mut Toasts) -> bool {
        match client.search(session, &self.criteria.species).await {
            Ok(results) => {
                if results.rejected > 0 {
                    toasts.info(format!("{} malformed results were skipped", results.rejected));
                }
                if self.criteria.min_count > 1 && !results.items.is_empty() {
                    toasts.info(format!("Search results carry no counts, minimum count {} was not applied", self.criteria.min_count));
                }
                if results.items.is_empty() {
                    toasts.info("No results");
                }
                self.results = results.items;
                self.source = ResultSource::Remote;
                self.page = 1;
                true
            }
            Err(e) => {
                toasts.error(format!("Search failed: {}", e));
                false
            }
        }
    }

    /// Remote results are already narrowed by species and carry no counts,
    /// so the minimum count cannot be checked on them.
    fn local_criteria(&self) -> FilterCriteria {
        match self.source {
            ResultSource::Fixtures => self.criteria.clone(),
            ResultSource::Remote => self.criteria.without_species(),
        }
    }

    pub fn current_page(&self) -> Page<MediaItem> {
        browse(&self.results, &self.local_criteria(), self.sort, self.page_size, self.page)
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.page = page;
        self.page = self.current_page().page;
    }

    pub fn next_page(&mut self) {
        self.go_to_page(self.page.saturating_add(1));
    }

    pub fn previous_page(&mut self) {
        self.go_to_page(self.page.saturating_sub(1));
    }

    pub async fn show_fullsize<S: SessionStore>(&self, client: &ApiClient, session: &Session<S>, thumb_url: &str, toasts: &mut Toasts) -> Option<String> {
        match client.fullsize(session, thumb_url).await {
            Ok(url) => Some(url),
            Err(e) => {
                toasts.error(format!("Could not load full-size file: {}", e));
                None
            }
        }
    }

    pub async fn update_tags<S: SessionStore>(
        &self,
        client: &ApiClient,
        session: &Session<S>,
        urls: &[String],
        operation: TagOperation,
        tags: &[String],
        toasts: &mut Toasts,
    ) -> Vec<TagUpdate> {
        match client.manage_tags(session, urls, operation, tags).await {
            Ok(updated) => {
                info!("tag update touched {} files", updated.len());
                toasts.success(format!("Updated tags on {} file(s)", updated.len()));
                updated
            }
            Err(e) => {
                toasts.error(format!("Tag update failed: {}", e));
                Vec::new()
            }
        }
    }

    pub fn render(&self) -> String {
        let page = self.current_page();
        let mut out = String::new();
        let filters = self.criteria.species.iter().map(|(name, count)| format!("{} x{}", name, count)).join(", ");
        if !filters.is_empty() {
            let _ = writeln!(out, "species: {}", filters);
        }
        if page.items.is_empty() {
            let _ = writeln!(out, "No media found.");
        }
        for item in &page.items {
            let species = item.species.iter().map(|(name, count)| format!("{} ({})", name, count)).join(", ");
            let _ = writeln!(out, "#{:<3} {:<5} {}", item.id, item.kind, item.filename);
            if !species.is_empty() {
                let _ = writeln!(out, "      {}", species);
            }
            if !item.uploader.is_empty() || !item.date.is_empty() {
                let _ = writeln!(out, "      By {} | {}", item.uploader, item.date);
            }
            if !item.url.is_empty() {
                let _ = writeln!(out, "      {}", item.url);
            }
        }
        let _ = writeln!(out, "{}", page_navigation(&page));
        out
    }
}

fn page_navigation(page: &Page<MediaItem>) -> String {
    let pages = (page.page.saturating_sub(PAGES_BEFORE)..=page.page.saturating_add(PAGES_AFTER))
        .filter(|x| *x > 0 && *x <= page.total_pages)
        .map(|x| if x == page.page { format!("[{}]", x) } else { x.to_string() })
        .join(" ");
    format!("page {} of {} ({} items): {}", page.page, page.total_pages, page.total_items, pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::backend_router;
    use crate::entities::MediaKind;
    use crate::session::InMemorySessionStore;
    use crate::session::tests::fake_tokens;
    use crate::test_utils::serve;
    use crate::views::NoticeLevel;

    #[test]
    fn test_species_filter_editing() {
        let mut view = BrowseView::new();
        let mut toasts = Toasts::default();
        assert!(view.add_species("wren", 2, &mut toasts));
        assert!(view.add_species(" eagle ", 1, &mut toasts));
        assert!(!view.add_species("crow", 0, &mut toasts));
        assert!(!view.add_species("  ", 1, &mut toasts));
        assert_eq!(view.criteria.species.iter().collect::<Vec<_>>(), vec![("wren", 2), ("eagle", 1)]);
        view.remove_species("wren");
        assert_eq!(view.criteria.species.len(), 1);
        view.reset_filters();
        assert!(view.criteria.species.is_empty());
    }

    #[test]
    fn test_local_browse_over_fixtures() {
        let mut view = BrowseView::new();
        let mut toasts = Toasts::default();
        view.load_fixtures();
        view.add_species("wren", 2, &mut toasts);
        let page = view.current_page();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].filename, "wren-in-bush.jpg");

        view.reset_filters();
        view.set_file_type(FileTypeFilter::Images);
        view.page = 5;
        let page = view.browse_local();
        assert_eq!(page.total_items, 2);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn test_paging_is_clamped() {
        let mut view = BrowseView::new();
        view.load_fixtures();
        view.page_size = 3;
        view.next_page();
        view.next_page();
        assert_eq!(view.page, 2);
        view.previous_page();
        view.previous_page();
        assert_eq!(view.page, 1);
        let rendered = view.render();
        assert!(rendered.contains("page 1 of 2 (4 items): [1] 2"));
    }

    #[tokio::test]
    async fn test_remote_search_keeps_type_filter() {
        let client = ApiClient::new(&serve(backend_router()).await);
        let mut session = Session::open(InMemorySessionStore::default()).await.unwrap();
        session.begin(fake_tokens("user-1", "a@b.c")).await.unwrap();
        let mut toasts = Toasts::default();
        let mut view = BrowseView::new();
        view.add_species("wren", 3, &mut toasts);
        view.set_min_count(3);
        view.set_file_type(FileTypeFilter::Images);
        assert!(view.search(&client, &session, &mut toasts).await);
        let page = view.current_page();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].kind, MediaKind::Image);
        assert!(toasts.drain().iter().any(|x| x.level == NoticeLevel::Info && x.message.contains("minimum count 3")));
    }

    #[tokio::test]
    async fn test_remote_search_reports_skipped_min_count() {
        let client = ApiClient::new(&serve(backend_router()).await);
        let mut session = Session::open(InMemorySessionStore::default()).await.unwrap();
        session.begin(fake_tokens("user-1", "a@b.c")).await.unwrap();
        let mut toasts = Toasts::default();
        let mut view = BrowseView::new();
        view.add_species("wren", 1, &mut toasts);
        assert!(view.search(&client, &session, &mut toasts).await);
        assert!(!toasts.drain().iter().any(|x| x.message.contains("minimum count")));

        view.set_min_count(50);
        assert!(view.search(&client, &session, &mut toasts).await);
        assert_eq!(view.current_page().total_items, 4);
        let notices = toasts.drain();
        assert!(notices.iter().any(|x| x.level == NoticeLevel::Info && x.message.contains("minimum count 50 was not applied")));
    }

    #[tokio::test]
    async fn test_failed_search_keeps_previous_results() {
        let client = ApiClient::new(&serve(backend_router()).await);
        let session = Session::open(InMemorySessionStore::default()).await.unwrap();
        let mut toasts = Toasts::default();
        let mut view = BrowseView::new();
        view.load_fixtures();
        assert!(!view.search(&client, &session, &mut toasts).await);
        assert_eq!(view.results().len(), 4);
        assert_eq!(toasts.last().unwrap().level, NoticeLevel::Error);
    }
}
