use url::form_urlencoded;

use crate::types::bookmark::ViewMode;

/// Client-visible URL state: current page and view mode, carried as
/// `page` / `view` query parameters so a reload or shared link reproduces
/// the same view. `page` is omitted when it equals 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteState {
    pub page: u32,
    pub view: ViewMode,
}

impl Default for RouteState {
    fn default() -> Self {
        Self {
            page: 1,
            view: ViewMode::Grid,
        }
    }
}

impl RouteState {
    /// Parses a query string (without the leading `?`). Unknown parameters
    /// are ignored; invalid or non-positive page numbers fall back to 1 and
    /// unknown view modes fall back to grid.
    pub fn from_query(query: &str) -> Self {
        let mut route = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "page" => {
                    if let Ok(page) = value.parse::<u32>() {
                        if page > 0 {
                            route.page = page;
                        }
                    }
                }
                "view" => route.view = ViewMode::parse_or_default(&value),
                _ => {}
            }
        }
        route
    }

    /// Serializes back to a query string (without the leading `?`).
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if self.page > 1 {
            serializer.append_pair("page", &self.page.to_string());
        }
        serializer.append_pair("view", self.view.as_str());
        serializer.finish()
    }
}
