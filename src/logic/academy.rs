use serde::{Deserialize, Serialize};

/// Tags the academy index groups pages by.
pub const RECOGNIZED_TAGS: [&str; 4] = ["Ecosystem", "DeFi Series", "Tutorial", "Announcement"];

/// Catch-all filter: pages carrying none of the recognized tags.
pub const OTHERS_TAG: &str = "Others";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

impl Page {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn has_recognized_tag(&self) -> bool {
        self.tags.iter().any(|t| RECOGNIZED_TAGS.contains(&t.as_str()))
    }
}

/// Pages matching `tag`, in input order. `None` keeps every page.
pub fn filter_pages<'a>(pages: &'a [Page], tag: Option<&str>) -> Vec<&'a Page> {
    match tag {
        None => pages.iter().collect(),
        Some(OTHERS_TAG) => pages.iter().filter(|page| !page.has_recognized_tag()).collect(),
        Some(tag) => pages.iter().filter(|page| page.has_tag(tag)).collect(),
    }
}

/// Filter chips to show: recognized tags present in `pages`, then "Others"
/// if any page falls outside them.
pub fn available_tags(pages: &[Page]) -> Vec<&'static str> {
    let mut tags: Vec<&'static str> =
        RECOGNIZED_TAGS.iter().copied().filter(|tag| pages.iter().any(|page| page.has_tag(tag))).collect();
    if pages.iter().any(|page| !page.has_recognized_tag()) {
        tags.push(OTHERS_TAG);
    }
    tags
}
