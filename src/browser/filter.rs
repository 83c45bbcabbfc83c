//! Sub-resource blocking

use url::Url;

/// File extensions never worth downloading for a text scrape
pub const BLOCKED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "woff2", "pdf", "docx", "svg", "ttf", "css",
];

/// Browser resource categories, as far as blocking cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Image,
    Font,
    Script,
    Media,
    Xhr,
    Other,
}

/// Decides which sub-requests the page is allowed to make
#[derive(Debug, Clone)]
pub struct ResourceFilter {
    blocked_kinds: Vec<ResourceKind>,
    blocked_extensions: Vec<String>,
}

impl Default for ResourceFilter {
    fn default() -> Self {
        Self {
            blocked_kinds: vec![
                ResourceKind::Image,
                ResourceKind::Stylesheet,
                ResourceKind::Font,
            ],
            blocked_extensions: BLOCKED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ResourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the request must be aborted
    pub fn should_block(&self, url: &str, kind: ResourceKind) -> bool {
        self.blocked_kinds.contains(&kind) || self.has_blocked_extension(url)
    }

    fn has_blocked_extension(&self, url: &str) -> bool {
        let path = request_path(url);
        let file_name = path.rsplit('/').next().unwrap_or(&path);

        match file_name.rsplit_once('.') {
            Some((_, ext)) => self
                .blocked_extensions
                .iter()
                .any(|blocked| blocked.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// Path component of a request URL, without query or fragment
fn request_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}
