use crate::shared::descriptor::Descriptor;

pub type SearchError = Box<dyn std::error::Error + Send + Sync>;

/// One candidate sighting of the searched face.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchMatch {
    pub platform: String,
    pub username: String,
    pub post: String,
    /// Similarity in `0.0..=1.0`, higher is closer.
    pub similarity: f64,
}

impl SearchMatch {
    pub fn new(
        platform: impl Into<String>,
        username: impl Into<String>,
        post: impl Into<String>,
        similarity: f64,
    ) -> Self {
        Self {
            platform: platform.into(),
            username: username.into(),
            post: post.into(),
            similarity,
        }
    }
}

/// Domain interface for looking up where a set of face descriptors appears.
pub trait FaceSearch: Send + Sync {
    fn search(&self, descriptors: &[Descriptor]) -> Result<Vec<SearchMatch>, SearchError>;
}
