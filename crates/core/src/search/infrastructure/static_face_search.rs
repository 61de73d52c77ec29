use crate::search::domain::face_search::{FaceSearch, SearchError, SearchMatch};
use crate::shared::descriptor::Descriptor;

/// Fixed-result search backend used until a real index exists.
///
/// Any non-empty descriptor set yields the same three matches; an empty set
/// yields none.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticFaceSearch;

impl StaticFaceSearch {
    pub fn new() -> Self {
        Self
    }

    fn canned_matches() -> Vec<SearchMatch> {
        vec![
            SearchMatch::new("Twitter", "@example1", "Saw this person at the park.", 0.95),
            SearchMatch::new("Facebook", "John Doe", "Family reunion photo.", 0.88),
            SearchMatch::new("Instagram", "@user2", "Vacation pic.", 0.92),
        ]
    }
}

impl FaceSearch for StaticFaceSearch {
    fn search(&self, descriptors: &[Descriptor]) -> Result<Vec<SearchMatch>, SearchError> {
        if descriptors.is_empty() {
            return Ok(Vec::new());
        }
        log::debug!("Searching with {} descriptors", descriptors.len());
        Ok(Self::canned_matches())
    }
}
