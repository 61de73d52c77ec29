use std::fmt;

/// A user-supplied photo as it arrived: undecoded bytes plus the declared
/// filename. Dimensions are unknown until the normalizer decodes it.
#[derive(Clone)]
pub struct SourceImage {
    name: String,
    bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Raw bytes are noise in logs and test failures.
impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
