use crate::error::Result;

/// Fetches the raw document the extractor reads its table from.
pub trait DocumentSource {
    /// Returns the document body for `locator` (a URL or a path, depending on the source).
    fn fetch(&self, locator: &str) -> Result<String>;
}

impl<T: DocumentSource + ?Sized> DocumentSource for &T {
    fn fetch(&self, locator: &str) -> Result<String> {
        (**self).fetch(locator)
    }
}

impl<T: DocumentSource + ?Sized> DocumentSource for Box<T> {
    fn fetch(&self, locator: &str) -> Result<String> {
        (**self).fetch(locator)
    }
}
