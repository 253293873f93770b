/// Client-side router used for redirects.
pub trait Navigator: Send + Sync + 'static {
    /// Replace the current location with `path`.
    fn navigate(&self, path: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn navigate(&self, path: &str) {
        self(path)
    }
}
