/// Credential collaborator polled before any run.
///
/// Token acquisition and refresh happen outside this crate; the engine only
/// asks whether a usable token is there right now.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;

    fn has_valid_token(&self) -> bool {
        self.access_token().is_some()
    }
}
