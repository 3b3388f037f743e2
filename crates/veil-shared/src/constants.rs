/// Application name
pub const APP_NAME: &str = "Veil";

/// Number of counted (participant-authored text) messages a chat needs
/// before either side may request a reveal. Deployments tune this via
/// `VEIL_REVEAL_THRESHOLD`.
pub const DEFAULT_REVEAL_THRESHOLD: u32 = 20;

/// Maximum text message length in characters
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Default page size for chat and message listings
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Hard cap on requested page sizes
pub const MAX_PAGE_SIZE: u32 = 200;

/// Length (in characters) of the last-message preview in the inbox
pub const PREVIEW_LEN: usize = 80;

/// Placeholder shown for soft-deleted messages when the deployment opts
/// into redacted placeholders instead of hiding them
pub const DELETED_PLACEHOLDER: &str = "[message deleted]";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
