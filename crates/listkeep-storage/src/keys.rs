//! Storage key constants.

/// Keys used in secure storage.
pub struct StorageKeys;

impl StorageKeys {
    /// Provider ID token used to authenticate data store requests
    pub const ID_TOKEN: &'static str = "listkeep_id_token";
    /// Provider refresh token
    pub const REFRESH_TOKEN: &'static str = "listkeep_refresh_token";
    /// Session metadata (JSON: user_id, email, expires_at)
    pub const SESSION_META: &'static str = "listkeep_session_meta";
}
