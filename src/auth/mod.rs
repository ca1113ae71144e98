// Authentication module
// Twitch credential store, grant exchanges and refresh sweep

mod grants;
mod manager;
mod store;
mod sweep;
mod types;

pub use grants::OAuthSettings;
pub use manager::AuthManager;
pub use store::TokenStore;
pub use sweep::{RefreshSweep, SweepOutcome};
pub use types::{Credential, GrantKind, TokenResponse, UserInfo};
