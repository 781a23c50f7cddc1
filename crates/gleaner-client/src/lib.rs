pub mod cleaner;
pub mod indeed;
pub mod proxy;

#[cfg(feature = "browser")]
pub mod browser;

pub use cleaner::HtmdCleaner;
pub use indeed::indeed_profile;
pub use proxy::{connection_from_env, resolve_connection};

#[cfg(feature = "browser")]
pub use browser::{ChromeBrowser, ChromePage, LaunchOptions};
