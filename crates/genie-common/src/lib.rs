pub mod errors;
pub mod id;
pub mod notifications;

pub use errors::{ConfigError, GenieError};
pub use id::{new_correlation_id, new_id, SessionKey};
pub use notifications::{Notification, NotificationLevel, NotificationQueue, NotificationSink};

pub type Result<T> = std::result::Result<T, GenieError>;
