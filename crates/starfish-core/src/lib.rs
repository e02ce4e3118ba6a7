pub mod error;
pub mod list;
pub mod payload;
pub mod resource;
pub mod result;
pub mod time;

pub use error::{PayloadError, Result};
pub use list::parse_list;
pub use payload::{RangeEntry, Site, SiteDetailsPayload, SiteResult, ValidRange};
pub use resource::ResourceType;
pub use result::{ResourceErrorKind, ResourceMeta, ResourceResult};
pub use time::{SyncTimestamp, now_utc};
