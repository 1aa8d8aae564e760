pub mod app_names;
pub mod clip;
pub mod search_index;

pub use app_names::{AppNameLookup, AppNameResolver, DesktopEntryLookup};
pub use clip::{
    BlobRef, Capture, CaptureContent, ContentHash, ContentType, HistoryEntry, ResolvedContent,
};
pub use search_index::{SearchIndex, SearchMode};
