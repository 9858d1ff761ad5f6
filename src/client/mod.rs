//! Client-side data synchronization: a deduplicating fetcher, per-journal
//! resource handles, optimistic appends, and a coalescing preloader.

pub mod fetcher;
pub mod journal_data;
pub mod optimistic;
pub mod preload;

pub use fetcher::{FetchError, FetchFn, Fetcher};
pub use journal_data::{JournalData, JournalSnapshot, ResourceSnapshot};
pub use optimistic::{MutationPhase, OptimisticAppend};
pub use preload::Preloader;
