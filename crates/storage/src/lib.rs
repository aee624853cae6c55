//! Persistence for the CDI map services.
//!
//! One SQLite database holds:
//! - users and their API tokens
//! - administrative regions
//! - publications (soft-deleted, never removed)
//! - reviews and their suggestions
//! - the background job table

pub mod administrations;
pub mod jobs;
pub mod publications;
pub mod reviews;
pub mod store;
pub mod users;

pub use administrations::Administration;
pub use jobs::{Job, JobStatus, JobType};
pub use publications::{NewPublication, Publication};
pub use reviews::{OverdueReview, Review};
pub use store::{Page, Store, PAGE_SIZE};
pub use users::{NewUser, Role, User};
