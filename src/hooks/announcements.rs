//! Latest announcements, live.

use super::{Hook, QueryFamily, DEFAULT_MAX_RESULTS};
use crate::models::Announcement;
use crate::query::{QueryBuilder, QuerySpec};
use crate::subscription::Mode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnouncementParams {
    /// Defaults to `DEFAULT_MAX_RESULTS`
    pub max_results: Option<usize>,
}

impl AnnouncementParams {
    pub fn with_max_results(max_results: usize) -> Self {
        Self {
            max_results: Some(max_results),
        }
    }
}

pub struct Announcements;

impl QueryFamily for Announcements {
    type Params = AnnouncementParams;
    type Entity = Announcement;
    const MODE: Mode = Mode::Live;

    fn build(params: &Self::Params) -> Option<QuerySpec> {
        Some(QueryBuilder::announcements(
            params.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        ))
    }
}

pub type AnnouncementsHook<S> = Hook<S, Announcements>;
