//! Merged community lookup: the built-in catalog first, then the custom
//! communities held by the feed projection.

use std::sync::Arc;

use blam_shared::catalog::is_builtin;
use blam_shared::{builtin_communities, builtin_community, Community};

use crate::projection::FeedProjection;

#[derive(Clone)]
pub struct CommunityDirectory {
    feed: Arc<FeedProjection>,
}

impl CommunityDirectory {
    pub fn new(feed: Arc<FeedProjection>) -> Self {
        Self { feed }
    }

    /// A built-in id always resolves to the catalog entry, even if a custom
    /// community with the same id exists.
    pub fn resolve(&self, id: &str) -> Option<Community> {
        builtin_community(id).or_else(|| self.feed.community_by_id(id))
    }

    /// Built-ins followed by custom communities, without id collisions.
    pub fn all(&self) -> Vec<Community> {
        let mut out = builtin_communities();
        out.extend(
            self.feed
                .custom_communities()
                .into_iter()
                .filter(|c| !is_builtin(c.id.as_str())),
        );
        out
    }
}
