//! Built-in community catalog.
//!
//! These entries are fixed at process start and never persisted. Custom
//! communities live in the remote store and are resolved by the client.

use crate::models::Community;
use crate::types::CommunityId;

struct CatalogEntry {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    color: &'static str,
    member_count: u64,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "happy",
        name: "Happy Vibes",
        description: "Share songs that make you smile and feel good",
        icon: "☀️",
        color: "bg-yellow-500",
        member_count: 12_500,
    },
    CatalogEntry {
        id: "sad",
        name: "Sad Songs",
        description: "For when you need to feel your feelings",
        icon: "🌧️",
        color: "bg-blue-500",
        member_count: 8_900,
    },
    CatalogEntry {
        id: "energetic",
        name: "High Energy",
        description: "Pump-up tracks and workout anthems",
        icon: "⚡",
        color: "bg-orange-500",
        member_count: 15_200,
    },
    CatalogEntry {
        id: "chill",
        name: "Chill Beats",
        description: "Relaxing music for studying, working, or unwinding",
        icon: "🌊",
        color: "bg-teal-500",
        member_count: 18_700,
    },
    CatalogEntry {
        id: "romantic",
        name: "Love Songs",
        description: "Music for the heart and soul",
        icon: "💕",
        color: "bg-pink-500",
        member_count: 9_800,
    },
    CatalogEntry {
        id: "angry",
        name: "Rage & Release",
        description: "Heavy, aggressive music to let it all out",
        icon: "🔥",
        color: "bg-red-500",
        member_count: 6_400,
    },
    CatalogEntry {
        id: "nostalgic",
        name: "Throwback Tracks",
        description: "Songs that take you back in time",
        icon: "⏰",
        color: "bg-purple-500",
        member_count: 11_300,
    },
    CatalogEntry {
        id: "party",
        name: "Party Mode",
        description: "Dance floor bangers and party starters",
        icon: "🎉",
        color: "bg-green-500",
        member_count: 14_600,
    },
];

impl CatalogEntry {
    fn to_community(&self) -> Community {
        Community {
            id: CommunityId::new(self.id),
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            color: self.color.to_string(),
            member_count: self.member_count,
            is_custom: false,
            created_by: None,
        }
    }
}

/// All built-in communities, in catalog order.
pub fn builtin_communities() -> Vec<Community> {
    CATALOG.iter().map(CatalogEntry::to_community).collect()
}

/// Look up a built-in community by id.
pub fn builtin_community(id: &str) -> Option<Community> {
    CATALOG
        .iter()
        .find(|entry| entry.id == id)
        .map(CatalogEntry::to_community)
}

pub fn is_builtin(id: &str) -> bool {
    CATALOG.iter().any(|entry| entry.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ids_unique() {
        let all = builtin_communities();
        let mut ids: Vec<_> = all.iter().map(|c| c.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), all.len());
    }

    #[test]
    fn test_lookup() {
        let chill = builtin_community("chill").unwrap();
        assert_eq!(chill.name, "Chill Beats");
        assert!(!chill.is_custom);
        assert!(builtin_community("focus-flow").is_none());
        assert!(is_builtin("party"));
    }
}
