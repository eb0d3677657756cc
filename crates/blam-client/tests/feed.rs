mod common;

use std::sync::Arc;
use std::time::Duration;

use blam_client::config::ClientConfig;
use blam_client::BlamClient;
use blam_shared::{CommunityId, VoteType};
use blam_store::{Filter, RemoteStore, SqliteStore, Table};

use common::{insert_post, seed, sqlite, FaultyStore, Harness, NoSearch, Op, JO, MIRA};

async fn client(store: Arc<dyn RemoteStore>) -> BlamClient {
    let config = ClientConfig {
        reload_coalesce: Duration::from_millis(10),
        ..ClientConfig::default()
    };
    BlamClient::start_with_search(store, config, Arc::new(NoSearch))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_posts_by_deleted_author_are_hidden() {
    let store = sqlite();
    let seed = seed(store.as_ref()).await;
    let mira_post = insert_post(store.as_ref(), seed.mira, "still here", 1, 0).await;
    let h = Harness::new(store.clone());
    h.reload().await;
    assert_eq!(h.feed.all_posts().len(), 2);

    store
        .delete(Table::Users, &Filter::all().eq("id", seed.jo.to_string()))
        .await
        .unwrap();
    h.reload().await;

    let posts = h.feed.all_posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, mira_post);
}

#[tokio::test]
async fn test_failed_reload_keeps_last_known_state() {
    let sqlite = sqlite();
    seed(sqlite.as_ref()).await;
    let faulty = Arc::new(FaultyStore::new(sqlite.clone()));
    let h = Harness::new(faulty.clone());
    h.reload().await;
    let version = h.feed.version();

    faulty.fail(Op::Query, Table::Comments);
    let result = h.feed.reload(faulty.as_ref(), None).await;
    assert!(result.is_err());
    assert_eq!(h.feed.all_posts().len(), 1);
    assert_eq!(h.feed.version(), version);
}

#[tokio::test]
async fn test_remote_change_reaches_feed() {
    let store = sqlite();
    let seed = seed(store.as_ref()).await;
    let client = client(store.clone()).await;
    assert_eq!(client.feed().all_posts().len(), 1);

    let mut versions = client.feed().subscribe();
    let remote = insert_post(store.as_ref(), seed.jo, "from another device", 0, 0).await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while client.feed().post_by_id(remote).is_none() {
            versions.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    client.shutdown().await;
}

#[tokio::test]
async fn test_switching_user_replaces_votes_and_memberships() {
    let store = sqlite();
    let seed = seed(store.as_ref()).await;
    let client = client(store.clone()).await;

    client.sign_in(MIRA).await.unwrap();
    client
        .memberships()
        .join(&CommunityId::from("chill"))
        .await
        .unwrap();
    client
        .votes()
        .cast_vote(seed.post, VoteType::Up)
        .await
        .unwrap();
    assert!(client.memberships().is_member("chill"));

    client.sign_out().await;
    assert!(client.memberships().joined().is_empty());
    assert_eq!(client.feed().post_by_id(seed.post).unwrap().user_vote, None);

    client.sign_in(JO).await.unwrap();
    assert!(!client.memberships().is_member("chill"));
    assert_eq!(client.feed().post_by_id(seed.post).unwrap().user_vote, None);

    client.sign_in(MIRA).await.unwrap();
    assert!(client.memberships().is_member("chill"));
    assert_eq!(
        client.feed().post_by_id(seed.post).unwrap().user_vote,
        Some(VoteType::Up)
    );

    client.shutdown().await;
}

#[tokio::test]
async fn test_profile_update_refreshes_author_snapshots() {
    let store = sqlite();
    let seed = seed(store.as_ref()).await;
    let client = client(store.clone()).await;

    client.sign_in(JO).await.unwrap();
    client
        .update_profile(Some("jo_beats"), None)
        .await
        .unwrap();

    let post = client.feed().post_by_id(seed.post).unwrap();
    assert_eq!(post.user.username, "jo_beats");
    assert_eq!(post.score(), 39);

    client.shutdown().await;
}

#[tokio::test]
async fn test_state_survives_reopening_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blam.db");

    {
        let store: Arc<dyn RemoteStore> = Arc::new(SqliteStore::open_at(&path).unwrap());
        seed(store.as_ref()).await;
        let client = client(store).await;
        client.sign_in(MIRA).await.unwrap();
        client
            .memberships()
            .join(&CommunityId::from("party"))
            .await
            .unwrap();
        client.shutdown().await;
    }

    let client = client(Arc::new(SqliteStore::open_at(&path).unwrap())).await;
    assert_eq!(client.feed().all_posts().len(), 1);
    client.sign_in(MIRA).await.unwrap();
    assert!(client.memberships().is_member("party"));
    client.shutdown().await;
}
