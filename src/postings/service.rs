use async_trait::async_trait;
use tracing::info;

use super::PostingStatus;
use crate::auth::User;
use crate::error::{ApiError, ApiResult};

/// Marker carried by each posting variant.
pub trait PostingVariant: Sized + Send + Sync + Unpin {
    /// Variant fields supplied at creation, before owner stamping.
    type New: Send;

    /// Human-readable noun for log and error messages.
    const KIND: &'static str;
}

/// Persistence contract for one posting variant. `PgPool` implements it
/// once per variant with that variant's SQL; the workflow below is written
/// once against this seam, so tests can drive it with an in-memory store.
#[async_trait]
pub trait PostingStore<P: PostingVariant>: Send + Sync {
    async fn insert(&self, owner: &User, new: P::New) -> anyhow::Result<i32>;
    async fn list_all(&self) -> anyhow::Result<Vec<P>>;
    async fn delete_by_owner(&self, owner_id: i32) -> anyhow::Result<u64>;
    async fn owner_of(&self, id: i32) -> anyhow::Result<Option<i32>>;
    async fn delete_by_id(&self, id: i32) -> anyhow::Result<bool>;
    async fn set_status(&self, id: i32, status: PostingStatus)
        -> anyhow::Result<Option<P>>;
}

/// Stamps the authenticated owner (id + display-name snapshot) onto the new
/// record; status starts at Pending.
pub async fn create<P, S>(store: &S, actor: &User, new: P::New) -> ApiResult<i32>
where
    P: PostingVariant,
    S: PostingStore<P> + ?Sized,
{
    let id = store.insert(actor, new).await?;
    info!(kind = P::KIND, %id, owner = actor.id, "posting created");
    Ok(id)
}

/// Every posting of the variant, unfiltered, in insertion order. An empty
/// set is reported as NotFound; clients rely on that contract.
pub async fn list_all<P, S>(store: &S) -> ApiResult<Vec<P>>
where
    P: PostingVariant,
    S: PostingStore<P> + ?Sized,
{
    let postings = store.list_all().await?;
    if postings.is_empty() {
        return Err(ApiError::NotFound("No food requests found".into()));
    }
    Ok(postings)
}

/// Deletes everything the actor owns, in a single statement. NotFound when
/// the actor owns nothing.
pub async fn delete_owned<P, S>(store: &S, actor: &User) -> ApiResult<u64>
where
    P: PostingVariant,
    S: PostingStore<P> + ?Sized,
{
    let deleted = store.delete_by_owner(actor.id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(
            "No food requests found for this user".into(),
        ));
    }
    info!(kind = P::KIND, owner = actor.id, deleted, "owned postings deleted");
    Ok(deleted)
}

/// Single-item deletion is owner-only. Moderation (accept/reject) is open
/// to any authenticated user, deletion of someone else's posting is not.
pub async fn delete_one<P, S>(store: &S, actor: &User, id: i32) -> ApiResult<()>
where
    P: PostingVariant,
    S: PostingStore<P> + ?Sized,
{
    let owner_id = store
        .owner_of(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food request not found".into()))?;

    if owner_id != actor.id {
        return Err(ApiError::Forbidden(
            "Not authorized to delete this food request".into(),
        ));
    }

    if !store.delete_by_id(id).await? {
        // deleted between the owner check and here
        return Err(ApiError::NotFound("Food request not found".into()));
    }
    info!(kind = P::KIND, %id, "posting deleted");
    Ok(())
}

/// Unconditional overwrite, last write wins; no ordering between Accepted
/// and Rejected. Requires an authenticated caller (any user may moderate).
pub async fn set_status<P, S>(
    store: &S,
    actor: &User,
    id: i32,
    status: PostingStatus,
) -> ApiResult<P>
where
    P: PostingVariant,
    S: PostingStore<P> + ?Sized,
{
    let updated = store
        .set_status(id, status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food request not found".into()))?;
    info!(kind = P::KIND, %id, ?status, moderator = actor.id, "status set");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct FakePosting {
        id: i32,
        owner_id: i32,
        owner_name: String,
        details: String,
        status: PostingStatus,
    }

    impl PostingVariant for FakePosting {
        type New = String;

        const KIND: &'static str = "fake";
    }

    #[derive(Default)]
    struct MemStore {
        rows: Mutex<Vec<FakePosting>>,
        next_id: Mutex<i32>,
    }

    #[async_trait]
    impl PostingStore<FakePosting> for MemStore {
        async fn insert(&self, owner: &User, new: String) -> anyhow::Result<i32> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let id = *next;
            self.rows.lock().unwrap().push(FakePosting {
                id,
                owner_id: owner.id,
                owner_name: owner.name.clone(),
                details: new,
                status: PostingStatus::Pending,
            });
            Ok(id)
        }

        async fn list_all(&self) -> anyhow::Result<Vec<FakePosting>> {
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn delete_by_owner(&self, owner_id: i32) -> anyhow::Result<u64> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|p| p.owner_id != owner_id);
            Ok((before - rows.len()) as u64)
        }

        async fn owner_of(&self, id: i32) -> anyhow::Result<Option<i32>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.owner_id))
        }

        async fn delete_by_id(&self, id: i32) -> anyhow::Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|p| p.id != id);
            Ok(rows.len() < before)
        }

        async fn set_status(
            &self,
            id: i32,
            status: PostingStatus,
        ) -> anyhow::Result<Option<FakePosting>> {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows.iter_mut().find(|p| p.id == id).map(|p| {
                p.status = status;
                p.clone()
            }))
        }
    }

    fn user(id: i32, name: &str) -> User {
        User {
            id,
            name: name.into(),
            email: format!("{name}@x.com"),
            phone: "555".into(),
            password_hash: "$argon2id$irrelevant".into(),
        }
    }

    #[tokio::test]
    async fn create_stamps_owner_and_starts_pending() {
        let store = MemStore::default();
        let alice = user(1, "alice");
        let id = create::<FakePosting, _>(&store, &alice, "rice".into())
            .await
            .unwrap();
        let all = list_all::<FakePosting, _>(&store).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].owner_id, 1);
        assert_eq!(all[0].owner_name, "alice");
        assert_eq!(all[0].status, PostingStatus::Pending);
    }

    #[tokio::test]
    async fn list_all_of_empty_store_is_not_found() {
        let store = MemStore::default();
        let err = list_all::<FakePosting, _>(&store).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_owned_removes_exactly_the_actors_postings() {
        let store = MemStore::default();
        let alice = user(1, "alice");
        let bob = user(2, "bob");
        create::<FakePosting, _>(&store, &alice, "a1".into()).await.unwrap();
        create::<FakePosting, _>(&store, &bob, "b1".into()).await.unwrap();
        create::<FakePosting, _>(&store, &alice, "a2".into()).await.unwrap();

        let deleted = delete_owned::<FakePosting, _>(&store, &alice).await.unwrap();
        assert_eq!(deleted, 2);

        let remaining = list_all::<FakePosting, _>(&store).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].owner_id, 2);
        assert_eq!(remaining[0].details, "b1");
    }

    #[tokio::test]
    async fn delete_owned_with_nothing_owned_is_not_found() {
        let store = MemStore::default();
        let bob = user(2, "bob");
        create::<FakePosting, _>(&store, &bob, "b1".into()).await.unwrap();

        let err = delete_owned::<FakePosting, _>(&store, &user(1, "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        // bob's posting is untouched
        assert_eq!(list_all::<FakePosting, _>(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_one_is_owner_only() {
        let store = MemStore::default();
        let alice = user(1, "alice");
        let bob = user(2, "bob");
        let id = create::<FakePosting, _>(&store, &alice, "a1".into())
            .await
            .unwrap();

        let err = delete_one::<FakePosting, _>(&store, &bob, id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert_eq!(list_all::<FakePosting, _>(&store).await.unwrap().len(), 1);

        delete_one::<FakePosting, _>(&store, &alice, id).await.unwrap();
        let err = list_all::<FakePosting, _>(&store).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_one_of_missing_id_is_not_found_and_store_unchanged() {
        let store = MemStore::default();
        let alice = user(1, "alice");
        create::<FakePosting, _>(&store, &alice, "a1".into()).await.unwrap();

        let err = delete_one::<FakePosting, _>(&store, &alice, 999)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(list_all::<FakePosting, _>(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn accept_then_reject_ends_rejected() {
        let store = MemStore::default();
        let alice = user(1, "alice");
        let bob = user(2, "bob");
        let id = create::<FakePosting, _>(&store, &alice, "a1".into())
            .await
            .unwrap();

        // any authenticated user may moderate, not just the owner
        let accepted =
            set_status::<FakePosting, _>(&store, &bob, id, PostingStatus::Accepted)
                .await
                .unwrap();
        assert_eq!(accepted.status, PostingStatus::Accepted);

        let rejected =
            set_status::<FakePosting, _>(&store, &bob, id, PostingStatus::Rejected)
                .await
                .unwrap();
        assert_eq!(rejected.status, PostingStatus::Rejected);

        let all = list_all::<FakePosting, _>(&store).await.unwrap();
        assert_eq!(all[0].status, PostingStatus::Rejected);
    }

    #[tokio::test]
    async fn set_status_of_missing_id_is_not_found() {
        let store = MemStore::default();
        let err = set_status::<FakePosting, _>(
            &store,
            &user(1, "alice"),
            404,
            PostingStatus::Accepted,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
