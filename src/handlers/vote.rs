use crate::client::VoteBackend;
use crate::db::{new_session_id, FlagStore, SESSION_KEY, USER_VOTED_KEY};
use crate::error::{Error, Result};
use crate::models::{Rating, VoteSubmission};
use chrono::Utc;
use log::{error, info};
use std::sync::Arc;

/// Submits votes and remembers locally that this client has voted.
pub struct VoteManager {
    backend: Arc<dyn VoteBackend>,
    store: Arc<dyn FlagStore>,
}

impl VoteManager {
    pub fn new(backend: Arc<dyn VoteBackend>, store: Arc<dyn FlagStore>) -> Self {
        Self { backend, store }
    }

    pub async fn has_voted(&self) -> Result<bool> {
        Ok(self.store.get(USER_VOTED_KEY).await?.as_deref() == Some("true"))
    }

    // Get or create session ID
    pub async fn session_id(&self) -> Result<String> {
        if let Some(existing) = self.store.get(SESSION_KEY).await? {
            return Ok(existing);
        }
        let session_id = new_session_id();
        self.store.set(SESSION_KEY, &session_id).await?;
        info!("Created new voting session {}", session_id);
        Ok(session_id)
    }

    /// Send a vote for this client. Refuses without touching the network when
    /// the local "has voted" flag is already set; only a successful
    /// submission sets it.
    pub async fn submit_vote(&self, rating: Rating) -> Result<()> {
        if self.has_voted().await? {
            info!("User has already voted");
            return Err(Error::AlreadyVoted);
        }

        let submission = VoteSubmission::new(rating, self.session_id().await?, Utc::now());

        if let Err(e) = self.backend.submit_vote(&submission).await {
            error!("Error submitting vote: {}", e);
            return Err(e);
        }

        self.store.set(USER_VOTED_KEY, "true").await?;
        info!("Vote submitted successfully ({} - {})", rating, rating.name());
        Ok(())
    }

    // Development aid: forget that this client voted
    pub async fn reset_vote_status(&self) -> Result<()> {
        self.store.remove(USER_VOTED_KEY).await?;
        info!("Vote status reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryFlagStore;
    use crate::models::VoteTally;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingBackend {
        reject: AtomicBool,
        submissions: Mutex<Vec<VoteSubmission>>,
    }

    impl RecordingBackend {
        fn submissions(&self) -> Vec<VoteSubmission> {
            self.submissions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VoteBackend for RecordingBackend {
        async fn submit_vote(&self, submission: &VoteSubmission) -> Result<()> {
            self.submissions.lock().unwrap().push(submission.clone());
            if self.reject.load(Ordering::SeqCst) {
                return Err(Error::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
            }
            Ok(())
        }

        async fn fetch_results(&self) -> Result<VoteTally> {
            Ok(VoteTally::new())
        }
    }

    fn manager() -> (VoteManager, Arc<RecordingBackend>, Arc<MemoryFlagStore>) {
        let backend = Arc::new(RecordingBackend::default());
        let store = Arc::new(MemoryFlagStore::new());
        (VoteManager::new(backend.clone(), store.clone()), backend, store)
    }

    #[tokio::test]
    async fn successful_vote_sets_the_flag() {
        let (votes, backend, _store) = manager();
        assert!(!votes.has_voted().await.unwrap());

        votes.submit_vote(Rating::new(4).unwrap()).await.unwrap();

        assert!(votes.has_voted().await.unwrap());
        let sent = backend.submissions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].rating.value(), 4);
        assert_eq!(sent[0].session_id, votes.session_id().await.unwrap());
        assert!(sent[0].timestamp.ends_with('Z'));
    }

    #[tokio::test]
    async fn already_voted_skips_the_network() {
        let (votes, backend, store) = manager();
        store.set(USER_VOTED_KEY, "true").await.unwrap();

        let result = votes.submit_vote(Rating::new(2).unwrap()).await;

        assert!(matches!(result, Err(Error::AlreadyVoted)));
        assert!(backend.submissions().is_empty());
    }

    #[tokio::test]
    async fn failed_vote_leaves_flag_unset() {
        let (votes, backend, _store) = manager();
        backend.reject.store(true, Ordering::SeqCst);

        let result = votes.submit_vote(Rating::new(5).unwrap()).await;

        assert!(matches!(result, Err(ref e) if e.is_transport()));
        assert!(!votes.has_voted().await.unwrap());

        // Retrying after the backend recovers goes through
        backend.reject.store(false, Ordering::SeqCst);
        votes.submit_vote(Rating::new(5).unwrap()).await.unwrap();
        assert_eq!(backend.submissions().len(), 2);
    }

    #[tokio::test]
    async fn session_id_is_created_once() {
        let (votes, _backend, store) = manager();
        let first = votes.session_id().await.unwrap();
        let second = votes.session_id().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.get(SESSION_KEY).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn reset_allows_voting_again() {
        let (votes, backend, _store) = manager();
        votes.submit_vote(Rating::new(1).unwrap()).await.unwrap();
        votes.reset_vote_status().await.unwrap();

        assert!(!votes.has_voted().await.unwrap());
        votes.submit_vote(Rating::new(3).unwrap()).await.unwrap();
        assert_eq!(backend.submissions().len(), 2);
    }
}
