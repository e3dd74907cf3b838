pub mod posts;
pub mod seed;

use std::path::Path;
use std::sync::Arc;

use secrets_feed::remote::{decode, table};
use secrets_feed::{
    Filter, Query, QuerySource, SecretsApp, SessionIdentity, TableBackend, UserProfile, Viewer,
};
use secrets_kv::RedbStore;
use tracing::info;

use crate::config::CliConfig;

/// An opened database plus the client core on top of it.
pub struct Session {
    pub backend: Arc<TableBackend>,
    pub identity: Arc<SessionIdentity>,
    pub app: SecretsApp,
}

impl Session {
    pub fn open(db: &Path, config: &CliConfig) -> anyhow::Result<Self> {
        if let Some(parent) = db.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = RedbStore::open(db)?;
        info!(db = %db.display(), "database opened");
        Ok(Self::over(Arc::new(TableBackend::new(Arc::new(store))), config))
    }

    pub fn over(backend: Arc<TableBackend>, config: &CliConfig) -> Self {
        let identity = Arc::new(SessionIdentity::anonymous());
        let app = SecretsApp::new(
            identity.clone(),
            backend.clone(),
            backend.clone(),
            config.feed.clone(),
        );
        Self {
            backend,
            identity,
            app,
        }
    }

    /// Sign in as the user with this id or handle.
    pub async fn sign_in(&self, who: &str) -> anyhow::Result<UserProfile> {
        let profile = find_user(self.backend.as_ref(), who)
            .await?
            .ok_or_else(|| anyhow::anyhow!("unknown user '{who}' (run `secrets seed` first?)"))?;
        self.identity.sign_in(Viewer::from_profile(&profile));
        Ok(profile)
    }
}

/// Look a user up by id, then by handle.
pub async fn find_user(source: &dyn QuerySource, who: &str) -> anyhow::Result<Option<UserProfile>> {
    for column in ["id", "handle"] {
        let rows = source
            .query(Query::table(table::USERS).filter(Filter::eq(column, who)).limit(1))
            .await?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(Some(decode(row)?));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use secrets_kv::MemoryStore;

    use super::*;

    async fn session() -> Session {
        let backend = Arc::new(TableBackend::new(Arc::new(MemoryStore::new())));
        seed::run(backend.as_ref(), 2, 0).await.unwrap();
        Session::over(backend, &CliConfig::default())
    }

    #[tokio::test]
    async fn sign_in_by_id_or_handle() {
        let s = session().await;
        let by_id = s.sign_in("u1").await.unwrap();
        let by_handle = s.sign_in(&seed::handle(1)).await.unwrap();
        assert_eq!(by_id, by_handle);
    }

    #[tokio::test]
    async fn unknown_user_is_an_error() {
        let s = session().await;
        let err = s.sign_in("nobody").await.unwrap_err();
        assert!(err.to_string().contains("unknown user"));
    }
}
