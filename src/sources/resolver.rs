use crate::error::SyncError;
use crate::sources::forge::{Forge, RepoRef};
use crate::sources::registry::{RevisionSpec, SourceRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRevision {
    pub repo: RepoRef,
    pub revision: String,
    pub floating: bool,
}

/// Pinned revisions come back untouched without touching the network;
/// `latest` asks the forge for the default branch and then its tip.
pub fn resolve(record: &SourceRecord, forge: &dyn Forge) -> Result<ResolvedRevision, SyncError> {
    let repo = forge.parse_repo(&record.repo)?;
    match record.revision_spec() {
        RevisionSpec::Pinned(sha) => Ok(ResolvedRevision {
            repo,
            revision: sha.to_string(),
            floating: false,
        }),
        RevisionSpec::Latest => {
            let branch = forge.default_branch(&repo)?;
            let revision = forge.branch_tip(&repo, &branch)?;
            tracing::debug!(repo = %repo.slug(), %branch, %revision, "resolved latest");
            Ok(ResolvedRevision {
                repo,
                revision,
                floating: true,
            })
        }
    }
}
