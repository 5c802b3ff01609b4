use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::ProfileSet;
use crate::error::SyncError;
use crate::page::PageReference;
use crate::profile::ServerProfile;
use crate::transport::{FormPoster, PmWikiTransport, PushOutcome};

/// One command per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    Pull,
    /// Replace the remote page with the content of a local file.
    Push { file: PathBuf },
    Edit,
    Delete,
}

impl SyncCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Push { .. } => "push",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Pulled,
    Pushed(PushOutcome),
    /// Delete confirmation was not given.
    Aborted,
}

impl SyncOutcome {
    pub fn message(self) -> &'static str {
        match self {
            Self::Pulled => "pulled",
            Self::Pushed(PushOutcome::Written) => "written",
            Self::Pushed(PushOutcome::Unchanged) => "aborting write: you didn't make any changes",
            Self::Pushed(PushOutcome::AlreadyMissing) => "page was already missing on the server",
            Self::Aborted => "deletion aborted",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub command: String,
    pub profile: String,
    pub page: String,
    pub url: String,
    pub outcome: SyncOutcome,
    pub cache_file: Option<String>,
    pub request_count: usize,
}

/// The steps a person performs outside the sync protocol.
pub trait UserActions {
    /// Hand `seed` to an editor and return the edited text.
    fn edit_text(&mut self, page: &PageReference, seed: &str) -> Result<String, SyncError>;
    fn confirm_delete(&mut self, page: &PageReference) -> Result<bool, SyncError>;
}

impl<T: UserActions + ?Sized> UserActions for &mut T {
    fn edit_text(&mut self, page: &PageReference, seed: &str) -> Result<String, SyncError> {
        (**self).edit_text(page, seed)
    }

    fn confirm_delete(&mut self, page: &PageReference) -> Result<bool, SyncError> {
        (**self).confirm_delete(page)
    }
}

pub fn new_page_seed(page: &PageReference) -> String {
    format!(
        "(:comment {} is a new page, save as empty to abort:)",
        page.qualified_name
    )
}

/// Configured profile names. Needs no transport.
pub fn list_profiles(profiles: &ProfileSet) -> Vec<String> {
    profiles.names()
}

/// Outcome of one command plus the local file it wrote, if any.
type StepResult = Result<(SyncOutcome, Option<PathBuf>), SyncError>;

pub struct Orchestrator<'a, P: FormPoster, U: UserActions> {
    profile: &'a ServerProfile,
    transport: PmWikiTransport<P>,
    user: U,
}

impl<'a, P: FormPoster, U: UserActions> Orchestrator<'a, P, U> {
    pub fn new(profile: &'a ServerProfile, transport: PmWikiTransport<P>, user: U) -> Self {
        Self {
            profile,
            transport,
            user,
        }
    }

    pub fn run(
        &mut self,
        page: &PageReference,
        command: &SyncCommand,
    ) -> Result<SyncReport, SyncError> {
        let (outcome, cache_file) = match command {
            SyncCommand::Pull => self.pull(page)?,
            SyncCommand::Push { file } => self.push_file(page, file)?,
            SyncCommand::Edit => self.edit(page)?,
            SyncCommand::Delete => self.delete(page)?,
        };
        Ok(SyncReport {
            command: command.name().to_string(),
            profile: self.profile.name.clone(),
            page: page.qualified_name.clone(),
            url: page.resolved_url.clone(),
            outcome,
            cache_file: cache_file.map(|path| path.display().to_string()),
            request_count: self.transport.request_count(),
        })
    }

    fn pull(&mut self, page: &PageReference) -> StepResult {
        info!("pulling {} ({})", page.qualified_name, page.resolved_url);
        let text = self.transport.pull(page)?;
        let path = self.transport.cache().save(page, &text)?;
        info!("saved to {}", path.display());
        Ok((SyncOutcome::Pulled, Some(path)))
    }

    fn push_file(&mut self, page: &PageReference, file: &Path) -> StepResult {
        info!("pushing {} ({})", page.qualified_name, page.resolved_url);
        let new = self.transport.cache().read(file)?;
        let kept = self.keep_copy(page, &new)?;
        let outcome = self.transport.push(page, "", &new)?;
        Ok((SyncOutcome::Pushed(outcome), kept))
    }

    fn edit(&mut self, page: &PageReference) -> StepResult {
        info!("editing {} ({})", page.qualified_name, page.resolved_url);
        let old = self.transport.pull(page)?;
        let seed = if old.is_empty() {
            info!("new page: {}", page.qualified_name);
            new_page_seed(page)
        } else {
            old.clone()
        };
        let new = self.user.edit_text(page, &seed)?;
        let kept = self.keep_copy(page, &new)?;
        let outcome = self.transport.push(page, &old, &new)?;
        Ok((SyncOutcome::Pushed(outcome), kept))
    }

    fn delete(&mut self, page: &PageReference) -> StepResult {
        if !self.user.confirm_delete(page)? {
            return Ok((SyncOutcome::Aborted, None));
        }
        info!("deleting {} ({})", page.qualified_name, page.resolved_url);
        let outcome = self.transport.delete(page)?;
        Ok((SyncOutcome::Pushed(outcome), None))
    }

    fn keep_copy(&self, page: &PageReference, text: &str) -> Result<Option<PathBuf>, SyncError> {
        if !self.profile.keep_local_copy {
            return Ok(None);
        }
        let path = self.transport.cache().save(page, text)?;
        info!("kept a local copy in {}", path.display());
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::cache::LocalCache;
    use crate::config::Settings;
    use crate::error::{RequestFailure, TransportError};
    use crate::profile::{KEY_DELETE_WORD, KEY_KEEP, KEY_URL, resolve_profile};
    use crate::test_support::{MockPoster, page, profile, settings};
    use crate::transport::FormResponse;

    #[derive(Default)]
    struct ScriptedUser {
        edited: Option<String>,
        confirm: bool,
        seeds: Vec<String>,
        confirmations_asked: usize,
    }

    impl UserActions for ScriptedUser {
        fn edit_text(&mut self, _page: &PageReference, seed: &str) -> Result<String, SyncError> {
            self.seeds.push(seed.to_string());
            Ok(self.edited.clone().unwrap_or_else(|| seed.to_string()))
        }

        fn confirm_delete(&mut self, _page: &PageReference) -> Result<bool, SyncError> {
            self.confirmations_asked += 1;
            Ok(self.confirm)
        }
    }

    fn profile_from(settings: Settings) -> ServerProfile {
        resolve_profile(&ProfileSet::new().with("test", settings), None).expect("resolve")
    }

    #[test]
    fn pull_caches_remote_text() {
        let temp = tempdir().expect("tempdir");
        let profile = profile(None);
        let page = page(&profile, "Main.Home");
        let mut poster = MockPoster::with_responses(vec![Ok(FormResponse::ok("(:title Home:)\n"))]);
        let mut user = ScriptedUser::default();
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let report = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Pull)
            .expect("pull");

        assert_eq!(report.outcome, SyncOutcome::Pulled);
        assert_eq!(report.request_count, 1);
        let cache_file = temp.path().join("Main.Home.pmwiki");
        assert_eq!(report.cache_file, Some(cache_file.display().to_string()));
        assert_eq!(
            fs::read_to_string(cache_file).expect("read cache"),
            "(:title Home:)\n"
        );
    }

    #[test]
    fn pull_behind_auth_wall_writes_nothing() {
        let temp = tempdir().expect("tempdir");
        let profile = profile(None);
        let page = page(&profile, "Main.Home");
        let mut poster =
            MockPoster::with_responses(vec![Ok(FormResponse::ok("<!DOCTYPE html><html>"))]);
        let mut user = ScriptedUser::default();
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let error = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Pull)
            .expect_err("auth wall");
        assert!(matches!(
            error,
            SyncError::Transport(TransportError::AuthRequired { .. })
        ));
        assert!(!temp.path().join("Main.Home.pmwiki").exists());
    }

    #[test]
    fn pull_of_non_utf8_page_writes_nothing() {
        let temp = tempdir().expect("tempdir");
        let profile = profile(None);
        let page = page(&profile, "Main.Cafe");
        let mut poster =
            MockPoster::with_responses(vec![Ok(FormResponse::ok(b"caf\xE9\n".to_vec()))]);
        let mut user = ScriptedUser::default();
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let error = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Pull)
            .expect_err("undecodable page");
        assert!(matches!(
            error,
            SyncError::Transport(TransportError::NotUtf8 { .. })
        ));
        assert!(!temp.path().join("Main.Cafe.pmwiki").exists());
    }

    #[test]
    fn push_from_file_replaces_remote_page() {
        let temp = tempdir().expect("tempdir");
        let profile = profile(None);
        let source = temp.path().join("Main.Home.pmwiki");
        fs::write(&source, "local body").expect("write source");
        let page = page(&profile, "Main.Home.pmwiki");
        let mut poster = MockPoster::with_responses(vec![Ok(FormResponse::ok(""))]);
        let mut user = ScriptedUser::default();
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let report = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Push { file: source })
            .expect("push");

        assert_eq!(report.outcome, SyncOutcome::Pushed(PushOutcome::Written));
        assert_eq!(poster.requests.len(), 1);
        assert_eq!(poster.requests[0].field("n"), Some("Main.Home"));
        assert_eq!(poster.requests[0].field("text"), Some("local body"));
    }

    #[test]
    fn push_of_empty_file_is_unchanged() {
        let temp = tempdir().expect("tempdir");
        let profile = profile(None);
        let source = temp.path().join("Main.Home.pmwiki");
        fs::write(&source, "").expect("write source");
        let page = page(&profile, "Main.Home");
        let mut poster = MockPoster::default();
        let mut user = ScriptedUser::default();
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let report = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Push { file: source })
            .expect("push");
        assert_eq!(report.outcome, SyncOutcome::Pushed(PushOutcome::Unchanged));
        assert!(poster.requests.is_empty());
    }

    #[test]
    fn push_without_source_file_fails_before_network() {
        let temp = tempdir().expect("tempdir");
        let profile = profile(None);
        let page = page(&profile, "Main.Home");
        let mut poster = MockPoster::default();
        let mut user = ScriptedUser::default();
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let error = Orchestrator::new(&profile, transport, &mut user)
            .run(
                &page,
                &SyncCommand::Push {
                    file: temp.path().join("Main.Home.pmwiki"),
                },
            )
            .expect_err("missing source");
        assert!(matches!(error, SyncError::Cache(_)));
        assert!(poster.requests.is_empty());
    }

    #[test]
    fn edit_round_trip_writes_changes() {
        let temp = tempdir().expect("tempdir");
        let profile = profile(Some("s3cret"));
        let page = page(&profile, "Projects.Roadmap");
        let mut poster = MockPoster::with_responses(vec![
            Ok(FormResponse::ok("= Roadmap =\n")),
            Ok(FormResponse::ok("")),
        ]);
        let mut user = ScriptedUser {
            edited: Some("= Roadmap v2 =\n".to_string()),
            ..ScriptedUser::default()
        };
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let report = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Edit)
            .expect("edit");

        assert_eq!(report.outcome, SyncOutcome::Pushed(PushOutcome::Written));
        assert_eq!(report.cache_file, None);
        assert_eq!(user.seeds, vec!["= Roadmap =\n".to_string()]);
        assert_eq!(poster.requests.len(), 2);
        assert_eq!(poster.requests[1].field("text"), Some("= Roadmap v2 =\n"));
    }

    #[test]
    fn edit_without_changes_sends_only_the_pull() {
        let temp = tempdir().expect("tempdir");
        let profile = profile(None);
        let page = page(&profile, "Main.Home");
        let mut poster = MockPoster::with_responses(vec![Ok(FormResponse::ok("unchanged"))]);
        let mut user = ScriptedUser::default();
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let report = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Edit)
            .expect("edit");
        assert_eq!(report.outcome, SyncOutcome::Pushed(PushOutcome::Unchanged));
        assert_eq!(poster.requests.len(), 1);
    }

    #[test]
    fn edit_of_new_page_seeds_editor() {
        let temp = tempdir().expect("tempdir");
        let profile = profile(None);
        let page = page(&profile, "Ideas");
        let mut poster = MockPoster::with_responses(vec![Ok(FormResponse::ok(""))]);
        let mut user = ScriptedUser {
            edited: Some(String::new()),
            ..ScriptedUser::default()
        };
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let report = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Edit)
            .expect("edit");

        assert_eq!(
            user.seeds,
            vec!["(:comment Main.Ideas is a new page, save as empty to abort:)".to_string()]
        );
        // Saving the seed as empty aborts.
        assert_eq!(report.outcome, SyncOutcome::Pushed(PushOutcome::Unchanged));
        assert_eq!(poster.requests.len(), 1);
    }

    #[test]
    fn edit_keeps_local_copy_when_configured() {
        let temp = tempdir().expect("tempdir");
        let profile = profile_from(settings(None).with(KEY_KEEP, true));
        let page = page(&profile, "Main.Home");
        let mut poster = MockPoster::with_responses(vec![
            Ok(FormResponse::ok("before")),
            Ok(FormResponse::ok("")),
        ]);
        let mut user = ScriptedUser {
            edited: Some("after".to_string()),
            ..ScriptedUser::default()
        };
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let report = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Edit)
            .expect("edit");

        let kept = temp.path().join("Main.Home.pmwiki");
        assert_eq!(report.cache_file, Some(kept.display().to_string()));
        assert_eq!(fs::read_to_string(kept).expect("read kept copy"), "after");
    }

    #[test]
    fn roadmap_scenario_recovers_edit_on_connection_failure() {
        let temp = tempdir().expect("tempdir");
        let profile = profile_from(settings(None).with(KEY_URL, "http://wiki.example/$Group/$Name"));
        let page = page(&profile, "Projects.Roadmap");
        assert_eq!(page.resolved_url, "http://wiki.example/Projects/Roadmap");

        let mut poster = MockPoster::with_responses(vec![
            Ok(FormResponse::ok("= Roadmap =\n")),
            Err(RequestFailure::new("connection refused")),
        ]);
        let mut user = ScriptedUser {
            edited: Some("= Roadmap v2 =\n".to_string()),
            ..ScriptedUser::default()
        };
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let error = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Edit)
            .expect_err("push must fail");

        let cache_file = temp.path().join("Projects.Roadmap.pmwiki");
        assert!(matches!(
            &error,
            SyncError::Transport(TransportError::WriteFailed { cache_file: reported, .. })
                if *reported == cache_file
        ));
        assert!(error.to_string().contains("Projects.Roadmap.pmwiki"));
        assert_eq!(poster.requests[1].field("text"), Some("= Roadmap v2 =\n"));
        assert_eq!(
            fs::read_to_string(cache_file).expect("read recovery file"),
            "= Roadmap v2 =\n"
        );
    }

    #[test]
    fn declined_delete_sends_nothing() {
        let temp = tempdir().expect("tempdir");
        let profile = profile(None);
        let page = page(&profile, "Main.Home");
        let mut poster = MockPoster::default();
        let mut user = ScriptedUser::default();
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let report = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Delete)
            .expect("delete");
        assert_eq!(report.outcome, SyncOutcome::Aborted);
        assert_eq!(user.confirmations_asked, 1);
        assert!(poster.requests.is_empty());
    }

    #[test]
    fn confirmed_delete_pushes_delete_word() {
        let temp = tempdir().expect("tempdir");
        let profile = profile_from(settings(None).with(KEY_DELETE_WORD, "remove-me"));
        let page = page(&profile, "Main.Home");
        let mut poster = MockPoster::with_responses(vec![Ok(FormResponse::ok(""))]);
        let mut user = ScriptedUser {
            confirm: true,
            ..ScriptedUser::default()
        };
        let transport = PmWikiTransport::new(&mut poster, &profile, LocalCache::new(temp.path()));

        let report = Orchestrator::new(&profile, transport, &mut user)
            .run(&page, &SyncCommand::Delete)
            .expect("delete");
        assert_eq!(report.outcome, SyncOutcome::Pushed(PushOutcome::Written));
        assert_eq!(poster.requests[0].field("text"), Some("remove-me"));
    }

    #[test]
    fn list_reads_profile_names_only() {
        let profiles = ProfileSet::new()
            .with("work", settings(None))
            .with("home", Settings::new());
        assert_eq!(list_profiles(&profiles), vec!["home", "work"]);
    }
}
