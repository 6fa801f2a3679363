//! engine::push
//!
//! Creates and updates PRs from changes, reconciles draft state, and
//! maintains the stack-visualization comment on every PR.
//!
//! # Protocol
//!
//! Changes are processed bottom-up. A local change (no PR yet) gets its
//! commit force-with-lease pushed to its per-change branch and a PR
//! created against its desired base. An existing PR is diffed against
//! the cached title/body/base/commit and the draft intent; only changed
//! PRs are pushed. Local edits win over forge-side edits: the cache diff
//! drives an update that overwrites what reviewers changed on the forge.
//!
//! After the PR pass, every PR's visualization comment is upserted, with
//! fan-out bounded by a small concurrency cap. Comment failures degrade
//! to warnings; the push itself never fails because of them.

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::core::branch;
use crate::core::model::{Change, PrData, PrRecord, PrState};
use crate::core::types::ChangeId;
use crate::forge::{CreatePrRequest, Forge, ForgeError, UpdatePrRequest};
use crate::git::Vcs;
use crate::store::Store;
use crate::ui::viz::{self, VizRow};

use super::context::StackContext;
use super::{EngineError, PreconditionKind};

/// Upper bound on concurrent visualization-comment upserts.
const VIZ_CONCURRENCY: usize = 4;

/// Options for a push.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOptions {
    /// Create new PRs as drafts.
    pub draft: bool,
}

/// Result of a push.
#[derive(Debug, Default)]
pub struct PushOutcome {
    /// PR numbers created this run
    pub created: Vec<u64>,
    /// PR numbers updated this run
    pub updated: Vec<u64>,
    /// Changes that needed nothing
    pub skipped: usize,
    /// Non-fatal messages (visualization failures, skipped commits)
    pub warnings: Vec<String>,
}

/// Result of a draft/ready transition.
#[derive(Debug, Default)]
pub struct DraftOutcome {
    /// The affected PR number, when one exists on the forge
    pub pr_number: Option<u64>,
    /// Whether the forge was actually transitioned
    pub transitioned: bool,
    /// Non-fatal messages
    pub warnings: Vec<String>,
}

/// Push the stack's active changes to the forge, bottom-up.
pub async fn push(
    vcs: &dyn Vcs,
    store: &Store,
    forge: &dyn Forge,
    ctx: &StackContext,
    opts: PushOptions,
) -> Result<PushOutcome, EngineError> {
    let mut prs = store.load_prs(&ctx.stack_name)?;
    let mut outcome = PushOutcome::default();
    let remote = vcs.remote_name()?;

    for change in &ctx.active_changes {
        if let Some(stack) = &change.foreign_stack {
            outcome.warnings.push(format!(
                "change #{} belongs to stack '{stack}'; skipped",
                change.position
            ));
            continue;
        }
        let Some(uuid) = &change.uuid else {
            outcome.warnings.push(format!(
                "change #{} has no PR-UUID trailer; skipped",
                change.position
            ));
            continue;
        };

        let (on_forge, local_intent) = match prs.prs.get(uuid) {
            Some(record) => (record.on_forge(), record.local_draft_status),
            None => (false, false),
        };
        if on_forge {
            if let Some(number) =
                sync_existing(vcs, forge, &remote, change, uuid, &mut prs, &mut outcome).await?
            {
                outcome.updated.push(number);
            } else {
                outcome.skipped += 1;
            }
        } else {
            // Local change: push the branch and create the PR.
            let number = create_new(
                vcs,
                forge,
                &remote,
                ctx,
                change,
                uuid,
                local_intent || opts.draft,
                &mut prs,
            )
            .await?;
            outcome.created.push(number);
        }
    }

    outcome
        .warnings
        .extend(upsert_viz_comments(forge, ctx, &mut prs).await);

    let mut stack = ctx.stack.clone();
    stack.last_synced = Some(Utc::now());
    stack.sync_hash = Some(vcs.commit_hash(&stack.branch)?);
    store.save_stack(&stack)?;
    store.save_prs(&ctx.stack_name, &prs)?;

    Ok(outcome)
}

/// Push a brand-new change and create its PR.
#[allow(clippy::too_many_arguments)]
async fn create_new(
    vcs: &dyn Vcs,
    forge: &dyn Forge,
    remote: &str,
    ctx: &StackContext,
    change: &Change,
    uuid: &ChangeId,
    draft: bool,
    prs: &mut PrData,
) -> Result<u64, EngineError> {
    let name = branch::uuid_branch(&ctx.user, &ctx.stack_name, uuid);
    vcs.push_with_lease(remote, change.commit_hash.as_str(), &name)?;

    let created = forge
        .create_pr(CreatePrRequest {
            head: name.clone(),
            base: change.desired_base.clone(),
            title: change.title.clone(),
            body: if change.description.is_empty() {
                None
            } else {
                Some(change.description.clone())
            },
            draft,
        })
        .await?;

    let now = Utc::now();
    prs.prs.insert(
        uuid.clone(),
        PrRecord {
            pr_number: created.number,
            url: created.url,
            branch: name,
            commit_hash: change.commit_hash.clone(),
            created_at: now,
            last_pushed: Some(now),
            state: PrState::from_forge(&created.state, created.is_draft, false),
            title: change.title.clone(),
            body: change.description.clone(),
            base: change.desired_base.clone(),
            viz_comment_id: None,
            local_draft_status: draft,
            remote_draft_status: created.is_draft,
        },
    );
    Ok(created.number)
}

/// Diff an existing PR against the change and sync it when needed.
///
/// Returns `Some(number)` when a push happened, `None` when up to date.
async fn sync_existing(
    vcs: &dyn Vcs,
    forge: &dyn Forge,
    remote: &str,
    change: &Change,
    uuid: &ChangeId,
    prs: &mut PrData,
    outcome: &mut PushOutcome,
) -> Result<Option<u64>, EngineError> {
    let Some(record) = prs.prs.get_mut(uuid) else {
        return Ok(None);
    };

    let needs_sync = record.title != change.title
        || record.body != change.description
        || record.base != change.desired_base
        || record.commit_hash != change.commit_hash
        || record.local_draft_status != record.remote_draft_status;
    if !needs_sync {
        return Ok(None);
    }

    vcs.push_with_lease(remote, change.commit_hash.as_str(), &record.branch)?;
    forge
        .update_pr(UpdatePrRequest {
            number: record.pr_number,
            title: Some(change.title.clone()),
            body: Some(change.description.clone()),
            base: Some(change.desired_base.clone()),
        })
        .await?;

    if record.local_draft_status != record.remote_draft_status {
        if record.state.is_mutable() {
            if record.local_draft_status {
                forge.mark_pr_draft(record.pr_number).await?;
                record.state = PrState::Draft;
            } else {
                forge.mark_pr_ready(record.pr_number).await?;
                record.state = PrState::Open;
            }
            record.remote_draft_status = record.local_draft_status;
        } else {
            outcome.warnings.push(format!(
                "PR #{} is {}; draft preference recorded but not applied",
                record.pr_number, record.state
            ));
        }
    }

    record.title = change.title.clone();
    record.body = change.description.clone();
    record.base = change.desired_base.clone();
    record.commit_hash = change.commit_hash.clone();
    record.last_pushed = Some(Utc::now());
    Ok(Some(record.pr_number))
}

/// Record draft intent for a change and transition its PR when possible.
///
/// Closed and merged PRs are frozen on the forge; only the local intent
/// is updated for them.
pub async fn set_change_draft(
    store: &Store,
    forge: &dyn Forge,
    ctx: &StackContext,
    change: &Change,
    draft: bool,
) -> Result<DraftOutcome, EngineError> {
    let Some(uuid) = &change.uuid else {
        return Err(EngineError::Precondition(
            PreconditionKind::MissingUuidTrailer {
                position: change.position,
            },
        ));
    };

    let mut prs = store.load_prs(&ctx.stack_name)?;
    let mut outcome = DraftOutcome::default();

    match prs.prs.get_mut(uuid) {
        Some(record) if record.on_forge() && record.state.is_mutable() => {
            if draft {
                forge.mark_pr_draft(record.pr_number).await?;
                record.state = PrState::Draft;
            } else {
                forge.mark_pr_ready(record.pr_number).await?;
                record.state = PrState::Open;
            }
            record.local_draft_status = draft;
            record.remote_draft_status = draft;
            outcome.pr_number = Some(record.pr_number);
            outcome.transitioned = true;
        }
        Some(record) if record.on_forge() => {
            record.local_draft_status = draft;
            outcome.pr_number = Some(record.pr_number);
            outcome.warnings.push(format!(
                "PR #{} is {}; draft preference recorded locally only",
                record.pr_number, record.state
            ));
        }
        Some(record) => {
            record.local_draft_status = draft;
        }
        None => {
            // Stub record holding intent until the change is pushed.
            prs.prs.insert(
                uuid.clone(),
                PrRecord {
                    pr_number: 0,
                    url: String::new(),
                    branch: branch::uuid_branch(&ctx.user, &ctx.stack_name, uuid),
                    commit_hash: change.commit_hash.clone(),
                    created_at: Utc::now(),
                    last_pushed: None,
                    state: PrState::Open,
                    title: change.title.clone(),
                    body: change.description.clone(),
                    base: String::new(),
                    viz_comment_id: None,
                    local_draft_status: draft,
                    remote_draft_status: false,
                },
            );
        }
    }

    if outcome.transitioned {
        outcome
            .warnings
            .extend(upsert_viz_comments(forge, ctx, &mut prs).await);
    }
    store.save_prs(&ctx.stack_name, &prs)?;
    Ok(outcome)
}

/// Upsert the visualization comment on every PR of the stack.
///
/// Fan-out is bounded by [`VIZ_CONCURRENCY`]. Failures degrade to
/// warnings; the caller's operation continues.
pub(crate) async fn upsert_viz_comments(
    forge: &dyn Forge,
    ctx: &StackContext,
    prs: &mut PrData,
) -> Vec<String> {
    let rows: Vec<VizRow> = ctx
        .all_changes
        .iter()
        .map(|c| {
            let record = c
                .uuid
                .as_ref()
                .and_then(|id| prs.prs.get(id))
                .filter(|r| r.on_forge());
            VizRow {
                position: c.position,
                title: c.title.clone(),
                pr_number: record.map(|r| r.pr_number),
                url: record.map(|r| r.url.clone()).filter(|u| !u.is_empty()),
                state: record.map(|r| r.state),
            }
        })
        .collect();

    let targets: Vec<(ChangeId, u64, Option<u64>, String)> = ctx
        .all_changes
        .iter()
        .filter_map(|c| {
            let uuid = c.uuid.as_ref()?;
            let record = prs.prs.get(uuid).filter(|r| r.on_forge())?;
            let body = viz::render_comment(&ctx.stack_name, &rows, record.pr_number);
            Some((uuid.clone(), record.pr_number, record.viz_comment_id, body))
        })
        .collect();

    let stack_name = ctx.stack_name.as_str();
    let results: Vec<(ChangeId, u64, Result<u64, ForgeError>)> =
        stream::iter(targets.into_iter().map(|(uuid, number, cached, body)| {
            async move {
                let result = upsert_one(forge, stack_name, number, cached, &body).await;
                (uuid, number, result)
            }
        }))
        .buffer_unordered(VIZ_CONCURRENCY)
        .collect()
        .await;

    let mut warnings = Vec::new();
    for (uuid, number, result) in results {
        match result {
            Ok(comment_id) => {
                if let Some(record) = prs.prs.get_mut(&uuid) {
                    record.viz_comment_id = Some(comment_id);
                }
            }
            Err(e) => warnings.push(format!(
                "could not maintain the stack comment on PR #{number}: {e}"
            )),
        }
    }
    warnings
}

/// One comment upsert: cached id, then marker scan, then create.
///
/// Update failures fall through to the next strategy; only a failed
/// create is reported.
async fn upsert_one(
    forge: &dyn Forge,
    stack_name: &str,
    number: u64,
    cached_id: Option<u64>,
    body: &str,
) -> Result<u64, ForgeError> {
    if let Some(id) = cached_id {
        if forge.update_pr_comment(id, body).await.is_ok() {
            return Ok(id);
        }
    }

    if let Ok(comments) = forge.list_pr_comments(number).await {
        if let Some(existing) = comments
            .iter()
            .find(|c| viz::contains_marker(&c.body, stack_name))
        {
            if forge.update_pr_comment(existing.id, body).await.is_ok() {
                return Ok(existing.id);
            }
        }
    }

    forge.create_pr_comment(number, body).await
}
