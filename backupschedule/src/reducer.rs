//! The BackupSchedule reducer.
//!
//! A thin specialization over CronAnything: this reducer never ticks a
//! schedule or creates a Backup itself — it keeps one CronAnything in sync
//! with the BackupSchedule spec and lets the CronAnything reducer do the
//! actual triggering, then mirrors the resulting Backup children onto its
//! own status and prunes them by count.

use crate::{
    error::Error,
    types::{
        cronanything_name, phase, BackupHistoryEntry, BackupSchedule, BackupScheduleStatus,
        BACKUP_HISTORY_LIMIT,
    },
};
use chrono::Utc;
use cronanything_core::{
    ChildTemplate, ConcurrencyPolicy, CronAnything, CronAnythingSpec, FinishableStrategy,
};
use cronanything_runtime::resolver::ResourceResolver;
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams},
    core::{DynamicObject, GroupVersionKind, ObjectMeta},
    Api, Client, Resource, ResourceExt,
};
use std::sync::Arc;

const FIELD_MANAGER: &str = "backupschedule-controller";
/// `resourceTimestampFormat` used by every CronAnything this reducer creates.
const BACKUP_TIMESTAMP_FORMAT: &str = "20060102-150405";

/// Everything the reducer needs beyond the BackupSchedule object itself.
pub struct ReducerDeps {
    pub client: Client,
    pub resolver: ResourceResolver,
}

pub struct ReconcileOutcome {
    pub requeue_after: Option<std::time::Duration>,
}

/// Runs one full reconcile of `backup_schedule` (steps 1-7).
pub async fn reconcile(
    backup_schedule: Arc<BackupSchedule>,
    deps: &ReducerDeps,
) -> Result<ReconcileOutcome, Error> {
    if backup_schedule.meta().deletion_timestamp.is_some() {
        return Ok(ReconcileOutcome { requeue_after: None });
    }
    let name = backup_schedule
        .meta()
        .name
        .clone()
        .ok_or(Error::MissingObjectKey("metadata.name"))?;
    let namespace = backup_schedule
        .meta()
        .namespace
        .clone()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;

    let cron_api: Api<CronAnything> = Api::namespaced(deps.client.clone(), &namespace);
    let cron_name = cronanything_name(&name);
    let desired = desired_cronanything_spec(&backup_schedule, &cron_name);

    // Steps 2-4: fetch the paired CronAnything, create or update it.
    match cron_api.get_opt(&cron_name).await? {
        None => {
            let owner = owner_reference(&backup_schedule);
            let cron = CronAnything {
                metadata: ObjectMeta {
                    name: Some(cron_name.clone()),
                    namespace: Some(namespace.clone()),
                    owner_references: Some(vec![owner]),
                    ..Default::default()
                },
                spec: desired,
                status: None,
            };
            cron_api
                .create(&kube::api::PostParams::default(), &cron)
                .await?;
        }
        Some(existing) => {
            if cronanything_spec_differs(&existing.spec, &desired) {
                let patch = serde_json::json!({ "spec": desired });
                cron_api
                    .patch(&cron_name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
                    .await?;
            }
        }
    }

    // Step 5: list Backup children, newest creation time first.
    let (group, version) = backup_schedule.spec.backup_template.group_version()?;
    let kind = backup_schedule.spec.backup_template.kind()?;
    let gvk = GroupVersionKind::gvk(&group, &version, &kind);
    let api_resource = match deps.resolver.resolve(&gvk) {
        Some(ar) => ar,
        None => {
            // The Backup kind hasn't been discovered yet; retry shortly rather
            // than failing the whole BackupSchedule reconcile outright.
            return Ok(ReconcileOutcome {
                requeue_after: Some(std::time::Duration::from_secs(5)),
            });
        }
    };
    let children_api: Api<DynamicObject> = Api::namespaced_with(deps.client.clone(), &namespace, &api_resource);
    let selector = format!("{}={}", cronanything_core::LABEL_CREATED_BY, cron_name);
    let mut children = children_api
        .list(&ListParams::default().labels(&selector))
        .await?
        .items;
    children.sort_by_key(|c| std::cmp::Reverse(c.meta().creation_timestamp.clone().map(|t| t.0)));

    // Step 6: project status (pre-prune list, for reporting consistency within one reconcile).
    let backup_total = children.len() as i64;
    let backup_history: Vec<BackupHistoryEntry> = children
        .iter()
        .take(BACKUP_HISTORY_LIMIT)
        .map(|c| BackupHistoryEntry {
            backup_name: c.name_any(),
            creation_time: c.meta().creation_timestamp.clone().map(|t| t.0).unwrap_or_else(Utc::now),
            phase: read_phase(c),
        })
        .collect();
    let last_backup_time = children
        .first()
        .and_then(|c| c.meta().creation_timestamp.clone())
        .map(|t| t.0);

    update_status(&Api::namespaced(deps.client.clone(), &namespace), &name, move |status| {
        status.backup_total = backup_total;
        status.backup_history = backup_history.clone();
        status.last_backup_time = last_backup_time;
    })
    .await?;

    // Step 7: prune. Keep up to `max` Succeeded backups newest-first, delete the rest.
    for name in prune_targets(&children, backup_schedule.spec.backup_retention()) {
        children_api.delete(&name, &DeleteParams::default()).await?;
    }

    Ok(ReconcileOutcome { requeue_after: None })
}

/// Pure decision half of step 7: given `children` sorted newest-creation-first,
/// returns the names of the children to delete. Walks newest-first with a
/// counter initialized to `max`; once the counter is exhausted every further
/// child is deleted, and the counter only decrements on a Succeeded child — so
/// non-Succeeded backups age out naturally once the Succeeded quota fills.
/// Already-deleting children are skipped (idempotent under retries).
fn prune_targets(children: &[DynamicObject], max: i64) -> Vec<String> {
    if max <= 0 {
        return Vec::new();
    }
    let mut remaining = max;
    let mut targets = Vec::new();
    for child in children {
        if remaining <= 0 {
            if child.meta().deletion_timestamp.is_none() {
                targets.push(child.name_any());
            }
        } else if read_phase(child) == phase::SUCCEEDED {
            remaining -= 1;
        }
    }
    targets
}

fn desired_cronanything_spec(backup_schedule: &BackupSchedule, cron_name: &str) -> CronAnythingSpec {
    CronAnythingSpec {
        schedule: backup_schedule.spec.schedule.clone(),
        template: ChildTemplate(backup_schedule.spec.backup_template.0.clone()),
        trigger_deadline_seconds: Some(backup_schedule.spec.starting_deadline_seconds()),
        concurrency_policy: ConcurrencyPolicy::Forbid,
        suspend: backup_schedule.spec.suspend,
        finishable_strategy: Some(FinishableStrategy::StringField {
            field_path: ".status.phase".to_string(),
            finished_values: vec![phase::SUCCEEDED.to_string(), phase::FAILED.to_string()],
        }),
        retention: None,
        total_resource_limit: None,
        resource_base_name: Some(cron_name.to_string()),
        resource_timestamp_format: Some(BACKUP_TIMESTAMP_FORMAT.to_string()),
        cascade_delete: Some(true),
    }
}

fn cronanything_spec_differs(existing: &CronAnythingSpec, desired: &CronAnythingSpec) -> bool {
    existing.schedule != desired.schedule
        || existing.trigger_deadline_seconds != desired.trigger_deadline_seconds
        || existing.suspend != desired.suspend
        || !existing.template.structurally_eq(&desired.template)
}

fn read_phase(child: &DynamicObject) -> String {
    child
        .data
        .get("status")
        .and_then(|s| s.get("phase"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or(phase::PENDING)
        .to_string()
}

async fn update_status<F>(api: &Api<BackupSchedule>, name: &str, mut update: F) -> Result<BackupSchedule, Error>
where
    F: FnMut(&mut BackupScheduleStatus) + Send,
{
    use backon::{ExponentialBuilder, Retryable};
    let attempt = || async {
        let current = api.get(name).await.map_err(Error::Api)?;
        let mut status = current.status.clone().unwrap_or_default();
        update(&mut status);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(Error::Api)
    };
    attempt
        .retry(ExponentialBuilder::default().with_max_times(5))
        .when(|e: &Error| matches!(e, Error::Api(kube::Error::Api(ae)) if ae.code == 409))
        .await
}

/// Inserts/updates a standard condition on the BackupSchedule's status, used by
/// [`crate::controller`] to surface `Ready`/`Stalled` after each reconcile.
pub async fn report_condition(
    api: &Api<BackupSchedule>,
    name: &str,
    condition: k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition,
) -> Result<(), Error> {
    update_status(api, name, move |status| {
        cronanything_core::conditions::set_condition(&mut status.conditions, condition.clone());
    })
    .await?;
    Ok(())
}

fn owner_reference(backup_schedule: &BackupSchedule) -> k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
    k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
        api_version: BackupSchedule::api_version(&()).to_string(),
        kind: BackupSchedule::kind(&()).to_string(),
        name: backup_schedule.name_any(),
        uid: backup_schedule.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}
