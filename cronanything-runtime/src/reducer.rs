//! The CronAnything reducer: phases A-I of the reconcile loop.
//!
//! Every phase that mutates persistent state re-reads the object immediately
//! before writing (`update_status`), so the function is safe to call again from
//! scratch after any partial failure — correctness derives entirely from
//! persisted status plus the injected clock, never from in-process state other
//! than the best-effort next-tick dedup map in [`crate::controller`].

use crate::{error::Error, resolver::ResourceResolver};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cronanything_core::{
    template::FieldPath, Clock, ConcurrencyPolicy, CronAnythingStatus, FinishableStrategy,
    PendingTrigger, ResourceTimestampStrategy, Schedule, TriggerHistoryEntry, TriggerResult,
    LABEL_CREATED_BY, LABEL_SCHEDULE_TIME,
};
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    core::{DynamicObject, GroupVersionKind},
    Api, Client, Resource, ResourceExt,
};
use std::{collections::BTreeMap, sync::Arc};

pub use cronanything_core::CronAnything;

/// Everything the reducer needs beyond the CronAnything object itself.
pub struct ReducerDeps {
    pub client: Client,
    pub resolver: ResourceResolver,
    pub clock: Arc<dyn Clock>,
}

/// What the reducer decided to do, for the controller to act on / requeue from.
pub struct ReconcileOutcome {
    /// When the controller should next requeue this object absent other events.
    pub requeue_after: Option<std::time::Duration>,
}

const FIELD_MANAGER: &str = "cronanything-controller";

/// Runs one full reconcile of `cron` (phases A-I). `cron` is the reducer's view
/// of the object as handed to it by the controller's watch cache; phases that
/// write status re-read the object fresh immediately before patching.
pub async fn reconcile(cron: Arc<CronAnything>, deps: &ReducerDeps) -> Result<ReconcileOutcome, Error> {
    // Phase A.2 — an in-progress deletion needs no further action from us.
    if cron.meta().deletion_timestamp.is_some() {
        return Ok(ReconcileOutcome { requeue_after: None });
    }
    let name = cron.meta().name.clone().ok_or(Error::MissingObjectKey("metadata.name"))?;
    let namespace = cron
        .meta()
        .namespace
        .clone()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let cron_api: Api<CronAnything> = Api::namespaced(deps.client.clone(), &namespace);

    // Phase A.3 — resolve the child kind.
    let (group, version) = cron.spec.template.group_version()?;
    let kind = cron.spec.template.kind()?;
    let gvk = GroupVersionKind::gvk(&group, &version, &kind);
    let api_resource = deps.resolver.resolve(&gvk).ok_or_else(|| Error::KindUnresolved(gvk.clone()))?;
    let children_api: Api<DynamicObject> = Api::namespaced_with(deps.client.clone(), &namespace, &api_resource);

    // Phase B — list and classify children.
    let selector = format!("{LABEL_CREATED_BY}={name}");
    let listed = children_api
        .list(&ListParams::default().labels(&selector))
        .await?
        .items;
    let strategy = cron.spec.finishable_strategy.as_ref();
    let mut children: Vec<(DynamicObject, bool)> = Vec::with_capacity(listed.len());
    for child in listed {
        let finished = is_finished(&child, strategy)?;
        children.push((child, finished));
    }

    // Phase C — history pruning.
    if let Some(retention) = &cron.spec.retention {
        prune_history(&children_api, &mut children, retention, deps.clock.now()).await?;
    }

    // Phase D — suspend check.
    if cron.spec.suspend == Some(true) {
        return schedule_next(&cron, deps).await;
    }

    // Phase E — compute trigger times.
    let schedule = Schedule::parse(&cron.spec.schedule)?;
    let start_from = cron
        .status
        .as_ref()
        .and_then(|s| s.last_schedule_time)
        .unwrap_or_else(|| cron.meta().creation_timestamp.clone().map(|t| t.0).unwrap_or_else(|| deps.clock.now()));
    let lookahead = deps.clock.now() + ChronoDuration::seconds(1);
    let missed = schedule.missed(start_from, lookahead);
    if missed.is_empty() {
        return schedule_next(&cron, deps).await;
    }
    let schedule_time = *missed.last().unwrap();
    let dropped = &missed[..missed.len() - 1];

    // Phase F — record dropped ticks.
    if let Some(newest_dropped) = dropped.last().copied() {
        let pending = cron.status.as_ref().and_then(|s| s.pending_trigger.clone());
        let carried = pending
            .as_ref()
            .filter(|p| p.schedule_time == newest_dropped)
            .map(|p| p.result);
        let now = deps.clock.now();
        update_status(&cron_api, &name, move |status| {
            status.push_history(TriggerHistoryEntry {
                schedule_time: newest_dropped,
                creation_timestamp: now,
                result: carried.unwrap_or(TriggerResult::Missed),
            });
            status.last_schedule_time = Some(newest_dropped);
            status.pending_trigger = None;
        })
        .await?;
    }

    // Phase G — deadline check.
    if let Some(deadline_secs) = cron.spec.trigger_deadline_seconds {
        let now = deps.clock.now();
        if schedule_time + ChronoDuration::seconds(deadline_secs) < now {
            let pending = cron.status.as_ref().and_then(|s| s.pending_trigger.clone());
            let carried = pending
                .as_ref()
                .filter(|p| p.schedule_time == schedule_time)
                .map(|p| p.result);
            update_status(&cron_api, &name, move |status| {
                status.push_history(TriggerHistoryEntry {
                    schedule_time,
                    creation_timestamp: now,
                    result: carried.unwrap_or(TriggerResult::DeadlineExceeded),
                });
                status.last_schedule_time = Some(schedule_time);
                status.pending_trigger = None;
            })
            .await?;
            return schedule_next(&cron, deps).await;
        }
    }

    // Phase H — concurrency and creation.
    let active: Vec<&DynamicObject> = children.iter().filter(|(_, finished)| !finished).map(|(c, _)| c).collect();
    if !active.is_empty() {
        match cron.spec.concurrency_policy {
            ConcurrencyPolicy::Forbid => {
                let now = deps.clock.now();
                update_status(&cron_api, &name, move |status| {
                    status.push_history(TriggerHistoryEntry {
                        schedule_time,
                        creation_timestamp: now,
                        result: TriggerResult::ForbidConcurrent,
                    });
                    status.last_schedule_time = Some(schedule_time);
                    status.pending_trigger = None;
                })
                .await?;
                return schedule_next(&cron, deps).await;
            }
            ConcurrencyPolicy::Replace => {
                for child in &active {
                    if child.meta().deletion_timestamp.is_some() {
                        continue;
                    }
                    let child_name = child.name_any();
                    children_api.delete(&child_name, &DeleteParams::default()).await?;
                }
                return Ok(ReconcileOutcome {
                    requeue_after: Some(std::time::Duration::from_secs(1)),
                });
            }
            ConcurrencyPolicy::Allow => {}
        }
    }

    if let Some(limit) = cron.spec.total_resource_limit {
        if children.len() as i64 >= limit {
            let now = deps.clock.now();
            update_status(&cron_api, &name, move |status| {
                status.push_history(TriggerHistoryEntry {
                    schedule_time,
                    creation_timestamp: now,
                    result: TriggerResult::ResourceLimitReached,
                });
                status.last_schedule_time = Some(schedule_time);
                status.pending_trigger = None;
            })
            .await?;
            return schedule_next(&cron, deps).await;
        }
    }

    let base_name = cron.spec.resource_base_name.clone().unwrap_or_else(|| name.clone());
    let suffix = format_schedule_time(schedule_time, cron.spec.resource_timestamp_format.as_deref());
    let child_name = format!("{base_name}-{suffix}");

    let mut labels = BTreeMap::new();
    labels.insert(LABEL_CREATED_BY.to_string(), name.clone());
    labels.insert(LABEL_SCHEDULE_TIME.to_string(), schedule_time.timestamp().to_string());
    let owner = if cron.spec.cascade_delete == Some(true) {
        Some(owner_reference(&cron))
    } else {
        None
    };
    let stamped = cron.spec.template.stamp(&child_name, &namespace, labels, owner)?;
    let child_obj: DynamicObject = serde_json::from_value(stamped).map_err(|e| {
        tracing::warn!(error = %e, "stamped template failed to decode as a Kubernetes object");
        Error::TemplateDecode(cronanything_core::TemplateError::NotAnObject)
    })?;

    let create_result = children_api.create(&PostParams::default(), &child_obj).await;
    let now = deps.clock.now();
    match create_result {
        Ok(_) => {
            update_status(&cron_api, &name, move |status| {
                status.push_history(TriggerHistoryEntry {
                    schedule_time,
                    creation_timestamp: now,
                    result: TriggerResult::CreateSucceeded,
                });
                status.last_schedule_time = Some(schedule_time);
                status.pending_trigger = None;
            })
            .await?;
        }
        Err(err) => {
            update_status(&cron_api, &name, move |status| {
                status.pending_trigger = Some(PendingTrigger {
                    schedule_time,
                    result: TriggerResult::CreateFailed,
                });
            })
            .await?;
            return Err(err.into());
        }
    }

    schedule_next(&cron, deps).await
}

/// Phase I — compute the next wake-up.
async fn schedule_next(cron: &CronAnything, deps: &ReducerDeps) -> Result<ReconcileOutcome, Error> {
    let schedule = Schedule::parse(&cron.spec.schedule)?;
    let now = deps.clock.now();
    let next = schedule.next(now);
    Ok(ReconcileOutcome {
        requeue_after: next.map(|t| (t - now).to_std().unwrap_or_default()),
    })
}

/// Re-reads the CronAnything, applies `update` to a clone of its status, and
/// patches the status subresource. Retries a bounded number of times on a
/// write conflict (optimistic-concurrency re-read-and-retry).
async fn update_status<F>(api: &Api<CronAnything>, name: &str, mut update: F) -> Result<CronAnything, Error>
where
    F: FnMut(&mut CronAnythingStatus) + Send,
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

/// Inserts/updates a standard condition on the CronAnything's status, used by
/// [`crate::controller`] to surface `Ready`/`Stalled` after each reconcile.
pub async fn report_condition(
    api: &Api<CronAnything>,
    name: &str,
    condition: k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition,
) -> Result<(), Error> {
    update_status(api, name, move |status| {
        cronanything_core::conditions::set_condition(&mut status.conditions, condition.clone());
    })
    .await?;
    Ok(())
}

fn is_finished(child: &DynamicObject, strategy: Option<&FinishableStrategy>) -> Result<bool, Error> {
    let Some(strategy) = strategy else {
        return Ok(false);
    };
    let body = serde_json::to_value(child).unwrap_or(serde_json::Value::Null);
    match strategy {
        FinishableStrategy::TimestampField { field_path } => {
            let path = FieldPath::parse(field_path)?;
            let value = path.extract_string(&body);
            Ok(!value.is_empty() && DateTime::parse_from_rfc3339(&value).is_ok())
        }
        FinishableStrategy::StringField {
            field_path,
            finished_values,
        } => {
            let path = FieldPath::parse(field_path)?;
            let value = path.extract_string(&body);
            Ok(finished_values.iter().any(|v| v == &value))
        }
    }
}

fn child_timestamp(child: &DynamicObject, strategy: &ResourceTimestampStrategy) -> Option<DateTime<Utc>> {
    match strategy {
        ResourceTimestampStrategy::CreationTimestamp => child.meta().creation_timestamp.clone().map(|t| t.0),
        ResourceTimestampStrategy::Field { field_path } => {
            let path = FieldPath::parse(field_path).ok()?;
            let body = serde_json::to_value(child).ok()?;
            let value = path.extract_string(&body);
            DateTime::parse_from_rfc3339(&value).ok().map(|t| t.with_timezone(&Utc))
        }
    }
}

/// Pure decision half of Phase C: which indices into `children` (a finished/
/// unfinished-tagged child list, in listing order) are beyond the retention
/// bounds and should be deleted. Unfinished children are never selected.
///
/// Split out from [`prune_history`] so the count/time retention math (spec
/// properties "retention by count" / "retention by time") is directly unit
/// testable without a mocked API server.
fn select_prune_targets(
    children: &[(DynamicObject, bool)],
    retention: &cronanything_core::RetentionPolicy,
    now: DateTime<Utc>,
) -> std::collections::HashSet<usize> {
    let mut finished: Vec<usize> = children
        .iter()
        .enumerate()
        .filter(|(_, (_, finished))| *finished)
        .map(|(i, _)| i)
        .collect();
    finished.sort_by_key(|&i| std::cmp::Reverse(child_timestamp(&children[i].0, &retention.resource_timestamp_strategy)));

    let mut to_delete = std::collections::HashSet::new();
    for (rank, &idx) in finished.iter().enumerate() {
        let (child, _) = &children[idx];
        let stale_by_time = match (retention.history_time_limit_seconds, child_timestamp(child, &retention.resource_timestamp_strategy)) {
            (Some(limit), Some(ts)) => (now - ts).num_seconds() > limit,
            _ => false,
        };
        let stale_by_count = match retention.history_count_limit {
            Some(limit) => (rank as i64) >= limit,
            None => false,
        };
        if stale_by_time || stale_by_count {
            to_delete.insert(idx);
        }
    }
    to_delete
}

/// Phase C. Deletes finished children beyond the count/time retention bounds.
/// Removes deleted entries from `children` so later phases see the post-prune set.
async fn prune_history(
    children_api: &Api<DynamicObject>,
    children: &mut Vec<(DynamicObject, bool)>,
    retention: &cronanything_core::RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let to_delete = select_prune_targets(children, retention, now);

    let mut kept = Vec::with_capacity(children.len());
    for (idx, (child, finished)) in children.drain(..).enumerate() {
        if to_delete.contains(&idx) {
            if child.meta().deletion_timestamp.is_none() {
                children_api.delete(&child.name_any(), &DeleteParams::default()).await?;
            }
        } else {
            kept.push((child, finished));
        }
    }
    *children = kept;
    Ok(())
}

fn format_schedule_time(t: DateTime<Utc>, format: Option<&str>) -> String {
    match format {
        Some(layout) => t.format(&go_layout_to_chrono(layout)).to_string(),
        None => t.timestamp().to_string(),
    }
}

/// Translates the handful of reference-date tokens this operator's documented
/// `resourceTimestampFormat` values use (e.g. `20060102-150405`) into a chrono
/// `strftime` layout. Only the tokens actually used by `backupschedule`'s
/// generated CronAnything are supported; anything else passes through literally.
fn go_layout_to_chrono(layout: &str) -> String {
    layout
        .replace("20060102", "%Y%m%d")
        .replace("150405", "%H%M%S")
}

fn owner_reference(cron: &CronAnything) -> k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
    k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
        api_version: CronAnything::api_version(&()).to_string(),
        kind: CronAnything::kind(&()).to_string(),
        name: cron.name_any(),
        uid: cron.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronanything_core::ChildTemplate;
    use cronanything_test::{dt, mock_client, FixedClock};
    use kube::core::ObjectMeta;

    fn cron_fixture(name: &str, schedule: &str) -> CronAnything {
        CronAnything {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                creation_timestamp: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(dt(
                    "2026-01-01T00:00:00Z",
                ))),
                ..Default::default()
            },
            spec: cronanything_core::CronAnythingSpec {
                schedule: schedule.to_string(),
                template: ChildTemplate(serde_json::json!({
                    "apiVersion": "batch/v1",
                    "kind": "Job",
                    "spec": {},
                })),
                trigger_deadline_seconds: None,
                concurrency_policy: ConcurrencyPolicy::Allow,
                suspend: None,
                finishable_strategy: None,
                retention: None,
                total_resource_limit: None,
                resource_base_name: None,
                resource_timestamp_format: None,
                cascade_delete: None,
            },
            status: None,
        }
    }

    fn job_api_resource() -> kube::discovery::ApiResource {
        kube::discovery::ApiResource::erase::<k8s_openapi::api::batch::v1::Job>(&())
    }

    #[tokio::test]
    async fn no_missed_ticks_only_lists_children_then_schedules_next() {
        let (client, handle) = mock_client();
        let now = dt("2026-01-01T00:00:00Z");
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
        let gvk = GroupVersionKind::gvk("batch", "v1", "Job");
        let resolver = crate::resolver::ResourceResolver::from_static([(gvk, job_api_resource())]);

        let driver = tokio::spawn(cronanything_test::drive_scenarios(
            handle,
            vec![cronanything_test::Scenario::ok(
                |parts, _body| {
                    assert_eq!(parts.method.as_str(), "GET");
                    assert!(parts.uri.path().contains("/jobs"));
                    assert!(parts.uri.query().unwrap_or("").contains("labelSelector"));
                },
                serde_json::to_vec(&serde_json::json!({
                    "apiVersion": "batch/v1",
                    "kind": "JobList",
                    "metadata": {},
                    "items": [],
                }))
                .unwrap(),
            )],
        ));

        let mut cron = cron_fixture("nightly", "*/1 * * * *");
        cron.metadata.creation_timestamp =
            Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(now));
        let deps = ReducerDeps {
            client,
            resolver,
            clock,
        };
        let outcome = reconcile(Arc::new(cron), &deps).await.unwrap();
        assert_eq!(outcome.requeue_after, Some(std::time::Duration::from_secs(60)));
        driver.await.unwrap();
    }

    fn job_list_response(items: Vec<serde_json::Value>) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "apiVersion": "batch/v1",
            "kind": "JobList",
            "metadata": {},
            "items": items,
        }))
        .unwrap()
    }

    fn active_job(name: &str, deleting: bool) -> serde_json::Value {
        let mut metadata = serde_json::json!({"name": name});
        if deleting {
            metadata["deletionTimestamp"] = serde_json::json!("2026-01-01T00:00:30Z");
        }
        serde_json::json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": metadata,
            "status": {},
        })
    }

    /// Testable property 2 (`§8`): `Forbid` excludes parallelism — an unfinished
    /// child blocks creation and a `ForbidConcurrent` history record is written.
    #[tokio::test]
    async fn forbid_policy_blocks_creation_when_active_child_exists() {
        let (client, handle) = mock_client();
        let created = dt("2026-01-01T00:00:00Z");
        let now = dt("2026-01-01T00:01:01Z");
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
        let gvk = GroupVersionKind::gvk("batch", "v1", "Job");
        let resolver = crate::resolver::ResourceResolver::from_static([(gvk, job_api_resource())]);

        let mut cron = cron_fixture("nightly", "*/1 * * * *");
        cron.metadata.creation_timestamp = Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(created));
        cron.spec.concurrency_policy = ConcurrencyPolicy::Forbid;
        let cron_for_get = cron.clone();

        let driver = tokio::spawn(cronanything_test::drive_scenarios(
            handle,
            vec![
                cronanything_test::Scenario::ok(
                    |parts, _| assert_eq!(parts.method.as_str(), "GET"),
                    job_list_response(vec![active_job("nightly-1735689600", false)]),
                ),
                cronanything_test::Scenario::ok(
                    |parts, _| assert_eq!(parts.method.as_str(), "GET"),
                    serde_json::to_vec(&cron_for_get).unwrap(),
                ),
                cronanything_test::Scenario::ok(
                    |parts, body| {
                        assert_eq!(parts.method.as_str(), "PATCH");
                        let patch: serde_json::Value = serde_json::from_slice(body).unwrap();
                        // Must be an explicit `null` in the patch body, not an omitted key:
                        // a merge patch (RFC 7386) only clears a field on the server when
                        // told to with `null`.
                        assert!(
                            patch["status"].as_object().unwrap().contains_key("pendingTrigger"),
                            "pendingTrigger must be present (as null) in the merge patch, not omitted"
                        );
                        assert_eq!(patch["status"]["pendingTrigger"], serde_json::Value::Null);
                        assert_eq!(
                            patch["status"]["triggerHistory"][0]["result"],
                            serde_json::json!("ForbidConcurrent")
                        );
                    },
                    serde_json::to_vec(&cron_for_get).unwrap(),
                ),
            ],
        ));

        let deps = ReducerDeps { client, resolver, clock };
        let outcome = reconcile(Arc::new(cron), &deps).await.unwrap();
        assert_eq!(outcome.requeue_after, Some(std::time::Duration::from_secs(59)));
        driver.await.unwrap();
    }

    /// Testable property 3 (`§8`) / scenario S6: an already-deleting unfinished
    /// child under `Replace` triggers neither a new delete nor a create, and the
    /// reconcile requeues after 1s.
    #[tokio::test]
    async fn replace_policy_skips_delete_for_child_already_deleting() {
        let (client, handle) = mock_client();
        let created = dt("2026-01-01T00:00:00Z");
        let now = dt("2026-01-01T00:01:01Z");
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
        let gvk = GroupVersionKind::gvk("batch", "v1", "Job");
        let resolver = crate::resolver::ResourceResolver::from_static([(gvk, job_api_resource())]);

        let mut cron = cron_fixture("nightly", "*/1 * * * *");
        cron.metadata.creation_timestamp = Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(created));
        cron.spec.concurrency_policy = ConcurrencyPolicy::Replace;

        let driver = tokio::spawn(cronanything_test::drive_scenarios(
            handle,
            vec![cronanything_test::Scenario::ok(
                |parts, _| assert_eq!(parts.method.as_str(), "GET"),
                job_list_response(vec![active_job("nightly-already-deleting", true)]),
            )],
        ));

        let deps = ReducerDeps { client, resolver, clock };
        let outcome = reconcile(Arc::new(cron), &deps).await.unwrap();
        assert_eq!(outcome.requeue_after, Some(std::time::Duration::from_secs(1)));
        driver.await.unwrap();
    }

    #[test]
    fn is_finished_string_field_matches_configured_values() {
        let child: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": "x"},
            "status": {"phase": "Succeeded"},
        }))
        .unwrap();
        let strategy = FinishableStrategy::StringField {
            field_path: ".status.phase".to_string(),
            finished_values: vec!["Succeeded".to_string(), "Failed".to_string()],
        };
        assert!(is_finished(&child, Some(&strategy)).unwrap());
    }

    #[test]
    fn is_finished_timestamp_field_requires_parseable_rfc3339() {
        let child: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": "x"},
            "status": {},
        }))
        .unwrap();
        let strategy = FinishableStrategy::TimestampField {
            field_path: ".status.completionTime".to_string(),
        };
        assert!(!is_finished(&child, Some(&strategy)).unwrap());
    }

    #[test]
    fn no_finishable_strategy_means_never_finished() {
        let child: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": "x"},
        }))
        .unwrap();
        assert!(!is_finished(&child, None).unwrap());
    }

    #[test]
    fn format_schedule_time_defaults_to_unix_seconds() {
        let t = dt("2026-01-01T00:00:00Z");
        assert_eq!(format_schedule_time(t, None), t.timestamp().to_string());
    }

    #[test]
    fn format_schedule_time_honors_go_style_layout() {
        let t = dt("2026-03-05T13:04:05Z");
        assert_eq!(format_schedule_time(t, Some("20060102-150405")), "20260305-130405");
    }

    fn finished_child(name: &str, created: &str) -> (DynamicObject, bool) {
        let obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": name, "creationTimestamp": created},
        }))
        .unwrap();
        (obj, true)
    }

    fn unfinished_child(name: &str) -> (DynamicObject, bool) {
        let obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": name},
        }))
        .unwrap();
        (obj, false)
    }

    /// Testable property 6 (`§8`): with `historyCountLimit = k` and more than `k`
    /// finished children, exactly the oldest `count - k` are pruned and no
    /// unfinished child is ever selected.
    #[test]
    fn retention_by_count_keeps_newest_k_finished() {
        let children = vec![
            finished_child("c1", "2026-01-04T00:00:00Z"),
            finished_child("c2", "2026-01-03T00:00:00Z"),
            finished_child("c3", "2026-01-02T00:00:00Z"),
            finished_child("c4", "2026-01-01T00:00:00Z"),
            unfinished_child("active"),
        ];
        let retention = cronanything_core::RetentionPolicy {
            history_count_limit: Some(2),
            history_time_limit_seconds: None,
            resource_timestamp_strategy: ResourceTimestampStrategy::CreationTimestamp,
        };
        let targets = select_prune_targets(&children, &retention, dt("2026-01-10T00:00:00Z"));
        // c1, c2 are the two newest finished children and are kept; c3, c4 are pruned.
        assert_eq!(targets.len(), 2);
        assert!(targets.contains(&2)); // c3
        assert!(targets.contains(&3)); // c4
        assert!(!targets.contains(&4)); // the unfinished child is never a target
    }

    /// Testable property 7 (`§8`): every finished child older than
    /// `historyTimeLimitSeconds` is pruned; nothing younger is touched.
    #[test]
    fn retention_by_time_prunes_only_stale_finished_children() {
        let children = vec![
            finished_child("fresh", "2026-01-09T23:00:00Z"), // 1h old
            finished_child("stale", "2026-01-01T00:00:00Z"), // 9 days old
            unfinished_child("active"),
        ];
        let retention = cronanything_core::RetentionPolicy {
            history_count_limit: None,
            history_time_limit_seconds: Some(86_400), // 1 day
            resource_timestamp_strategy: ResourceTimestampStrategy::CreationTimestamp,
        };
        let targets = select_prune_targets(&children, &retention, dt("2026-01-10T00:00:00Z"));
        assert_eq!(targets.len(), 1);
        assert!(targets.contains(&1)); // "stale"
    }
}
