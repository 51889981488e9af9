use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use base64::Engine;
use indexmap::IndexMap;
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tracing::warn;

use crate::api::{unwrap_page, BackendClient};
use crate::error::{Error, PartitionFailure, Result};
use crate::models::{
    ApplyOutcome, AssetKind, AssetRef, BatchAction, BatchApplyResponse, TermReport,
};

/// Minimum accepted length for a teacher remark, in characters.
pub const MIN_REMARK_CHARS: usize = 50;

const REPORTS_ENDPOINT: &str = "/api/term-reports/";
const BULK_APPLY_ENDPOINT: &str = "/api/term-reports/bulk-apply/";
const UPLOADS_ENDPOINT: &str = "/api/uploads/";

#[derive(Default)]
struct WorkflowState {
    reports: Vec<TermReport>,
    // Explicit id -> education-level index, rebuilt with the listing, so
    // grouping never rescans the full report list.
    partition_index: HashMap<i64, String>,
    selection: BTreeSet<i64>,
    pending_upload: Option<AssetRef>,
    last_outcome: Option<ApplyOutcome>,
}

/// Applies signatures, stamps and remarks to term reports in bulk. The
/// backend only accepts single-education-level batch calls, so a selection
/// spanning levels is grouped and dispatched as one concurrent request per
/// level, with the per-level `updated_count` replies summed into one
/// user-facing total.
pub struct RemarksWorkflow {
    backend: Arc<dyn BackendClient>,
    state: Mutex<WorkflowState>,
}

impl RemarksWorkflow {
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self {
            backend,
            state: Mutex::new(WorkflowState::default()),
        }
    }

    /// Fetch the term-report listing and rebuild the partition index. The
    /// index is treated as read-only while a batch operation is running and
    /// refreshed only between operations.
    pub async fn load_reports(&self, filters: &[(&str, &str)]) -> Result<usize> {
        let raw = self.backend.get(REPORTS_ENDPOINT, filters).await?;
        let reports: Vec<TermReport> = unwrap_page(REPORTS_ENDPOINT, raw)?;

        let mut state = self.state.lock().unwrap();
        state.partition_index = reports
            .iter()
            .map(|report| (report.id, report.education_level.clone()))
            .collect();
        let count = reports.len();
        state.reports = reports;
        Ok(count)
    }

    pub fn reports(&self) -> Vec<TermReport> {
        self.state.lock().unwrap().reports.clone()
    }

    pub fn report(&self, id: i64) -> Option<TermReport> {
        let state = self.state.lock().unwrap();
        state.reports.iter().find(|r| r.id == id).cloned()
    }

    pub fn select(&self, id: i64) -> bool {
        self.state.lock().unwrap().selection.insert(id)
    }

    pub fn deselect(&self, id: i64) -> bool {
        self.state.lock().unwrap().selection.remove(&id)
    }

    pub fn clear_selection(&self) {
        self.state.lock().unwrap().selection.clear();
    }

    pub fn selected(&self) -> BTreeSet<i64> {
        self.state.lock().unwrap().selection.clone()
    }

    pub fn pending_upload(&self) -> Option<AssetRef> {
        self.state.lock().unwrap().pending_upload.clone()
    }

    pub fn last_outcome(&self) -> Option<ApplyOutcome> {
        self.state.lock().unwrap().last_outcome.clone()
    }

    /// Upload a signature or stamp image and keep its reference as the
    /// pending asset for the next batch apply.
    pub async fn upload_asset(
        &self,
        kind: AssetKind,
        filename: &str,
        bytes: &[u8],
    ) -> Result<AssetRef> {
        let body = json!({
            "kind": kind.as_str(),
            "filename": filename,
            "content": base64::engine::general_purpose::STANDARD.encode(bytes),
        });
        let raw = self.backend.post(UPLOADS_ENDPOINT, body).await?;
        let asset: AssetRef = serde_json::from_value(raw).map_err(|e| Error::Decode {
            url: UPLOADS_ENDPOINT.to_string(),
            message: e.to_string(),
        })?;
        self.state.lock().unwrap().pending_upload = Some(asset.clone());
        Ok(asset)
    }

    /// Apply one batch action to the current selection.
    ///
    /// The selection is grouped by education level through the partition
    /// index; ids absent from the cached listing are silently excluded.
    /// One request per education level is dispatched, concurrently and
    /// independently: a failing level never cancels or rolls back another,
    /// and its error joins the outcome instead of aborting it. Only when
    /// every level fails is the operation itself an error. On success the
    /// selection and any pending upload are cleared for the next operation.
    pub async fn apply_to_selection(&self, action: BatchAction) -> Result<ApplyOutcome> {
        action.validate()?;

        let groups: IndexMap<String, Vec<i64>> = {
            let state = self.state.lock().unwrap();
            if state.selection.is_empty() {
                return Err(Error::EmptySelection);
            }
            let mut groups: IndexMap<String, Vec<i64>> = IndexMap::new();
            for id in &state.selection {
                if let Some(partition) = state.partition_index.get(id) {
                    groups.entry(partition.clone()).or_default().push(*id);
                }
            }
            groups
        };

        let mut requests = JoinSet::new();
        let mut outstanding: BTreeSet<String> = BTreeSet::new();
        for (partition, ids) in groups {
            outstanding.insert(partition.clone());
            let backend = Arc::clone(&self.backend);
            let mut body = action.body_fields();
            if let Value::Object(map) = &mut body {
                map.insert("education_level".to_string(), json!(partition));
                map.insert("report_ids".to_string(), json!(ids));
            }
            requests.spawn(async move {
                let reply = backend.post(BULK_APPLY_ENDPOINT, body).await;
                (partition, reply)
            });
        }

        let mut outcome = ApplyOutcome::default();
        while let Some(joined) = requests.join_next().await {
            let (partition, reply) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(error = %err, "batch partition task failed");
                    continue;
                }
            };
            outstanding.remove(&partition);
            let parsed = reply.and_then(|value| {
                serde_json::from_value::<BatchApplyResponse>(value).map_err(|e| Error::Decode {
                    url: BULK_APPLY_ENDPOINT.to_string(),
                    message: e.to_string(),
                })
            });
            match parsed {
                Ok(response) => {
                    outcome.updated_total += response.updated_count;
                    outcome.succeeded_partitions.push(partition);
                }
                Err(err) => {
                    warn!(partition = %partition, error = %err, "batch apply failed for partition");
                    outcome.failed_partitions.push(PartitionFailure {
                        partition,
                        message: err.to_string(),
                    });
                }
            }
        }

        // A request task that died before reporting leaves its partition
        // unaccounted for; it updated nothing, so it counts as a failure.
        for partition in outstanding {
            warn!(partition = %partition, "batch partition task died before reporting");
            outcome.failed_partitions.push(PartitionFailure {
                partition,
                message: "partition request task failed before completing".to_string(),
            });
        }

        // Completion order is arbitrary; keep the report stable for display.
        outcome.succeeded_partitions.sort();
        outcome.failed_partitions.sort_by(|a, b| a.partition.cmp(&b.partition));

        let mut state = self.state.lock().unwrap();
        if !outcome.succeeded_partitions.is_empty() {
            state.selection.clear();
            state.pending_upload = None;
            state.last_outcome = Some(outcome.clone());
            Ok(outcome)
        } else if !outcome.failed_partitions.is_empty() {
            Err(Error::AllPartitionsFailed {
                failures: outcome.failed_partitions,
            })
        } else {
            // Every selected id was absent from the cached listing: nothing
            // was submitted and nothing is claimed as updated. The
            // selection stays so the user can see what did not resolve.
            state.last_outcome = Some(outcome.clone());
            Ok(outcome)
        }
    }

    /// Update one report's teacher remark. The text must be at least
    /// [`MIN_REMARK_CHARS`] characters; shorter input is rejected before
    /// any network call. The cached report reflects the new text only after
    /// the server confirms it.
    pub async fn update_single_remark(
        &self,
        report_id: i64,
        partition: &str,
        text: &str,
    ) -> Result<TermReport> {
        if text.chars().count() < MIN_REMARK_CHARS {
            return Err(Error::Validation(format!(
                "remark must be at least {} characters",
                MIN_REMARK_CHARS
            )));
        }

        let path = format!("{}{}/", REPORTS_ENDPOINT, report_id);
        let body = json!({ "education_level": partition, "teacher_remark": text });
        let raw = self.backend.patch(&path, body).await?;
        let updated: TermReport = serde_json::from_value(raw).map_err(|e| Error::Decode {
            url: path,
            message: e.to_string(),
        })?;

        let mut state = self.state.lock().unwrap();
        if let Some(report) = state.reports.iter_mut().find(|r| r.id == report_id) {
            report.teacher_remark = updated.teacher_remark.clone();
        }
        Ok(updated)
    }
}
