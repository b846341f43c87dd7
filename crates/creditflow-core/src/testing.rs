//! In-memory repositories, a scripted `ApiCaller` and workflow fixtures for
//! unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use creditflow_types::application::{
    Application, ApplicationFilter, ApplicationStatus, ExecutionLogEntry,
};
use creditflow_types::deployment::{Deployment, DeploymentStatus};
use creditflow_types::error::RepositoryError;
use creditflow_types::scorecard::{
    Attribute, AttributeBin, BinCounts, Characteristic, Scorecard, ScorecardStatus,
};
use creditflow_types::workflow::{
    ApiConfig, DecisionConfig, Edge, EndConfig, FailurePolicy, FieldType, FormField, Node,
    NodeKind, Outcome, ScoreConfig, StartConfig, Workflow, WorkflowStatus,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::repository::application::ApplicationRepository;
use crate::repository::deployment::DeploymentRepository;
use crate::repository::scorecard::ScorecardRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::workflow::api_call::{ApiCallError, ApiCaller, ApiRequest};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct State {
    workflows: HashMap<Uuid, Workflow>,
    versions: HashMap<(Uuid, String), Workflow>,
    applications: HashMap<Uuid, Application>,
    logs: Vec<ExecutionLogEntry>,
    scorecards: HashMap<Uuid, Scorecard>,
    characteristics: HashMap<Uuid, Characteristic>,
    attributes: HashMap<Uuid, Attribute>,
    deployments: HashMap<Uuid, Deployment>,
    /// Operation name -> number of upcoming calls that should fail.
    failures: HashMap<&'static str, usize>,
}

/// One shared store implementing every repository trait. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Make the next `times` calls to the named repository operation fail
    /// with a query error.
    pub fn fail_next(&self, operation: &'static str, times: usize) {
        self.with(|s| {
            s.failures.insert(operation, times);
        });
    }

    fn injected_failure(s: &mut State, operation: &'static str) -> Result<(), RepositoryError> {
        match s.failures.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(RepositoryError::Query(format!("{operation}: disk full")))
            }
            _ => Ok(()),
        }
    }

    /// Store a workflow and, if it is active, its version snapshot.
    pub fn insert_workflow(&self, workflow: &Workflow) {
        self.with(|s| {
            s.workflows.insert(workflow.id, workflow.clone());
            if workflow.status == WorkflowStatus::Active {
                s.versions
                    .insert((workflow.id, workflow.version.clone()), workflow.clone());
            }
        });
    }

    /// Store a scorecard tree in one go.
    pub fn insert_scorecard(&self, scorecard: &Scorecard) {
        self.with(|s| {
            for c in &scorecard.characteristics {
                for a in &c.attributes {
                    s.attributes.insert(a.id, a.clone());
                }
                let mut header = c.clone();
                header.attributes.clear();
                s.characteristics.insert(c.id, header);
            }
            let mut header = scorecard.clone();
            header.characteristics.clear();
            s.scorecards.insert(scorecard.id, header);
        });
    }

    pub fn insert_application(&self, application: &Application) {
        self.with(|s| {
            s.applications.insert(application.id, application.clone());
        });
    }

    pub fn logs(&self, application_id: &Uuid) -> Vec<ExecutionLogEntry> {
        self.with(|s| {
            s.logs
                .iter()
                .filter(|e| e.application_id == *application_id)
                .cloned()
                .collect()
        })
    }

    pub fn application(&self, id: &Uuid) -> Option<Application> {
        self.with(|s| s.applications.get(id).cloned())
    }

    fn assemble(s: &State, header: &Scorecard) -> Scorecard {
        let mut scorecard = header.clone();
        let mut characteristics: Vec<Characteristic> = s
            .characteristics
            .values()
            .filter(|c| c.scorecard_id == header.id)
            .cloned()
            .map(|mut c| {
                c.attributes = Self::attributes_of(s, &c.id);
                c
            })
            .collect();
        characteristics.sort_by_key(|c| c.order);
        scorecard.characteristics = characteristics;
        scorecard
    }

    fn attributes_of(s: &State, characteristic_id: &Uuid) -> Vec<Attribute> {
        let mut attributes: Vec<Attribute> = s
            .attributes
            .values()
            .filter(|a| a.characteristic_id == *characteristic_id)
            .cloned()
            .collect();
        attributes.sort_by_key(|a| a.id);
        attributes
    }
}

impl WorkflowRepository for MemoryStore {
    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        self.with(|s| {
            s.workflows.insert(workflow.id, workflow.clone());
        });
        Ok(())
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.with(|s| s.workflows.get(id).cloned()))
    }

    async fn list_workflows(
        &self,
        status: Option<WorkflowStatus>,
    ) -> Result<Vec<Workflow>, RepositoryError> {
        Ok(self.with(|s| {
            let mut list: Vec<Workflow> = s
                .workflows
                .values()
                .filter(|w| status.is_none_or(|st| w.status == st))
                .cloned()
                .collect();
            list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            list
        }))
    }

    async fn delete_workflow(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.with(|s| s.workflows.remove(id).is_some()))
    }

    async fn save_version(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        self.with(|s| {
            let key = (workflow.id, workflow.version.clone());
            if s.versions.contains_key(&key) {
                return Err(RepositoryError::Conflict(format!(
                    "version {} already recorded",
                    workflow.version
                )));
            }
            s.versions.insert(key, workflow.clone());
            Ok(())
        })
    }

    async fn get_version(
        &self,
        id: &Uuid,
        version: &str,
    ) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.with(|s| s.versions.get(&(*id, version.to_string())).cloned()))
    }

    async fn list_versions(&self, id: &Uuid) -> Result<Vec<String>, RepositoryError> {
        Ok(self.with(|s| {
            let mut versions: Vec<(DateTime<Utc>, String)> = s
                .versions
                .iter()
                .filter(|((wid, _), _)| wid == id)
                .map(|((_, v), w)| (w.updated_at, v.clone()))
                .collect();
            versions.sort();
            versions.into_iter().map(|(_, v)| v).collect()
        }))
    }
}

impl ApplicationRepository for MemoryStore {
    async fn create_application(&self, application: &Application) -> Result<(), RepositoryError> {
        self.insert_application(application);
        Ok(())
    }

    async fn get_application(&self, id: &Uuid) -> Result<Option<Application>, RepositoryError> {
        Ok(self.application(id))
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError> {
        Ok(self.with(|s| {
            let mut list: Vec<Application> = s
                .applications
                .values()
                .filter(|a| filter.status.is_none_or(|st| a.status == st))
                .filter(|a| filter.workflow_id.is_none_or(|w| a.workflow_id == w))
                .cloned()
                .collect();
            list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            list.into_iter()
                .skip(filter.offset.unwrap_or(0) as usize)
                .take(filter.limit.map_or(usize::MAX, |l| l as usize))
                .collect()
        }))
    }

    async fn count_applications(&self, filter: &ApplicationFilter) -> Result<u64, RepositoryError> {
        Ok(self.with(|s| {
            s.applications
                .values()
                .filter(|a| filter.status.is_none_or(|st| a.status == st))
                .filter(|a| filter.workflow_id.is_none_or(|w| a.workflow_id == w))
                .count() as u64
        }))
    }

    async fn transition_status(
        &self,
        id: &Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<bool, RepositoryError> {
        Ok(self.with(|s| match s.applications.get_mut(id) {
            Some(app) if app.status == from => {
                app.status = to;
                app.updated_at = Utc::now();
                true
            }
            _ => false,
        }))
    }

    async fn finish_application(&self, application: &Application) -> Result<(), RepositoryError> {
        self.with(|s| {
            Self::injected_failure(s, "finish_application")?;
            match s.applications.get_mut(&application.id) {
                Some(app) => {
                    app.status = application.status;
                    app.score = application.score;
                    app.result = application.result.clone();
                    app.completed_at = application.completed_at;
                    app.updated_at = application.updated_at;
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
            }
        })
    }

    async fn delete_application(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.with(|s| s.applications.remove(id).is_some()))
    }

    async fn append_log(&self, entry: &ExecutionLogEntry) -> Result<(), RepositoryError> {
        self.with(|s| s.logs.push(entry.clone()));
        Ok(())
    }

    async fn list_logs(&self, application_id: &Uuid) -> Result<Vec<ExecutionLogEntry>, RepositoryError> {
        let mut logs = self.logs(application_id);
        logs.sort_by_key(|e| e.sequence);
        Ok(logs)
    }
}

impl ScorecardRepository for MemoryStore {
    async fn save_scorecard(&self, scorecard: &Scorecard) -> Result<(), RepositoryError> {
        self.with(|s| {
            let mut header = scorecard.clone();
            header.characteristics.clear();
            s.scorecards.insert(scorecard.id, header);
        });
        Ok(())
    }

    async fn get_scorecard(&self, id: &Uuid) -> Result<Option<Scorecard>, RepositoryError> {
        Ok(self.with(|s| s.scorecards.get(id).map(|h| Self::assemble(s, h))))
    }

    async fn list_scorecards(&self) -> Result<Vec<Scorecard>, RepositoryError> {
        Ok(self.with(|s| {
            let mut list: Vec<Scorecard> =
                s.scorecards.values().map(|h| Self::assemble(s, h)).collect();
            list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            list
        }))
    }

    async fn delete_scorecard(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.with(|s| {
            let removed: Vec<Uuid> = s
                .characteristics
                .values()
                .filter(|c| c.scorecard_id == *id)
                .map(|c| c.id)
                .collect();
            for cid in &removed {
                s.characteristics.remove(cid);
                s.attributes.retain(|_, a| a.characteristic_id != *cid);
            }
            s.scorecards.remove(id).is_some()
        }))
    }

    async fn save_characteristic(&self, characteristic: &Characteristic) -> Result<(), RepositoryError> {
        self.with(|s| {
            let mut header = characteristic.clone();
            header.attributes.clear();
            s.characteristics.insert(characteristic.id, header);
        });
        Ok(())
    }

    async fn get_characteristic(&self, id: &Uuid) -> Result<Option<Characteristic>, RepositoryError> {
        Ok(self.with(|s| {
            s.characteristics.get(id).cloned().map(|mut c| {
                c.attributes = Self::attributes_of(s, &c.id);
                c
            })
        }))
    }

    async fn delete_characteristic(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.with(|s| {
            s.attributes.retain(|_, a| a.characteristic_id != *id);
            s.characteristics.remove(id).is_some()
        }))
    }

    async fn save_attribute(&self, attribute: &Attribute) -> Result<(), RepositoryError> {
        self.with(|s| {
            s.attributes.insert(attribute.id, attribute.clone());
        });
        Ok(())
    }

    async fn delete_attribute(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.with(|s| s.attributes.remove(id).is_some()))
    }
}

impl DeploymentRepository for MemoryStore {
    async fn save_deployment(&self, deployment: &Deployment) -> Result<(), RepositoryError> {
        self.with(|s| {
            Self::injected_failure(s, "save_deployment")?;
            let taken = s.deployments.values().any(|d| {
                d.id != deployment.id
                    && d.status == DeploymentStatus::Active
                    && deployment.status == DeploymentStatus::Active
                    && d.api_path == deployment.api_path
            });
            if taken {
                return Err(RepositoryError::Conflict(format!(
                    "api path {} in use",
                    deployment.api_path
                )));
            }
            let mut stored = deployment.clone();
            if let Some(existing) = s.deployments.get(&deployment.id) {
                stored.execution_count = existing.execution_count;
                stored.last_executed_at = existing.last_executed_at;
            }
            s.deployments.insert(deployment.id, stored);
            Ok(())
        })
    }

    async fn get_deployment(&self, id: &Uuid) -> Result<Option<Deployment>, RepositoryError> {
        Ok(self.with(|s| s.deployments.get(id).cloned()))
    }

    async fn list_deployments(&self, active_only: bool) -> Result<Vec<Deployment>, RepositoryError> {
        Ok(self.with(|s| {
            let mut list: Vec<Deployment> = s
                .deployments
                .values()
                .filter(|d| !active_only || d.status == DeploymentStatus::Active)
                .cloned()
                .collect();
            list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            list
        }))
    }

    async fn record_execution(&self, id: &Uuid, at: DateTime<Utc>) -> Result<u64, RepositoryError> {
        self.with(|s| match s.deployments.get_mut(id) {
            Some(d) => {
                d.execution_count += 1;
                d.last_executed_at = Some(at);
                Ok(d.execution_count)
            }
            None => Err(RepositoryError::NotFound),
        })
    }
}

// ---------------------------------------------------------------------------
// Scripted ApiCaller
// ---------------------------------------------------------------------------

/// Answers calls by URL. Unknown URLs fail with a transport error; URLs
/// registered with [`StubApiCaller::hang`] never answer.
#[derive(Default)]
pub struct StubApiCaller {
    responses: Mutex<HashMap<String, Result<Value, ApiCallError>>>,
    hanging: Mutex<Vec<String>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl StubApiCaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, response: Result<Value, ApiCallError>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
        self
    }

    pub fn hang(self, url: &str) -> Self {
        self.hanging.lock().unwrap().push(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl ApiCaller for StubApiCaller {
    fn call(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ApiCallError>> + Send + '_>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request.clone());
            let hangs = self.hanging.lock().unwrap().contains(&request.url);
            if hangs {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.responses
                .lock()
                .unwrap()
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| Err(ApiCallError::Transport(format!("connection refused: {}", request.url))))
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn start_node(id: &str, fields: &[(&str, FieldType, bool)]) -> Node {
    Node::new(
        id,
        "Start",
        NodeKind::Start(StartConfig {
            form_fields: fields
                .iter()
                .map(|(name, field_type, required)| FormField {
                    name: name.to_string(),
                    field_type: *field_type,
                    required: *required,
                    description: String::new(),
                })
                .collect(),
        }),
    )
}

pub fn end_node(id: &str, outcome: Outcome) -> Node {
    Node::new(
        id,
        id,
        NodeKind::End(EndConfig {
            outcome,
            output_fields: Vec::new(),
        }),
    )
}

pub fn decision_node(id: &str) -> Node {
    Node::new(id, id, NodeKind::Decision(DecisionConfig::default()))
}

pub fn score_node(id: &str, scorecard_id: Uuid) -> Node {
    Node::new(
        id,
        id,
        NodeKind::Score(ScoreConfig {
            scorecard_id,
            field_mapping: HashMap::new(),
        }),
    )
}

pub fn api_node(id: &str, url: &str, on_failure: FailurePolicy) -> Node {
    Node::new(
        id,
        id,
        NodeKind::Api(ApiConfig {
            method: "POST".to_string(),
            url: url.to_string(),
            field_mapping: HashMap::new(),
            result_key: None,
            on_failure,
            timeout_secs: None,
        }),
    )
}

/// An active workflow at version 1.0.0.
pub fn active_workflow(name: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Workflow {
    let now = Utc::now();
    Workflow {
        id: Uuid::now_v7(),
        name: name.to_string(),
        description: String::new(),
        version: "1.0.0".to_string(),
        status: WorkflowStatus::Active,
        nodes,
        edges,
        created_at: now,
        updated_at: now,
    }
}

/// A pending application pinned to `workflow`.
pub fn pending_application(workflow: &Workflow, data: Value) -> Application {
    let now = Utc::now();
    Application {
        id: Uuid::now_v7(),
        workflow_id: workflow.id,
        workflow_version: workflow.version.clone(),
        applicant_name: None,
        applicant_id: None,
        application_data: match data {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        status: ApplicationStatus::Pending,
        score: None,
        result: None,
        created_at: now,
        updated_at: now,
        completed_at: None,
    }
}

/// Single-characteristic scorecard on `income` with a low and a high band.
pub fn income_scorecard() -> Scorecard {
    let now = Utc::now();
    let scorecard_id = Uuid::now_v7();
    let characteristic_id = Uuid::now_v7();
    let band = |label: &str, min: f64, max: f64, good: u64, bad: u64| Attribute {
        id: Uuid::now_v7(),
        characteristic_id,
        label: label.to_string(),
        bin: AttributeBin::Range { min, max },
        counts: BinCounts {
            good_count: good,
            bad_count: bad,
            total_good: 100,
            total_bad: 100,
        },
    };
    Scorecard {
        id: scorecard_id,
        name: "Income card".to_string(),
        description: String::new(),
        base_score: 600.0,
        pdo: 20.0,
        base_odds: 50.0,
        status: ScorecardStatus::Active,
        characteristics: vec![Characteristic {
            id: characteristic_id,
            scorecard_id,
            name: "income".to_string(),
            description: String::new(),
            weight: 100.0,
            order: 0,
            attributes: vec![
                band("low", 0.0, 30_000.0, 20, 60),
                band("high", 30_000.0, 1e9, 80, 40),
            ],
        }],
        created_at: now,
        updated_at: now,
    }
}
