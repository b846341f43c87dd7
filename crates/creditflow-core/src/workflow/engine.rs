//! Execution engine: walks a pinned workflow snapshot for one application.
//!
//! Each application runs as a single ordered sequence of node visits. Every
//! visit appends exactly one execution log entry before the cursor moves on.
//! A failed run gets one extra `workflow_execution` entry describing the
//! error, and the application lands in `error` with the error recorded in its
//! result.
//!
//! The `ConditionEvaluator` is built inside synchronous routing code and never
//! held across an await point.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use creditflow_types::application::{
    Application, ApplicationStatus, ExecutionLogEntry, ExecutionResult, LogStatus,
};
use creditflow_types::config::EngineConfig;
use creditflow_types::error::{ExecutionError, RepositoryError};
use creditflow_types::scorecard::ScoreResult;
use creditflow_types::workflow::{
    ApiConfig, DecisionConfig, Edge, EndConfig, FailurePolicy, Node, NodeKind, Outcome,
    ScoreConfig, Workflow,
};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::api_call::{ApiCallError, ApiCaller, ApiRequest};
use super::expression::{ConditionEvaluator, normalize_numbers};
use super::graph;
use crate::repository::application::ApplicationRepository;
use crate::repository::scorecard::ScorecardRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::scorecard::calculator::score_with_mapping;

// ---------------------------------------------------------------------------
// Execution context
// ---------------------------------------------------------------------------

/// Mutable state of one run. The application's own data is borrowed and
/// never written to; outbound responses land in `results`.
struct ExecutionContext<'a> {
    application_data: &'a Map<String, Value>,
    score: Option<ScoreResult>,
    results: Map<String, Value>,
    outputs: Map<String, Value>,
    warnings: Vec<String>,
}

impl<'a> ExecutionContext<'a> {
    fn new(application_data: &'a Map<String, Value>) -> Self {
        Self {
            application_data,
            score: None,
            results: Map::new(),
            outputs: Map::new(),
            warnings: Vec::new(),
        }
    }

    /// Object passed to condition expressions: application fields at top
    /// level plus `score`, `probability`, `grade` and `results`.
    fn expression_context(&self) -> Value {
        let mut ctx = self.application_data.clone();
        let (score, probability, grade) = match &self.score {
            Some(s) => (json!(s.total_score), json!(s.probability), json!(s.grade)),
            None => (Value::Null, Value::Null, Value::Null),
        };
        ctx.insert("score".to_string(), score);
        ctx.insert("probability".to_string(), probability);
        ctx.insert("grade".to_string(), grade);
        ctx.insert("results".to_string(), Value::Object(self.results.clone()));
        normalize_numbers(Value::Object(ctx))
    }

    /// Value of an end node output field: outbound results first, then the
    /// scoring result, then application data.
    fn lookup(&self, name: &str) -> Value {
        if let Some(v) = self.results.get(name) {
            return v.clone();
        }
        if let Some(s) = &self.score {
            match name {
                "score" | "total_score" => return json!(s.total_score),
                "probability" => return json!(s.probability),
                "grade" => return json!(s.grade),
                _ => {}
            }
        }
        self.application_data.get(name).cloned().unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Node step results
// ---------------------------------------------------------------------------

enum Next<'w> {
    Edge(&'w Edge),
    Finish(Outcome),
}

/// A node visit that lets the run continue (possibly with an error entry,
/// as for an `api` node with `on_failure: continue`).
struct NodeStep<'w> {
    status: LogStatus,
    input: Value,
    output: Value,
    error_message: Option<String>,
    next: Next<'w>,
}

impl<'w> NodeStep<'w> {
    fn success(input: Value, output: Value, next: Next<'w>) -> Self {
        Self {
            status: LogStatus::Success,
            input,
            output,
            error_message: None,
            next,
        }
    }
}

/// A node visit that halts the run.
struct NodeFailure {
    input: Value,
    output: Value,
    error: ExecutionError,
}

impl NodeFailure {
    fn new(input: Value, error: ExecutionError) -> Self {
        Self {
            input,
            output: Value::Null,
            error,
        }
    }
}

enum RunOutcome {
    Finished { outcome: Outcome, end_node: String },
    Failed(ExecutionError),
}

// ---------------------------------------------------------------------------
// Execution log writer
// ---------------------------------------------------------------------------

struct ExecutionLog<'r, A> {
    repo: &'r A,
    application_id: Uuid,
    sequence: u32,
}

impl<A: ApplicationRepository> ExecutionLog<'_, A> {
    #[allow(clippy::too_many_arguments)]
    async fn append(
        &mut self,
        node: Option<&Node>,
        action: &str,
        status: LogStatus,
        input: Option<Value>,
        output: Option<Value>,
        error_message: Option<String>,
        execution_time: Option<f64>,
    ) -> Result<(), RepositoryError> {
        let entry = ExecutionLogEntry {
            id: Uuid::now_v7(),
            application_id: self.application_id,
            sequence: self.sequence,
            node_id: node.map(|n| n.node_id.clone()),
            node_type: node.map(Node::node_type),
            action: action.to_string(),
            input_data: input,
            output_data: output,
            status,
            error_message,
            execution_time,
            created_at: Utc::now(),
        };
        self.repo.append_log(&entry).await?;
        self.sequence += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ExecutionEngine
// ---------------------------------------------------------------------------

/// Runs applications through their pinned workflow version.
///
/// Generic over the repositories it reads; outbound calls go through the
/// `ApiCaller` seam.
pub struct ExecutionEngine<W, A, S> {
    workflows: W,
    applications: A,
    scorecards: S,
    api_caller: Arc<dyn ApiCaller>,
    config: EngineConfig,
}

impl<W, A, S> ExecutionEngine<W, A, S>
where
    W: WorkflowRepository,
    A: ApplicationRepository,
    S: ScorecardRepository,
{
    pub fn new(
        workflows: W,
        applications: A,
        scorecards: S,
        api_caller: Arc<dyn ApiCaller>,
        config: EngineConfig,
    ) -> Self {
        Self {
            workflows,
            applications,
            scorecards,
            api_caller,
            config,
        }
    }

    /// Execute a pending application to a terminal state.
    ///
    /// Node-level failures are not returned as `Err`: the application moves
    /// to `error` and the returned result carries the error code, message
    /// and node id. `Err` is reserved for applications that cannot start
    /// (unknown, not pending) and storage failures.
    pub async fn execute(&self, application_id: &Uuid) -> Result<ExecutionResult, ExecutionError> {
        self.execute_tagged(application_id, Map::new()).await
    }

    /// Like [`execute`](Self::execute), merging `tags` into the stored result.
    pub async fn execute_tagged(
        &self,
        application_id: &Uuid,
        tags: Map<String, Value>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let mut application = self
            .applications
            .get_application(application_id)
            .await?
            .ok_or(ExecutionError::ApplicationNotFound(*application_id))?;

        if application.status != ApplicationStatus::Pending {
            return Err(ExecutionError::AlreadyTerminal {
                status: application.status,
            });
        }

        // Lost a race with another executor: report what it moved us to.
        if !self
            .applications
            .transition_status(application_id, ApplicationStatus::Pending, ApplicationStatus::Processing)
            .await?
        {
            let status = self
                .applications
                .get_application(application_id)
                .await?
                .map_or(application.status, |a| a.status);
            return Err(ExecutionError::AlreadyTerminal { status });
        }
        application.status = ApplicationStatus::Processing;

        tracing::info!(
            application_id = %application.id,
            workflow_id = %application.workflow_id,
            version = application.workflow_version.as_str(),
            "executing application"
        );

        let started = Instant::now();
        let mut log = ExecutionLog {
            repo: &self.applications,
            application_id: application.id,
            sequence: 0,
        };
        let mut ctx = ExecutionContext::new(&application.application_data);

        let outcome = match self.walk(&application, &mut ctx, &mut log).await {
            Ok((outcome, end_node)) => RunOutcome::Finished { outcome, end_node },
            Err(error) => RunOutcome::Failed(error),
        };

        let (status, mut result) = match outcome {
            RunOutcome::Finished { outcome, end_node } => {
                let status = match outcome {
                    Outcome::Approved => ApplicationStatus::Completed,
                    Outcome::Rejected => ApplicationStatus::Rejected,
                };
                (status, json!({ "outcome": outcome, "end_node": end_node }))
            }
            RunOutcome::Failed(error) => {
                tracing::warn!(
                    application_id = %application.id,
                    code = error.code(),
                    error = %error,
                    "application execution failed"
                );
                let error_json = json!({
                    "code": error.code(),
                    "message": error.to_string(),
                    "node_id": error.node_id(),
                });
                if let Err(e) = log
                    .append(
                        None,
                        "workflow_execution",
                        LogStatus::Error,
                        None,
                        Some(json!({ "error": error_json.clone() })),
                        Some(error.to_string()),
                        Some(started.elapsed().as_secs_f64()),
                    )
                    .await
                {
                    tracing::warn!(application_id = %application.id, error = %e, "failed to append workflow error entry");
                }
                (ApplicationStatus::Error, json!({ "error": error_json }))
            }
        };

        let score = ctx.score.as_ref().map(|s| s.total_score);
        if let Value::Object(map) = &mut result {
            map.insert(
                "scoring".to_string(),
                ctx.score
                    .as_ref()
                    .map(|s| serde_json::to_value(s).unwrap_or_default())
                    .unwrap_or(Value::Null),
            );
            map.insert("results".to_string(), Value::Object(ctx.results));
            map.insert("outputs".to_string(), Value::Object(ctx.outputs));
            map.insert("warnings".to_string(), json!(ctx.warnings));
            map.extend(tags);
        }

        let now = Utc::now();
        application.status = status;
        application.score = score;
        application.result = Some(result.clone());
        application.completed_at = Some(now);
        application.updated_at = now;
        if let Err(e) = self.applications.finish_application(&application).await {
            tracing::error!(
                application_id = %application.id,
                error = %e,
                "failed to store execution result, marking application as error"
            );
            // Never leave the row in `processing`: it could neither run nor be deleted.
            if let Err(fallback) = self
                .applications
                .transition_status(&application.id, ApplicationStatus::Processing, ApplicationStatus::Error)
                .await
            {
                tracing::error!(application_id = %application.id, error = %fallback, "failed to mark application as error");
            }
            return Err(e.into());
        }

        tracing::info!(
            application_id = %application.id,
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "application execution finished"
        );

        Ok(ExecutionResult {
            application_id: application.id,
            status,
            score,
            result,
        })
    }

    /// Walk the graph from the start node until an end node is reached.
    async fn walk(
        &self,
        application: &Application,
        ctx: &mut ExecutionContext<'_>,
        log: &mut ExecutionLog<'_, A>,
    ) -> Result<(Outcome, String), ExecutionError> {
        let workflow = self
            .workflows
            .get_version(&application.workflow_id, &application.workflow_version)
            .await?
            .ok_or_else(|| ExecutionError::WorkflowNotFound {
                id: application.workflow_id,
                version: application.workflow_version.clone(),
            })?;

        let report = graph::validate(&workflow);
        if !report.valid {
            return Err(ExecutionError::InvalidWorkflow(report));
        }
        let Some(mut cursor) = workflow.start_nodes().next() else {
            return Err(ExecutionError::InvalidWorkflow(report));
        };

        let mut visited: HashSet<&str> = HashSet::new();
        loop {
            if visited.len() >= self.config.max_visits {
                return Err(ExecutionError::VisitLimitExceeded {
                    limit: self.config.max_visits,
                });
            }
            if !visited.insert(cursor.node_id.as_str()) {
                return Err(ExecutionError::CyclicWorkflow {
                    node_id: cursor.node_id.clone(),
                });
            }

            let started = Instant::now();
            let step = self.visit(&workflow, cursor, ctx).await;
            let elapsed = started.elapsed().as_secs_f64();

            tracing::debug!(
                node_id = cursor.node_id.as_str(),
                node_type = %cursor.node_type(),
                ok = step.is_ok(),
                "node visited"
            );

            let step = match step {
                Ok(step) => step,
                Err(failure) => {
                    log.append(
                        Some(cursor),
                        "execute",
                        LogStatus::Error,
                        Some(failure.input),
                        Some(failure.output),
                        Some(failure.error.to_string()),
                        Some(elapsed),
                    )
                    .await?;
                    return Err(failure.error);
                }
            };

            log.append(
                Some(cursor),
                "execute",
                step.status,
                Some(step.input),
                Some(step.output),
                step.error_message,
                Some(elapsed),
            )
            .await?;

            match step.next {
                Next::Finish(outcome) => return Ok((outcome, cursor.node_id.clone())),
                Next::Edge(edge) => {
                    cursor = workflow.node(&edge.target).ok_or_else(|| {
                        ExecutionError::UnknownNode {
                            node_id: edge.target.clone(),
                            source_id: cursor.node_id.clone(),
                        }
                    })?;
                }
            }
        }
    }

    async fn visit<'w>(
        &self,
        workflow: &'w Workflow,
        node: &'w Node,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<NodeStep<'w>, NodeFailure> {
        match &node.kind {
            NodeKind::Start(_) => {
                let input = Value::Object(ctx.application_data.clone());
                let edge = follow_default(workflow, node, &input)?;
                Ok(NodeStep::success(
                    input,
                    json!({ "next": edge.target }),
                    Next::Edge(edge),
                ))
            }
            NodeKind::Decision(config) => route_decision(workflow, node, config, ctx),
            NodeKind::Score(config) => self.run_score(workflow, node, config, ctx).await,
            NodeKind::Api(config) => self.run_api(workflow, node, config, ctx).await,
            NodeKind::End(config) => Ok(run_end(config, ctx)),
        }
    }

    async fn run_score<'w>(
        &self,
        workflow: &'w Workflow,
        node: &'w Node,
        config: &ScoreConfig,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<NodeStep<'w>, NodeFailure> {
        let input = json!({
            "scorecard_id": config.scorecard_id,
            "field_mapping": config.field_mapping,
        });

        let scorecard = match self.scorecards.get_scorecard(&config.scorecard_id).await {
            Ok(Some(scorecard)) => scorecard,
            Ok(None) => {
                return Err(NodeFailure::new(
                    input,
                    ExecutionError::ScorecardNotFound {
                        node_id: node.node_id.clone(),
                        scorecard_id: config.scorecard_id,
                    },
                ));
            }
            Err(e) => return Err(NodeFailure::new(input, e.into())),
        };

        let result = score_with_mapping(&scorecard, ctx.application_data, &config.field_mapping)
            .map_err(|e| {
                NodeFailure::new(
                    input.clone(),
                    ExecutionError::ScoringFailed {
                        node_id: node.node_id.clone(),
                        cause: e.to_string(),
                    },
                )
            })?;

        for entry in &result.breakdown {
            for warning in &entry.warnings {
                ctx.warnings
                    .push(format!("{}: {}", entry.characteristic, warning));
            }
        }

        let edge = follow_default(workflow, node, &input)?;
        let output = serde_json::to_value(&result).unwrap_or_default();
        ctx.score = Some(result);
        Ok(NodeStep::success(input, output, Next::Edge(edge)))
    }

    async fn run_api<'w>(
        &self,
        workflow: &'w Workflow,
        node: &'w Node,
        config: &ApiConfig,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<NodeStep<'w>, NodeFailure> {
        let timeout = Duration::from_secs(
            config.timeout_secs.unwrap_or(self.config.api_timeout_secs),
        );
        let request = ApiRequest {
            method: config.method.trim().to_uppercase(),
            url: config.url.clone(),
            body: request_body(config, ctx.application_data),
            timeout,
        };
        let input = json!({
            "method": request.method,
            "url": request.url,
            "body": request.body,
            "timeout_secs": timeout.as_secs(),
        });

        let response = match tokio::time::timeout(timeout, self.api_caller.call(request)).await {
            Ok(response) => response,
            Err(_) => Err(ApiCallError::Timeout(timeout)),
        };

        let result_key = config
            .result_key
            .clone()
            .unwrap_or_else(|| node.node_id.clone());

        match response {
            Ok(body) => {
                let edge = follow_default(workflow, node, &input)?;
                ctx.results.insert(result_key.clone(), body.clone());
                Ok(NodeStep::success(
                    input,
                    json!({ "result_key": result_key, "response": body }),
                    Next::Edge(edge),
                ))
            }
            Err(err) => {
                tracing::warn!(
                    node_id = node.node_id.as_str(),
                    url = config.url.as_str(),
                    policy = ?config.on_failure,
                    error = %err,
                    "api node call failed"
                );
                let output = json!({
                    "result_key": result_key,
                    "error": err.to_string(),
                    "on_failure": config.on_failure,
                });
                match config.on_failure {
                    FailurePolicy::Halt => Err(NodeFailure {
                        input,
                        output,
                        error: ExecutionError::ApiCallFailed {
                            node_id: node.node_id.clone(),
                            cause: err.to_string(),
                        },
                    }),
                    FailurePolicy::Continue => {
                        let edge = follow_default(workflow, node, &input)?;
                        ctx.warnings
                            .push(format!("api node '{}' failed: {err}", node.node_id));
                        Ok(NodeStep {
                            status: LogStatus::Error,
                            input,
                            output,
                            error_message: Some(err.to_string()),
                            next: Next::Edge(edge),
                        })
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Synchronous node behaviors
// ---------------------------------------------------------------------------

/// The edge a non-branching node follows: the first edge without a
/// condition, else the first edge.
fn follow_default<'w>(
    workflow: &'w Workflow,
    node: &'w Node,
    input: &Value,
) -> Result<&'w Edge, NodeFailure> {
    let mut first = None;
    for edge in workflow.outgoing(&node.node_id) {
        if edge.condition().is_none() {
            return Ok(edge);
        }
        first.get_or_insert(edge);
    }
    first.ok_or_else(|| {
        NodeFailure::new(
            input.clone(),
            ExecutionError::MissingOutgoingEdge {
                node_id: node.node_id.clone(),
                node_type: node.node_type(),
            },
        )
    })
}

/// Pick the outgoing edge of a decision node.
///
/// Edges are tried in declaration order. An edge with its own condition is
/// taken when it evaluates true; an edge with a `true`/`false` handle is
/// taken when it matches the node-level condition. The default edge (neither
/// condition nor handle) is used only when nothing else matched. Evaluation
/// errors count as false and are recorded in the output.
fn route_decision<'w>(
    workflow: &'w Workflow,
    node: &'w Node,
    config: &DecisionConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<NodeStep<'w>, NodeFailure> {
    let evaluator = ConditionEvaluator::new();
    let context = ctx.expression_context();
    let mut evaluations = Vec::new();

    let node_condition = config
        .condition
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let node_result = node_condition.map(|condition| {
        let result = evaluator.evaluate_bool(condition, &context);
        evaluations.push(evaluation_record(None, condition, &result));
        result.unwrap_or(false)
    });

    let mut default = None;
    let mut taken = None;
    for edge in workflow.outgoing(&node.node_id) {
        if let Some(condition) = edge.condition() {
            let result = evaluator.evaluate_bool(condition, &context);
            evaluations.push(evaluation_record(Some(&edge.id), condition, &result));
            if matches!(result, Ok(true)) {
                taken = Some(edge);
                break;
            }
        } else if let (Some(result), Some(handle)) = (node_result, edge.boolean_handle()) {
            if result == handle {
                taken = Some(edge);
                break;
            }
        } else if default.is_none() && !graph::is_conditioned(edge, node_result.is_some()) {
            default = Some(edge);
        }
    }

    let used_default = taken.is_none() && default.is_some();
    match taken.or(default) {
        Some(edge) => Ok(NodeStep::success(
            context,
            json!({
                "evaluations": evaluations,
                "selected_edge": edge.id,
                "default": used_default,
                "next": edge.target,
            }),
            Next::Edge(edge),
        )),
        None => Err(NodeFailure {
            input: context,
            output: json!({ "evaluations": evaluations }),
            error: ExecutionError::NoBranchMatched {
                node_id: node.node_id.clone(),
            },
        }),
    }
}

fn evaluation_record<E: std::fmt::Display>(
    edge_id: Option<&str>,
    condition: &str,
    result: &Result<bool, E>,
) -> Value {
    match result {
        Ok(value) => json!({ "edge_id": edge_id, "condition": condition, "result": value }),
        Err(e) => json!({
            "edge_id": edge_id,
            "condition": condition,
            "result": false,
            "error": e.to_string(),
        }),
    }
}

fn run_end<'w>(config: &EndConfig, ctx: &mut ExecutionContext<'_>) -> NodeStep<'w> {
    let outputs: Map<String, Value> = config
        .output_fields
        .iter()
        .map(|field| (field.name.clone(), ctx.lookup(&field.name)))
        .collect();
    ctx.outputs = outputs.clone();
    NodeStep::success(
        json!({ "outcome": config.outcome }),
        json!({ "outcome": config.outcome, "outputs": outputs }),
        Next::Finish(config.outcome),
    )
}

/// Request payload: mapped fields, or the whole application data when the
/// node declares no mapping. Unmapped source fields are sent as null.
fn request_body(config: &ApiConfig, application_data: &Map<String, Value>) -> Value {
    if config.field_mapping.is_empty() {
        return Value::Object(application_data.clone());
    }
    let mut pairs: Vec<(&String, &String)> = config.field_mapping.iter().collect();
    pairs.sort();
    Value::Object(
        pairs
            .into_iter()
            .map(|(request_field, source)| {
                (
                    request_field.clone(),
                    application_data.get(source).cloned().unwrap_or(Value::Null),
                )
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MemoryStore, StubApiCaller, active_workflow, api_node, decision_node, end_node,
        income_scorecard, pending_application, score_node, start_node,
    };
    use creditflow_types::workflow::{FieldType, Outcome};

    fn engine(
        store: &MemoryStore,
        caller: StubApiCaller,
    ) -> ExecutionEngine<MemoryStore, MemoryStore, MemoryStore> {
        ExecutionEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(caller),
            EngineConfig::default(),
        )
    }

    async fn run(store: &MemoryStore, workflow: &Workflow, data: Value) -> (Uuid, ExecutionResult) {
        run_with(store, workflow, data, StubApiCaller::new()).await
    }

    async fn run_with(
        store: &MemoryStore,
        workflow: &Workflow,
        data: Value,
        caller: StubApiCaller,
    ) -> (Uuid, ExecutionResult) {
        store.insert_workflow(workflow);
        let app = pending_application(workflow, data);
        store.insert_application(&app);
        let result = engine(store, caller).execute(&app.id).await.unwrap();
        (app.id, result)
    }

    fn routing_workflow() -> Workflow {
        active_workflow(
            "Routing",
            vec![
                start_node("start", &[("debt_ratio", FieldType::Number, true)]),
                decision_node("dti"),
                end_node("A", Outcome::Approved),
                end_node("B", Outcome::Approved),
                end_node("C", Outcome::Rejected),
            ],
            vec![
                Edge::new("e0", "start", "dti"),
                Edge::new("e1", "dti", "A").with_condition("debt_ratio < 0.3"),
                Edge::new("e2", "dti", "B").with_condition("debt_ratio < 0.6"),
                Edge::new("e3", "dti", "C"),
            ],
        )
    }

    #[tokio::test]
    async fn test_linear_chain_logs_every_node_once() {
        let store = MemoryStore::new();
        let scorecard = income_scorecard();
        store.insert_scorecard(&scorecard);
        let workflow = active_workflow(
            "Linear",
            vec![
                start_node("start", &[]),
                score_node("score", scorecard.id),
                end_node("end", Outcome::Approved),
            ],
            vec![
                Edge::new("e1", "start", "score"),
                Edge::new("e2", "score", "end"),
            ],
        );

        let (id, result) = run(&store, &workflow, json!({ "income": 52000 })).await;
        assert_eq!(result.status, ApplicationStatus::Completed);

        let logs = store.logs(&id);
        assert_eq!(logs.len(), workflow.nodes.len());
        let visited: Vec<_> = logs.iter().map(|e| e.node_id.clone().unwrap()).collect();
        assert_eq!(visited, vec!["start", "score", "end"]);
        assert!(logs.iter().all(|e| e.status == LogStatus::Success));
        assert!(logs.iter().all(|e| e.action == "execute"));
        let sequences: Vec<u32> = logs.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_decision_routes_by_first_true_condition() {
        for (ratio, expected, status) in [
            (0.2, "A", ApplicationStatus::Completed),
            (0.45, "B", ApplicationStatus::Completed),
            (0.9, "C", ApplicationStatus::Rejected),
        ] {
            let store = MemoryStore::new();
            let (_, result) = run(&store, &routing_workflow(), json!({ "debt_ratio": ratio })).await;
            assert_eq!(result.result["end_node"], json!(expected), "debt_ratio={ratio}");
            assert_eq!(result.status, status);
        }
    }

    #[tokio::test]
    async fn test_decision_with_node_condition_and_handles() {
        let store = MemoryStore::new();
        let mut decision = decision_node("check");
        decision.kind = NodeKind::Decision(DecisionConfig {
            condition: Some("age >= 18".to_string()),
        });
        let workflow = active_workflow(
            "Handles",
            vec![
                start_node("start", &[]),
                decision,
                end_node("adult", Outcome::Approved),
                end_node("minor", Outcome::Rejected),
            ],
            vec![
                Edge::new("e0", "start", "check"),
                Edge::new("e1", "check", "adult").with_source_handle("true"),
                Edge::new("e2", "check", "minor").with_source_handle("false"),
            ],
        );

        let (_, result) = run(&store, &workflow, json!({ "age": 17 })).await;
        assert_eq!(result.result["end_node"], json!("minor"));
        assert_eq!(result.status, ApplicationStatus::Rejected);
    }

    #[tokio::test]
    async fn test_no_branch_matched_moves_to_error() {
        let store = MemoryStore::new();
        let workflow = active_workflow(
            "Strict",
            vec![
                start_node("start", &[]),
                decision_node("dti"),
                end_node("A", Outcome::Approved),
                end_node("B", Outcome::Rejected),
            ],
            vec![
                Edge::new("e0", "start", "dti"),
                Edge::new("e1", "dti", "A").with_condition("debt_ratio < 0.3"),
                Edge::new("e2", "dti", "B").with_condition("debt_ratio > 0.8"),
            ],
        );

        let (id, result) = run(&store, &workflow, json!({ "debt_ratio": 0.5 })).await;
        assert_eq!(result.status, ApplicationStatus::Error);
        assert_eq!(result.result["error"]["code"], json!("NO_BRANCH_MATCHED"));
        assert_eq!(result.result["error"]["node_id"], json!("dti"));

        let logs = store.logs(&id);
        // start, the failing decision visit, then the workflow-level entry
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[1].node_id.as_deref(), Some("dti"));
        assert_eq!(logs[1].status, LogStatus::Error);
        assert_eq!(logs[2].action, "workflow_execution");
        assert!(logs[2].node_id.is_none());

        let stored = store.application(&id).unwrap();
        assert_eq!(stored.status, ApplicationStatus::Error);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_condition_error_counts_as_false() {
        let store = MemoryStore::new();
        let workflow = active_workflow(
            "Broken condition",
            vec![
                start_node("start", &[]),
                decision_node("d"),
                end_node("A", Outcome::Approved),
                end_node("fallback", Outcome::Rejected),
            ],
            vec![
                Edge::new("e0", "start", "d"),
                Edge::new("e1", "d", "A").with_condition("income >"),
                Edge::new("e2", "d", "fallback"),
            ],
        );

        let (id, result) = run(&store, &workflow, json!({ "income": 1 })).await;
        assert_eq!(result.result["end_node"], json!("fallback"));

        let decision_log = &store.logs(&id)[1];
        let evaluation = &decision_log.output_data.as_ref().unwrap()["evaluations"][0];
        assert_eq!(evaluation["result"], json!(false));
        assert!(evaluation["error"].is_string());
    }

    #[tokio::test]
    async fn test_cycle_is_reported_and_halts() {
        let store = MemoryStore::new();
        let mut workflow = routing_workflow();
        // Back edge dti -> start, stored as an active snapshot.
        workflow.edges[1] = Edge::new("e1", "dti", "start").with_condition("debt_ratio < 0.3");
        store.insert_workflow(&workflow);
        let app = pending_application(&workflow, json!({ "debt_ratio": 0.1 }));
        store.insert_application(&app);

        let result = engine(&store, StubApiCaller::new())
            .execute(&app.id)
            .await
            .unwrap();
        assert_eq!(result.status, ApplicationStatus::Error);
        // Validation catches the cycle before any node runs.
        assert_eq!(result.result["error"]["code"], json!("INVALID_WORKFLOW"));
        let logs = store.logs(&app.id);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "workflow_execution");
    }

    #[tokio::test]
    async fn test_api_success_merges_into_results_not_application_data() {
        let store = MemoryStore::new();
        let caller = StubApiCaller::new().respond(
            "http://bureau/check",
            Ok(json!({ "hits": 0 })),
        );
        let workflow = active_workflow(
            "Bureau",
            vec![
                start_node("start", &[]),
                api_node("bureau", "http://bureau/check", FailurePolicy::Halt),
                decision_node("d"),
                end_node("ok", Outcome::Approved),
                end_node("no", Outcome::Rejected),
            ],
            vec![
                Edge::new("e0", "start", "bureau"),
                Edge::new("e1", "bureau", "d"),
                Edge::new("e2", "d", "ok").with_condition("results.bureau.hits == 0"),
                Edge::new("e3", "d", "no"),
            ],
        );

        let (id, result) = run_with(&store, &workflow, json!({ "name": "Ann" }), caller).await;
        assert_eq!(result.status, ApplicationStatus::Completed);
        assert_eq!(result.result["results"]["bureau"]["hits"], json!(0));

        let stored = store.application(&id).unwrap();
        assert!(!stored.application_data.contains_key("results"));
        assert!(!stored.application_data.contains_key("bureau"));
    }

    #[tokio::test]
    async fn test_api_failure_halt_moves_to_error() {
        let store = MemoryStore::new();
        let workflow = active_workflow(
            "Halting",
            vec![
                start_node("start", &[]),
                api_node("bureau", "http://down/", FailurePolicy::Halt),
                end_node("end", Outcome::Approved),
            ],
            vec![
                Edge::new("e0", "start", "bureau"),
                Edge::new("e1", "bureau", "end"),
            ],
        );

        let (id, result) = run(&store, &workflow, json!({})).await;
        assert_eq!(result.status, ApplicationStatus::Error);
        assert_eq!(result.result["error"]["code"], json!("API_CALL_FAILED"));

        let logs = store.logs(&id);
        assert_eq!(logs[1].node_id.as_deref(), Some("bureau"));
        assert_eq!(logs[1].status, LogStatus::Error);
        assert!(logs[1].error_message.as_ref().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_api_failure_continue_follows_default_edge() {
        let store = MemoryStore::new();
        let caller = StubApiCaller::new().respond(
            "http://flaky/",
            Err(ApiCallError::Status {
                status: 503,
                body: "busy".to_string(),
            }),
        );
        let workflow = active_workflow(
            "Lenient",
            vec![
                start_node("start", &[]),
                api_node("enrich", "http://flaky/", FailurePolicy::Continue),
                end_node("end", Outcome::Approved),
            ],
            vec![
                Edge::new("e0", "start", "enrich"),
                Edge::new("e1", "enrich", "end"),
            ],
        );

        let (id, result) = run_with(&store, &workflow, json!({}), caller).await;
        assert_eq!(result.status, ApplicationStatus::Completed);

        let logs = store.logs(&id);
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[1].status, LogStatus::Error);
        assert_eq!(logs[2].node_id.as_deref(), Some("end"));
        assert_eq!(result.result["warnings"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_api_timeout_is_a_failure() {
        let store = MemoryStore::new();
        let caller = StubApiCaller::new().hang("http://slow/");
        let mut node = api_node("slow", "http://slow/", FailurePolicy::Halt);
        if let NodeKind::Api(config) = &mut node.kind {
            config.timeout_secs = Some(0);
        }
        let workflow = active_workflow(
            "Slow",
            vec![start_node("start", &[]), node, end_node("end", Outcome::Approved)],
            vec![Edge::new("e0", "start", "slow"), Edge::new("e1", "slow", "end")],
        );

        let (_, result) = run_with(&store, &workflow, json!({}), caller).await;
        assert_eq!(result.status, ApplicationStatus::Error);
        assert!(
            result.result["error"]["message"]
                .as_str()
                .unwrap()
                .contains("timed out")
        );
    }

    #[tokio::test]
    async fn test_api_request_uses_field_mapping() {
        let store = MemoryStore::new();
        let caller = Arc::new(StubApiCaller::new().respond("http://x/", Ok(json!({}))));
        let mut node = api_node("call", "http://x/", FailurePolicy::Halt);
        if let NodeKind::Api(config) = &mut node.kind {
            config
                .field_mapping
                .insert("applicant".to_string(), "name".to_string());
        }
        let workflow = active_workflow(
            "Mapped",
            vec![start_node("start", &[]), node, end_node("end", Outcome::Approved)],
            vec![Edge::new("e0", "start", "call"), Edge::new("e1", "call", "end")],
        );
        store.insert_workflow(&workflow);
        let app = pending_application(&workflow, json!({ "name": "Ann", "ssn": "secret" }));
        store.insert_application(&app);

        let engine = ExecutionEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            caller.clone(),
            EngineConfig::default(),
        );
        engine.execute(&app.id).await.unwrap();

        let calls = caller.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body, json!({ "applicant": "Ann" }));
        assert_eq!(calls[0].method, "POST");
    }

    #[tokio::test]
    async fn test_score_node_attaches_score_and_routes_on_it() {
        let store = MemoryStore::new();
        let scorecard = income_scorecard();
        store.insert_scorecard(&scorecard);
        let workflow = active_workflow(
            "Scored",
            vec![
                start_node("start", &[]),
                score_node("score", scorecard.id),
                decision_node("cut"),
                end_node("approve", Outcome::Approved),
                end_node("decline", Outcome::Rejected),
            ],
            vec![
                Edge::new("e0", "start", "score"),
                Edge::new("e1", "score", "cut"),
                Edge::new("e2", "cut", "approve").with_condition("score >= 500"),
                Edge::new("e3", "cut", "decline"),
            ],
        );

        let (id, high) = run(&store, &workflow, json!({ "income": 52000 })).await;
        let score = high.score.unwrap();
        assert!(score > 487.0);
        assert_eq!(store.application(&id).unwrap().score, Some(score));
        assert_eq!(high.result["scoring"]["total_score"], json!(score));

        let (_, low) = run(&store, &workflow, json!({ "income": 10000 })).await;
        assert!(low.score.unwrap() < score);
    }

    #[tokio::test]
    async fn test_missing_scorecard_is_node_failure() {
        let store = MemoryStore::new();
        let workflow = active_workflow(
            "Orphan",
            vec![
                start_node("start", &[]),
                score_node("score", Uuid::now_v7()),
                end_node("end", Outcome::Approved),
            ],
            vec![Edge::new("e0", "start", "score"), Edge::new("e1", "score", "end")],
        );

        let (_, result) = run(&store, &workflow, json!({})).await;
        assert_eq!(result.status, ApplicationStatus::Error);
        assert_eq!(result.result["error"]["code"], json!("SCORECARD_NOT_FOUND"));
        assert_eq!(result.result["error"]["node_id"], json!("score"));
    }

    #[tokio::test]
    async fn test_missing_input_degrades_to_warning() {
        let store = MemoryStore::new();
        let scorecard = income_scorecard();
        store.insert_scorecard(&scorecard);
        let workflow = active_workflow(
            "Sparse",
            vec![
                start_node("start", &[]),
                score_node("score", scorecard.id),
                end_node("end", Outcome::Approved),
            ],
            vec![Edge::new("e0", "start", "score"), Edge::new("e1", "score", "end")],
        );

        let (_, result) = run(&store, &workflow, json!({})).await;
        assert_eq!(result.status, ApplicationStatus::Completed);
        let offset = result.result["scoring"]["offset"].as_f64().unwrap();
        assert_eq!(result.score, Some(offset));
        assert!(!result.result["warnings"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_executing_twice_is_rejected() {
        let store = MemoryStore::new();
        let workflow = routing_workflow();
        let (id, _) = run(&store, &workflow, json!({ "debt_ratio": 0.1 })).await;

        let err = engine(&store, StubApiCaller::new())
            .execute(&id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::AlreadyTerminal {
                status: ApplicationStatus::Completed
            }
        ));
        // no extra log entries from the rejected attempt
        assert_eq!(store.logs(&id).len(), 3);
    }

    #[tokio::test]
    async fn test_failed_result_write_leaves_application_in_error() {
        let store = MemoryStore::new();
        let workflow = routing_workflow();
        store.insert_workflow(&workflow);
        let app = pending_application(&workflow, json!({ "debt_ratio": 0.1 }));
        store.insert_application(&app);
        store.fail_next("finish_application", 1);

        let err = engine(&store, StubApiCaller::new())
            .execute(&app.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Repository(RepositoryError::Query(_))));
        assert_eq!(store.application(&app.id).unwrap().status, ApplicationStatus::Error);

        let err = engine(&store, StubApiCaller::new())
            .execute(&app.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::AlreadyTerminal {
                status: ApplicationStatus::Error
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_application() {
        let store = MemoryStore::new();
        let err = engine(&store, StubApiCaller::new())
            .execute(&Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ApplicationNotFound(_)));
    }

    #[tokio::test]
    async fn test_end_node_output_fields() {
        let store = MemoryStore::new();
        let mut end = end_node("end", Outcome::Approved);
        if let NodeKind::End(config) = &mut end.kind {
            config.output_fields.push(creditflow_types::workflow::OutputField {
                name: "applicant".to_string(),
                field_type: FieldType::String,
                description: String::new(),
            });
        }
        let workflow = active_workflow(
            "Outputs",
            vec![start_node("start", &[]), end],
            vec![Edge::new("e0", "start", "end")],
        );

        let (_, result) = run(&store, &workflow, json!({ "applicant": "Ann" })).await;
        assert_eq!(result.result["outputs"]["applicant"], json!("Ann"));
        assert_eq!(result.result["outcome"], json!("approved"));
    }

    #[tokio::test]
    async fn test_tags_are_merged_into_result() {
        let store = MemoryStore::new();
        let workflow = routing_workflow();
        store.insert_workflow(&workflow);
        let app = pending_application(&workflow, json!({ "debt_ratio": 0.1 }));
        store.insert_application(&app);

        let mut tags = Map::new();
        tags.insert("deployment_id".to_string(), json!("d-1"));
        let result = engine(&store, StubApiCaller::new())
            .execute_tagged(&app.id, tags)
            .await
            .unwrap();
        assert_eq!(result.result["deployment_id"], json!("d-1"));
        let stored = store.application(&app.id).unwrap();
        assert_eq!(stored.result.unwrap()["deployment_id"], json!("d-1"));
    }
}
