//! The fixed catalogue of backend operations the assistant may call.
//!
//! Each [`Operation`] knows its HTTP binding and parameter list. The
//! [`ToolRegistry`] turns a model-proposed [`ToolCall`] into a validated
//! [`RemoteRequest`], rejecting bad arguments before anything is dispatched.

use std::collections::HashSet;

use chrono::NaiveDate;
use pilot_core::{ParamKind, ParamSpec, PilotError, Result, ToolCall, ToolDefinition};
use serde_json::{Map, Value, json};
use tracing::warn;

/// Argument names that carry identity. The model never supplies these.
pub const IDENTITY_KEYS: [&str; 5] = ["jwt_token", "credential", "user_id", "subject_id", "token"];

pub const PROJECT_STATUSES: [&str; 3] = ["ACTIVE", "ARCHIVED", "COMPLETED"];
pub const TASK_STATUSES: [&str; 4] = ["TODO", "IN_PROGRESS", "DONE", "BLOCKED"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateProject,
    GetAllProjectsWithTasks,
    GetDashboardProjects,
    GetSingleProjectWithTasks,
    UpdateProject,
    DeleteProject,
    CreateTask,
    GetAllTasks,
    GetSingleTask,
    UpdateTask,
    DeleteTask,
    UpdateTaskStatus,
    UpdateTaskTags,
    RemoveTaskTags,
    UpdateTaskSchedule,
}

/// Where a validated argument ends up in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    /// Substituted for `{name}` in the path template.
    Path,
    /// JSON body field with the given key.
    Body(&'static str),
}

#[derive(Debug, Clone)]
struct Binding {
    name: &'static str,
    kind: ParamKind,
    required: bool,
    location: Location,
    default: Option<&'static str>,
    description: &'static str,
}

impl Binding {
    fn spec(&self) -> ParamSpec {
        ParamSpec {
            name: self.name.to_string(),
            kind: self.kind.clone(),
            required: self.required,
            description: self.description.to_string(),
        }
    }
}

// ── Parameter helpers ──────────────────────────────────────────

fn id_param(name: &'static str, description: &'static str, location: Location) -> Binding {
    Binding {
        name,
        kind: ParamKind::Integer {
            min: Some(1),
            max: None,
        },
        required: location == Location::Path,
        location,
        default: None,
        description,
    }
}

fn string_param(name: &'static str, key: &'static str, required: bool, description: &'static str) -> Binding {
    Binding {
        name,
        kind: ParamKind::String,
        required,
        location: Location::Body(key),
        default: None,
        description,
    }
}

fn enum_param(
    name: &'static str,
    key: &'static str,
    values: &[&str],
    required: bool,
    default: Option<&'static str>,
    description: &'static str,
) -> Binding {
    Binding {
        name,
        kind: ParamKind::Enum {
            values: values.iter().map(|v| v.to_string()).collect(),
        },
        required,
        location: Location::Body(key),
        default,
        description,
    }
}

fn priority_param() -> Binding {
    Binding {
        name: "priority",
        kind: ParamKind::Integer {
            min: Some(1),
            max: Some(5),
        },
        required: false,
        location: Location::Body("priority"),
        default: None,
        description: "우선순위 (1이 가장 높고 5가 가장 낮음)",
    }
}

fn due_date_param() -> Binding {
    Binding {
        name: "due_date",
        kind: ParamKind::Date,
        required: false,
        location: Location::Body("dueDate"),
        default: None,
        description: "마감일 (YYYY-MM-DD)",
    }
}

fn tags_param(required: bool) -> Binding {
    Binding {
        name: "tags",
        kind: ParamKind::StringList,
        required,
        location: Location::Body("tags"),
        default: None,
        description: "태그 목록",
    }
}

/// The full set of task fields shared by create_task and update_task.
fn task_fields(creating: bool) -> Vec<Binding> {
    vec![
        string_param("title", "title", creating, "태스크 제목"),
        string_param("description", "description", false, "태스크 설명"),
        tags_param(false),
        priority_param(),
        due_date_param(),
        Binding {
            name: "estimated_time_hours",
            kind: ParamKind::Number,
            required: false,
            location: Location::Body("estimatedTimeHours"),
            default: None,
            description: "예상 소요 시간 (시간 단위)",
        },
        enum_param(
            "status",
            "status",
            &TASK_STATUSES,
            false,
            creating.then_some("TODO"),
            "태스크 상태",
        ),
        id_param("project_id", "태스크가 속할 프로젝트 ID", Location::Body("projectId")),
    ]
}

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::CreateProject,
        Operation::GetAllProjectsWithTasks,
        Operation::GetDashboardProjects,
        Operation::GetSingleProjectWithTasks,
        Operation::UpdateProject,
        Operation::DeleteProject,
        Operation::CreateTask,
        Operation::GetAllTasks,
        Operation::GetSingleTask,
        Operation::UpdateTask,
        Operation::DeleteTask,
        Operation::UpdateTaskStatus,
        Operation::UpdateTaskTags,
        Operation::RemoveTaskTags,
        Operation::UpdateTaskSchedule,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateProject => "create_project",
            Operation::GetAllProjectsWithTasks => "get_all_projects_with_tasks",
            Operation::GetDashboardProjects => "get_dashboard_projects",
            Operation::GetSingleProjectWithTasks => "get_single_project_with_tasks",
            Operation::UpdateProject => "update_project",
            Operation::DeleteProject => "delete_project",
            Operation::CreateTask => "create_task",
            Operation::GetAllTasks => "get_all_tasks",
            Operation::GetSingleTask => "get_single_task",
            Operation::UpdateTask => "update_task",
            Operation::DeleteTask => "delete_task",
            Operation::UpdateTaskStatus => "update_task_status",
            Operation::UpdateTaskTags => "update_task_tags",
            Operation::RemoveTaskTags => "remove_task_tags",
            Operation::UpdateTaskSchedule => "update_task_schedule",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Operation::GetAllProjectsWithTasks
            | Operation::GetDashboardProjects
            | Operation::GetSingleProjectWithTasks
            | Operation::GetAllTasks
            | Operation::GetSingleTask => HttpMethod::Get,
            Operation::CreateProject | Operation::CreateTask => HttpMethod::Post,
            Operation::UpdateProject | Operation::UpdateTask => HttpMethod::Put,
            Operation::UpdateTaskStatus
            | Operation::UpdateTaskTags
            | Operation::UpdateTaskSchedule => HttpMethod::Patch,
            Operation::DeleteProject | Operation::DeleteTask | Operation::RemoveTaskTags => {
                HttpMethod::Delete
            }
        }
    }

    /// Path relative to the backend prefix, with `{param}` placeholders.
    pub fn path_template(&self) -> &'static str {
        match self {
            Operation::CreateProject => "/projects/new",
            Operation::GetAllProjectsWithTasks => "/projects/mypage",
            Operation::GetDashboardProjects => "/projects/dashboard",
            Operation::GetSingleProjectWithTasks
            | Operation::UpdateProject
            | Operation::DeleteProject => "/projects/{project_id}",
            Operation::CreateTask => "/tasks/new",
            Operation::GetAllTasks => "/tasks/all",
            Operation::GetSingleTask | Operation::UpdateTask | Operation::DeleteTask => {
                "/tasks/{task_id}"
            }
            Operation::UpdateTaskStatus => "/tasks/{task_id}/status",
            Operation::UpdateTaskTags | Operation::RemoveTaskTags => "/tasks/{task_id}/tags",
            Operation::UpdateTaskSchedule => "/tasks/{task_id}/schedule",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Operation::CreateProject => "새 프로젝트를 생성합니다. 프로젝트 이름은 필수입니다.",
            Operation::GetAllProjectsWithTasks => "사용자의 모든 프로젝트와 각 프로젝트의 태스크를 조회합니다.",
            Operation::GetDashboardProjects => "진행 중인 프로젝트와 태스크를 대시보드용으로 조회합니다.",
            Operation::GetSingleProjectWithTasks => "프로젝트 하나와 그 태스크를 조회합니다.",
            Operation::UpdateProject => "프로젝트 정보를 수정합니다. 바꿀 필드만 전달하세요.",
            Operation::DeleteProject => "프로젝트와 그에 속한 모든 태스크를 삭제합니다.",
            Operation::CreateTask => "새 태스크를 생성합니다. 제목은 필수입니다.",
            Operation::GetAllTasks => "사용자의 모든 태스크를 조회합니다.",
            Operation::GetSingleTask => "태스크 하나를 조회합니다.",
            Operation::UpdateTask => "태스크 정보를 수정합니다. 바꿀 필드만 전달하세요.",
            Operation::DeleteTask => "태스크를 삭제합니다.",
            Operation::UpdateTaskStatus => "태스크의 상태를 변경합니다.",
            Operation::UpdateTaskTags => "태스크의 태그를 주어진 목록으로 교체합니다.",
            Operation::RemoveTaskTags => "태스크의 모든 태그를 제거합니다.",
            Operation::UpdateTaskSchedule => "태스크의 마감일 또는 우선순위를 변경합니다.",
        }
    }

    /// Partial updates must carry at least one body field.
    fn requires_any_field(&self) -> bool {
        matches!(
            self,
            Operation::UpdateProject | Operation::UpdateTask | Operation::UpdateTaskSchedule
        )
    }

    fn bindings(&self) -> Vec<Binding> {
        let project_path = || id_param("project_id", "프로젝트 ID", Location::Path);
        let task_path = || id_param("task_id", "태스크 ID", Location::Path);
        match self {
            Operation::CreateProject => vec![
                string_param("project_name", "projectName", true, "프로젝트 이름"),
                string_param("project_description", "projectDescription", false, "프로젝트 설명"),
                enum_param(
                    "project_status",
                    "projectStatus",
                    &PROJECT_STATUSES,
                    false,
                    Some("ACTIVE"),
                    "프로젝트 상태",
                ),
            ],
            Operation::GetAllProjectsWithTasks
            | Operation::GetDashboardProjects
            | Operation::GetAllTasks => vec![],
            Operation::GetSingleProjectWithTasks | Operation::DeleteProject => {
                vec![project_path()]
            }
            Operation::UpdateProject => vec![
                project_path(),
                string_param("project_name", "projectName", false, "새 프로젝트 이름"),
                string_param("project_description", "projectDescription", false, "새 프로젝트 설명"),
                enum_param(
                    "project_status",
                    "projectStatus",
                    &PROJECT_STATUSES,
                    false,
                    None,
                    "새 프로젝트 상태",
                ),
            ],
            Operation::CreateTask => task_fields(true),
            Operation::GetSingleTask | Operation::DeleteTask | Operation::RemoveTaskTags => {
                vec![task_path()]
            }
            Operation::UpdateTask => {
                let mut params = vec![task_path()];
                params.extend(task_fields(false));
                params
            }
            Operation::UpdateTaskStatus => vec![
                task_path(),
                enum_param("status", "status", &TASK_STATUSES, true, None, "새 태스크 상태"),
            ],
            Operation::UpdateTaskTags => vec![task_path(), tags_param(true)],
            Operation::UpdateTaskSchedule => vec![task_path(), due_date_param(), priority_param()],
        }
    }
}

/// A fully validated call, ready for the remote client.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub operation: Operation,
    pub method: HttpMethod,
    /// Path with placeholders filled in, relative to the backend prefix.
    pub path: String,
    pub body: Option<Value>,
}

struct Entry {
    operation: Operation,
    definition: ToolDefinition,
    bindings: Vec<Binding>,
}

/// Process-wide tool catalogue, immutable after construction.
pub struct ToolRegistry {
    entries: Vec<Entry>,
}

impl ToolRegistry {
    /// Build the catalogue of every backend operation.
    ///
    /// Fails if two operations share a name or a name does not resolve back
    /// to its operation.
    pub fn builtin() -> Result<Self> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(Operation::ALL.len());

        for operation in Operation::ALL {
            let name = operation.name();
            if !seen.insert(name) {
                return Err(PilotError::Config(format!("duplicate tool name '{name}'")));
            }
            if Operation::from_name(name) != Some(operation) {
                return Err(PilotError::Config(format!("tool '{name}' does not resolve")));
            }
            let bindings = operation.bindings();
            for b in bindings.iter().filter(|b| b.location == Location::Path) {
                if !operation.path_template().contains(&format!("{{{}}}", b.name)) {
                    return Err(PilotError::Config(format!(
                        "tool '{name}' binds '{}' to a path without that placeholder",
                        b.name
                    )));
                }
            }
            let definition = ToolDefinition {
                name: name.to_string(),
                description: operation.description().to_string(),
                parameters: bindings.iter().map(Binding::spec).collect(),
            };
            entries.push(Entry {
                operation,
                definition,
                bindings,
            });
        }

        Ok(Self { entries })
    }

    /// Tool schemas advertised to the reasoning step.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(|e| e.definition.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.entry(name).map(|e| &e.definition)
    }

    pub fn resolve(&self, name: &str) -> Option<Operation> {
        self.entry(name).map(|e| e.operation)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.definition.name == name)
    }

    /// Validate a proposed call and build the request it maps to.
    pub fn prepare(&self, call: &ToolCall) -> Result<RemoteRequest> {
        let entry = self
            .entry(&call.tool_name)
            .ok_or_else(|| PilotError::ToolNotFound(call.tool_name.clone()))?;
        let operation = entry.operation;
        let invalid = |reason: String| PilotError::InvalidArguments {
            tool: call.tool_name.clone(),
            reason,
        };

        let empty = Map::new();
        let args = match &call.arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            Value::String(raw) => {
                return Err(invalid(format!("arguments are not valid JSON: {raw}")));
            }
            other => return Err(invalid(format!("arguments must be an object, got {other}"))),
        };

        for key in args.keys() {
            if IDENTITY_KEYS.contains(&key.as_str()) {
                warn!(tool = %call.tool_name, key = %key, "ignoring identity argument supplied by the model");
                continue;
            }
            if !entry.bindings.iter().any(|b| b.name == key) {
                return Err(invalid(format!("unknown argument '{key}'")));
            }
        }

        let mut path = operation.path_template().to_string();
        let mut body = Map::new();

        for binding in &entry.bindings {
            let supplied = match args.get(binding.name) {
                None | Some(Value::Null) => None,
                Some(v) => Some(coerce(binding, v).map_err(&invalid)?),
            };
            let Some(value) = supplied.or_else(|| binding.default.map(|d| json!(d))) else {
                if binding.required {
                    return Err(invalid(format!("missing required argument '{}'", binding.name)));
                }
                continue;
            };
            match binding.location {
                Location::Path => {
                    let rendered = match &value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    path = path.replace(&format!("{{{}}}", binding.name), &rendered);
                }
                Location::Body(key) => {
                    body.insert(key.to_string(), value);
                }
            }
        }

        if operation.requires_any_field() && body.is_empty() {
            return Err(invalid("at least one field to change is required".into()));
        }

        let method = operation.method();
        let body = match method {
            HttpMethod::Get | HttpMethod::Delete if body.is_empty() => None,
            _ => Some(Value::Object(body)),
        };

        Ok(RemoteRequest {
            operation,
            method,
            path,
            body,
        })
    }
}

/// A float with no fractional part that fits in an `i64`.
fn whole_i64(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(&f)).then_some(f as i64)
}

/// Check a supplied value against the parameter kind, normalising where a
/// lenient form is accepted.
fn coerce(binding: &Binding, value: &Value) -> std::result::Result<Value, String> {
    let name = binding.name;
    match &binding.kind {
        ParamKind::String => match value {
            Value::String(s) if binding.required && s.trim().is_empty() => {
                Err(format!("'{name}' must not be empty"))
            }
            Value::String(s) => Ok(json!(s)),
            other => Err(format!("'{name}' must be a string, got {other}")),
        },
        ParamKind::Integer { min, max } => {
            let n = match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().and_then(whole_i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| format!("'{name}' must be an integer, got {value}"))?;
            if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                return Err(match (min, max) {
                    (Some(lo), Some(hi)) => format!("'{name}' must be between {lo} and {hi}, got {n}"),
                    (Some(lo), None) => format!("'{name}' must be at least {lo}, got {n}"),
                    _ => format!("'{name}' is out of range: {n}"),
                });
            }
            Ok(json!(n))
        }
        ParamKind::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| json!(f))
                .ok_or_else(|| format!("'{name}' must be a finite number, got {value}")),
            other => Err(format!("'{name}' must be a number, got {other}")),
        },
        ParamKind::Date => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("'{name}' must be a YYYY-MM-DD string, got {value}"))?;
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(|d| json!(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| format!("'{name}' must be a date in YYYY-MM-DD form, got '{s}'"))
        }
        ParamKind::StringList => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(|s| json!(s))
                        .ok_or_else(|| format!("'{name}' must contain only strings, got {item}"))
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Array),
            // Comma-separated text is accepted as a list.
            Value::String(s) => Ok(Value::Array(
                s.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| json!(t))
                    .collect(),
            )),
            other => Err(format!("'{name}' must be a list of strings, got {other}")),
        },
        ParamKind::Enum { values } => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("'{name}' must be a string, got {value}"))?;
            let normalised = s.trim().to_uppercase();
            if values.iter().any(|v| *v == normalised) {
                Ok(json!(normalised))
            } else {
                Err(format!("'{name}' must be one of {}, got '{s}'", values.join(", ")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_operation_round_trips_by_name() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("drop_database"), None);
    }

    #[test]
    fn test_builtin_catalogue() {
        let registry = ToolRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 15);
        for def in registry.definitions() {
            for key in IDENTITY_KEYS {
                assert!(def.param(key).is_none(), "{} exposes {key}", def.name);
            }
        }
    }

    #[test]
    fn test_path_params_are_required() {
        for op in Operation::ALL {
            for b in op.bindings() {
                if b.location == Location::Path {
                    assert!(b.required, "{} {}", op.name(), b.name);
                }
            }
        }
    }

    #[test]
    fn test_coerce_integer_forms() {
        let b = priority_param();
        assert_eq!(coerce(&b, &json!(3)).unwrap(), json!(3));
        assert_eq!(coerce(&b, &json!("2")).unwrap(), json!(2));
        assert_eq!(coerce(&b, &json!(4.0)).unwrap(), json!(4));
        assert!(coerce(&b, &json!(0)).is_err());
        assert!(coerce(&b, &json!(6)).is_err());
        assert!(coerce(&b, &json!(2.5)).is_err());
    }

    #[test]
    fn test_coerce_tags_from_text() {
        let b = tags_param(true);
        assert_eq!(coerce(&b, &json!("긴급, 회의,")).unwrap(), json!(["긴급", "회의"]));
        assert_eq!(coerce(&b, &json!([])).unwrap(), json!([]));
        assert!(coerce(&b, &json!([1, 2])).is_err());
    }

    #[test]
    fn test_coerce_enum_normalises_case() {
        let b = enum_param("status", "status", &TASK_STATUSES, true, None, "");
        assert_eq!(coerce(&b, &json!("in_progress")).unwrap(), json!("IN_PROGRESS"));
        assert!(coerce(&b, &json!("FINISHED")).is_err());
    }

    #[test]
    fn test_coerce_date() {
        let b = due_date_param();
        assert_eq!(coerce(&b, &json!("2025-03-01")).unwrap(), json!("2025-03-01"));
        assert!(coerce(&b, &json!("2025-02-30")).is_err());
        assert!(coerce(&b, &json!("03/01/2025")).is_err());
    }
}
