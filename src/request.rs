//! Request descriptors handed to a [`Transport`](crate::transport::Transport),
//! the condition/update encodings they carry, and the typed results decoded
//! from responses.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::command::{ExpressionNode, UpdateCommand};
use crate::errors::CloudError;
use crate::utils::json::bson_to_json;
use crate::utils::wire::wire_enum;

pub(crate) const MAX_LIMIT: u64 = 1000;
pub(crate) const MAX_FILE_LIST: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentId::Number(n) => write!(f, "{n}"),
            DocumentId::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId::String(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        DocumentId::String(s)
    }
}

impl From<i64> for DocumentId {
    fn from(n: i64) -> Self {
        DocumentId::Number(n)
    }
}

impl From<i32> for DocumentId {
    fn from(n: i32) -> Self {
        DocumentId::Number(i64::from(n))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(CloudError::invalid(format!(
                "order direction must be asc or desc, got `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub field: String,
    pub direction: Direction,
}

wire_enum! {
    /// Remote action names as they appear in the envelope `action` field.
    pub enum Action {
        QueryDocument => "database.queryDocument",
        CountDocument => "database.countDocument",
        AddDocument => "database.addDocument",
        GetDocument => "database.getDocument",
        SetDocument => "database.setDocument",
        UpdateDocument => "database.updateDocument",
        RemoveDocument => "database.removeDocument",
        CallFunction => "functions.invokeFunction",
        UploadFile => "storage.uploadFile",
        DownloadFile => "storage.downloadFile",
        GetTempFileUrl => "storage.getTempFileURL",
        DeleteFile => "storage.batchDeleteFile",
    }
}

/// One remote operation. The action name travels on the [`Envelope`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum Request {
    QueryDocument {
        collection: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        condition: Option<Value>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        order: Vec<OrderSpec>,
        #[serde(skip_serializing_if = "Option::is_none")]
        offset: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        limit: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        projection: Option<Map<String, Value>>,
    },
    CountDocument {
        collection: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        condition: Option<Value>,
    },
    AddDocument { collection: String, data: Value },
    GetDocument {
        collection: String,
        doc_id: DocumentId,
        #[serde(skip_serializing_if = "Option::is_none")]
        projection: Option<Map<String, Value>>,
    },
    SetDocument { collection: String, doc_id: DocumentId, data: Value },
    UpdateDocument { collection: String, doc_id: DocumentId, data: Value },
    RemoveDocument { collection: String, doc_id: DocumentId },
    CallFunction {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        slow: bool,
    },
    UploadFile {
        cloud_path: String,
        file_path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        header: Option<Map<String, Value>>,
    },
    DownloadFile {
        #[serde(rename = "fileID")]
        file_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cloud_path: Option<String>,
    },
    GetTempFileUrl { file_list: Vec<String> },
    DeleteFile { file_list: Vec<String> },
}

impl Request {
    pub fn kind(&self) -> Action {
        match self {
            Request::QueryDocument { .. } => Action::QueryDocument,
            Request::CountDocument { .. } => Action::CountDocument,
            Request::AddDocument { .. } => Action::AddDocument,
            Request::GetDocument { .. } => Action::GetDocument,
            Request::SetDocument { .. } => Action::SetDocument,
            Request::UpdateDocument { .. } => Action::UpdateDocument,
            Request::RemoveDocument { .. } => Action::RemoveDocument,
            Request::CallFunction { .. } => Action::CallFunction,
            Request::UploadFile { .. } => Action::UploadFile,
            Request::DownloadFile { .. } => Action::DownloadFile,
            Request::GetTempFileUrl { .. } => Action::GetTempFileUrl,
            Request::DeleteFile { .. } => Action::DeleteFile,
        }
    }

    pub fn action(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// A request plus the routing data every call carries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub action: Action,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    pub trace_user: bool,
    #[serde(flatten)]
    pub request: Request,
}

impl Envelope {
    pub fn new(request: Request, env: Option<String>, trace_user: bool) -> Self {
        Self {
            action: request.kind(),
            request_id: uuid::Uuid::new_v4().to_string(),
            env,
            trace_user,
            request,
        }
    }
}

/// Encode a filter tree for the request `condition` field.
///
/// Comparisons become `{field: {"operator", "operands"}}`; logic nodes become
/// `{"$and": [...]}` and friends, children in order.
pub fn encode_condition(node: &ExpressionNode) -> Result<Value, CloudError> {
    let mut out = Map::new();
    match node {
        ExpressionNode::Comparison(q) => {
            let object = operator_object(q.operator().as_str(), q.operands())?;
            out.insert(q.field_name().to_string(), object);
        }
        ExpressionNode::Logic(l) => {
            let children =
                l.operands().iter().map(encode_condition).collect::<Result<Vec<_>, _>>()?;
            let value = if l.operator() == crate::command::LogicOp::Not {
                children.into_iter().next().unwrap_or(Value::Null)
            } else {
                Value::Array(children)
            };
            out.insert(l.operator().wire_key().to_string(), value);
        }
    }
    Ok(Value::Object(out))
}

/// Encode bound update commands as `{field: {"operator", "operands"}}`.
pub fn encode_update(commands: &[UpdateCommand]) -> Result<Value, CloudError> {
    let mut out = Map::new();
    for c in commands {
        let field = c.field_name().ok_or_else(|| {
            CloudError::invalid(format!("`{}` command has no field name", c.operator()))
        })?;
        if out.contains_key(field) {
            return Err(CloudError::invalid(format!("field `{field}` updated twice")));
        }
        out.insert(field.to_string(), operator_object(c.operator().as_str(), c.operands())?);
    }
    Ok(Value::Object(out))
}

fn operator_object(operator: &str, operands: &[bson::Bson]) -> Result<Value, CloudError> {
    let operands = operands.iter().map(bson_to_json).collect::<Result<Vec<_>, _>>()?;
    let mut obj = Map::new();
    obj.insert("operator".into(), Value::String(operator.to_string()));
    obj.insert("operands".into(), Value::Array(operands));
    Ok(Value::Object(obj))
}

// Results

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub err_msg: String,
    pub data: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySingleResult {
    #[serde(default)]
    pub err_msg: String,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResult {
    #[serde(default)]
    pub err_msg: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddResult {
    #[serde(default)]
    pub err_msg: String,
    #[serde(rename = "_id")]
    pub id: DocumentId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct UpdateStats {
    #[serde(default)]
    pub updated: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    #[serde(default)]
    pub err_msg: String,
    pub stats: UpdateStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct SetStats {
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub created: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetResult {
    #[serde(default)]
    pub err_msg: String,
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub stats: SetStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct RemoveStats {
    #[serde(default)]
    pub removed: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResult {
    #[serde(default)]
    pub err_msg: String,
    pub stats: RemoveStats,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionResult {
    #[serde(default)]
    pub err_msg: String,
    #[serde(default)]
    pub result: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileResult {
    #[serde(default)]
    pub err_msg: String,
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub status_code: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadFileResult {
    #[serde(default)]
    pub err_msg: String,
    pub temp_file_path: String,
    pub status_code: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempFileUrlItem {
    #[serde(rename = "fileID")]
    pub file_id: String,
    #[serde(rename = "tempFileURL")]
    pub temp_file_url: String,
    pub max_age: u64,
    pub status: i32,
    #[serde(default)]
    pub err_msg: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTempFileUrlResult {
    #[serde(default)]
    pub err_msg: String,
    pub file_list: Vec<TempFileUrlItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileItem {
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub status: i32,
    #[serde(default)]
    pub err_msg: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileResult {
    #[serde(default)]
    pub err_msg: String,
    pub file_list: Vec<DeleteFileItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use serde_json::json;

    #[test]
    fn logic_encodes_with_dollar_keys() {
        let cmd = Command;
        let node = crate::command::to_expression(bson::doc! {"x": 1, "y": 2}.into()).unwrap();
        assert_eq!(
            encode_condition(&node).unwrap(),
            json!({"$and": [
                {"x": {"operator": "eq", "operands": [1]}},
                {"y": {"operator": "eq", "operands": [2]}}
            ]})
        );
        let leaf = crate::command::ExpressionNode::Comparison(cmd.lt(3).bind("z").unwrap());
        assert_eq!(
            encode_condition(&leaf).unwrap(),
            json!({"z": {"operator": "lt", "operands": [3]}})
        );
    }

    #[test]
    fn encode_update_requires_bound_commands() {
        let cmd = Command;
        assert!(encode_update(&[cmd.inc(1)]).is_err());
        let bound = cmd.inc(1).set_field_name("n").unwrap();
        assert_eq!(
            encode_update(&[bound]).unwrap(),
            json!({"n": {"operator": "inc", "operands": [1]}})
        );
    }

    #[test]
    fn envelope_flattens_request() {
        let request =
            Request::RemoveDocument { collection: "todos".into(), doc_id: DocumentId::Number(7) };
        let env = Envelope::new(request, Some("prod".into()), false);
        assert_eq!(env.action, Action::RemoveDocument);
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["action"], "database.removeDocument");
        assert_eq!(v["collection"], "todos");
        assert_eq!(v["docId"], 7);
        assert_eq!(v["env"], "prod");
        assert_eq!(v["traceUser"], false);
        assert!(uuid::Uuid::parse_str(v["requestId"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn action_names_serialize_from_one_table() {
        for &action in Action::ALL {
            assert_eq!(serde_json::to_value(action).unwrap(), json!(action.as_str()));
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        let request = Request::GetTempFileUrl { file_list: vec!["cloud://a".into()] };
        assert_eq!(request.action(), "storage.getTempFileURL");
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("DESC".parse::<Direction>().unwrap(), Direction::Desc);
        assert!("up".parse::<Direction>().is_err());
    }

    #[test]
    fn results_decode_from_wire() {
        let r: AddResult =
            serde_json::from_value(json!({"errMsg": "collection.add:ok", "_id": "abc"})).unwrap();
        assert_eq!(r.id, DocumentId::String("abc".into()));
        let stats = json!({"_id": 3, "stats": {"updated": 0, "created": 1}});
        let r: SetResult = serde_json::from_value(stats).unwrap();
        assert_eq!(r.stats.created, 1);
    }
}
