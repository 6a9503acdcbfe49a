//! Client facade over the expression builder: collections, queries and
//! document references. Every builder call returns a new value; remote calls
//! return an [`ApiCall`].

use std::sync::Arc;

use bson::{Bson, Document};
use serde_json::{Map, Value};

use crate::command::{Command, Condition, UpdateData, to_expression, validate_field_name};
use crate::config::CloudConfig;
use crate::errors::CloudError;
use crate::request::{
    Action, AddResult, CountResult, Direction, DocumentId, Envelope, MAX_LIMIT, OrderSpec,
    QueryResult, QuerySingleResult, RemoveResult, Request, SetResult, UpdateResult,
    encode_condition, encode_update,
};
use crate::transport::{ApiCall, Transport};
use crate::utils::json::bson_to_json;
use crate::values::{DbRegExp, ServerDate};

/// Handle to one cloud database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    config: CloudConfig,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Database {
    pub fn new(transport: Arc<dyn Transport>, config: CloudConfig) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    pub fn command(&self) -> Command {
        Command
    }

    pub fn server_date(&self, offset_ms: i64) -> ServerDate {
        ServerDate::with_offset(offset_ms)
    }

    pub fn regexp(&self, regexp: &str, options: &str) -> Result<DbRegExp, CloudError> {
        DbRegExp::new(regexp, options)
    }

    pub fn collection(&self, name: impl Into<String>) -> CollectionReference {
        let name = name.into();
        CollectionReference { query: Query::new(self.clone(), name) }
    }

    fn envelope(&self, request: Request) -> Envelope {
        Envelope::new(request, self.config.env.clone(), self.config.trace_user.unwrap_or(false))
    }

    fn call<T>(&self, action: Action, request: Result<Request, CloudError>) -> ApiCall<T>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        ApiCall::dispatch(&self.transport, action, request.map(|r| self.envelope(r)))
    }
}

#[derive(Debug, Clone)]
pub struct CollectionReference {
    query: Query,
}

impl CollectionReference {
    pub fn name(&self) -> &str {
        &self.query.collection
    }

    pub fn database(&self) -> &Database {
        &self.query.db
    }

    pub fn doc(&self, id: impl Into<DocumentId>) -> DocumentReference {
        DocumentReference {
            db: self.query.db.clone(),
            collection: self.query.collection.clone(),
            id: id.into(),
            projection: None,
        }
    }

    /// Insert one document. `_id`, when present, must be a string or an integer.
    pub fn add(&self, data: Document) -> ApiCall<AddResult> {
        let request = add_request(&self.query.collection, data);
        self.query.db.call(Action::AddDocument, request)
    }

    /// The collection as a query with no condition.
    pub fn query(&self) -> Query {
        self.query.clone()
    }

    pub fn where_(&self, condition: impl Into<Condition>) -> Query {
        self.query.where_(condition)
    }

    pub fn order_by(&self, field: impl Into<String>, direction: Direction) -> Query {
        self.query.order_by(field, direction)
    }

    pub fn limit(&self, max: u64) -> Query {
        self.query.limit(max)
    }

    pub fn skip(&self, offset: u64) -> Query {
        self.query.skip(offset)
    }

    pub fn field(&self, projection: Document) -> Query {
        self.query.field(projection)
    }

    pub fn get(&self) -> ApiCall<QueryResult> {
        self.query.get()
    }

    pub fn count(&self) -> ApiCall<CountResult> {
        self.query.count()
    }
}

fn add_request(collection: &str, data: Document) -> Result<Request, CloudError> {
    if data.is_empty() {
        return Err(CloudError::invalid("document data must not be empty"));
    }
    if let Some(id) = data.get("_id")
        && !matches!(id, Bson::String(_) | Bson::Int32(_) | Bson::Int64(_))
    {
        return Err(CloudError::invalid("_id must be a string or an integer"));
    }
    let data = bson_to_json(&Bson::Document(data))?;
    Ok(Request::AddDocument { collection: collection.to_string(), data })
}

/// An immutable query over one collection.
#[derive(Debug, Clone)]
pub struct Query {
    db: Database,
    collection: String,
    condition: Option<Condition>,
    order: Vec<OrderSpec>,
    offset: Option<u64>,
    limit: Option<u64>,
    projection: Option<Document>,
}

impl Query {
    fn new(db: Database, collection: String) -> Self {
        Self {
            db,
            collection,
            condition: None,
            order: Vec::new(),
            offset: None,
            limit: None,
            projection: None,
        }
    }

    /// Filter by `condition`, replacing any earlier condition.
    #[must_use]
    pub fn where_(&self, condition: impl Into<Condition>) -> Query {
        Query { condition: Some(condition.into()), ..self.clone() }
    }

    /// Append a sort key; earlier keys take precedence.
    #[must_use]
    pub fn order_by(&self, field: impl Into<String>, direction: Direction) -> Query {
        let mut q = self.clone();
        q.order.push(OrderSpec { field: field.into(), direction });
        q
    }

    #[must_use]
    pub fn limit(&self, max: u64) -> Query {
        Query { limit: Some(max), ..self.clone() }
    }

    #[must_use]
    pub fn skip(&self, offset: u64) -> Query {
        Query { offset: Some(offset), ..self.clone() }
    }

    /// Select returned fields: `{field: true|false}` (or 1/0).
    #[must_use]
    pub fn field(&self, projection: Document) -> Query {
        Query { projection: Some(projection), ..self.clone() }
    }

    fn encoded_condition(&self) -> Result<Option<Value>, CloudError> {
        match &self.condition {
            Some(c) => Ok(Some(encode_condition(&to_expression(c.clone())?)?)),
            None => Ok(None),
        }
    }

    pub fn to_get_request(&self) -> Result<Request, CloudError> {
        if let Some(limit) = self.limit
            && !(1..=MAX_LIMIT).contains(&limit)
        {
            return Err(CloudError::invalid(format!(
                "limit must be within 1..={MAX_LIMIT}, got {limit}"
            )));
        }
        for o in &self.order {
            validate_field_name(&o.field)?;
        }
        Ok(Request::QueryDocument {
            collection: self.collection.clone(),
            condition: self.encoded_condition()?,
            order: self.order.clone(),
            offset: self.offset,
            limit: self.limit,
            projection: self.projection.as_ref().map(encode_projection).transpose()?,
        })
    }

    pub fn to_count_request(&self) -> Result<Request, CloudError> {
        let condition = self.encoded_condition()?;
        Ok(Request::CountDocument { collection: self.collection.clone(), condition })
    }

    pub fn get(&self) -> ApiCall<QueryResult> {
        self.db.call(Action::QueryDocument, self.to_get_request())
    }

    pub fn count(&self) -> ApiCall<CountResult> {
        self.db.call(Action::CountDocument, self.to_count_request())
    }
}

fn encode_projection(doc: &Document) -> Result<Map<String, Value>, CloudError> {
    let mut out = Map::new();
    for (k, v) in doc {
        validate_field_name(k)?;
        let include = match v {
            Bson::Boolean(b) => *b,
            Bson::Int32(1) | Bson::Int64(1) => true,
            Bson::Int32(0) | Bson::Int64(0) => false,
            other => {
                return Err(CloudError::invalid(format!(
                    "projection value for `{k}` must be a boolean or 0/1, got {other}"
                )));
            }
        };
        out.insert(k.clone(), Value::Bool(include));
    }
    Ok(out)
}

/// One document addressed by id.
#[derive(Debug, Clone)]
pub struct DocumentReference {
    db: Database,
    collection: String,
    id: DocumentId,
    projection: Option<Document>,
}

impl DocumentReference {
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    #[must_use]
    pub fn field(&self, projection: Document) -> DocumentReference {
        DocumentReference { projection: Some(projection), ..self.clone() }
    }

    pub fn to_get_request(&self) -> Result<Request, CloudError> {
        Ok(Request::GetDocument {
            collection: self.collection.clone(),
            doc_id: self.id.clone(),
            projection: self.projection.as_ref().map(encode_projection).transpose()?,
        })
    }

    /// Replace the whole document. Only literal values are accepted.
    pub fn to_set_request(&self, data: impl Into<UpdateData>) -> Result<Request, CloudError> {
        let doc = data.into().into_literal_document()?;
        Ok(Request::SetDocument {
            collection: self.collection.clone(),
            doc_id: self.id.clone(),
            data: bson_to_json(&Bson::Document(doc))?,
        })
    }

    /// Partial update; literals are implicit `set`.
    pub fn to_update_request(&self, data: impl Into<UpdateData>) -> Result<Request, CloudError> {
        let commands = data.into().into_commands()?;
        Ok(Request::UpdateDocument {
            collection: self.collection.clone(),
            doc_id: self.id.clone(),
            data: encode_update(&commands)?,
        })
    }

    pub fn to_remove_request(&self) -> Request {
        Request::RemoveDocument { collection: self.collection.clone(), doc_id: self.id.clone() }
    }

    pub fn get(&self) -> ApiCall<QuerySingleResult> {
        self.db.call(Action::GetDocument, self.to_get_request())
    }

    pub fn set(&self, data: impl Into<UpdateData>) -> ApiCall<SetResult> {
        self.db.call(Action::SetDocument, self.to_set_request(data))
    }

    pub fn update(&self, data: impl Into<UpdateData>) -> ApiCall<UpdateResult> {
        self.db.call(Action::UpdateDocument, self.to_update_request(data))
    }

    pub fn remove(&self) -> ApiCall<RemoveResult> {
        self.db.call(Action::RemoveDocument, Ok(self.to_remove_request()))
    }
}
