//! Aggregation pipeline stages
//!
//! Stages arrive as raw single-key JSON objects. Parsing is where the
//! stage allow-list is enforced: anything outside the closed set below
//! is rejected, and `$lookup` is reduced to its four join keys.

use serde_json::{json, Map, Value};

use super::errors::{PlanError, PlanResult};

/// One allow-listed pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    Match(Map<String, Value>),
    Project(Map<String, Value>),
    Group(Map<String, Value>),
    Sort(Map<String, Value>),
    Limit(u64),
    Skip(u64),
    Unwind(Unwind),
    Lookup(Lookup),
}

/// `$unwind` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unwind {
    /// Field path without the leading `$`
    pub path: String,
    pub preserve_null_and_empty: bool,
}

/// `$lookup` equality join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
}

impl PipelineStage {
    /// Parses a raw stage object.
    pub fn parse(raw: &Value) -> PlanResult<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| PlanError::InvalidStage("stage must be an object".into()))?;

        let mut entries = obj.iter();
        let (name, body) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(PlanError::InvalidStage(format!(
                    "stage must have exactly one key, found {}",
                    obj.len()
                )))
            }
        };

        match name.as_str() {
            "$match" => Ok(Self::Match(object_body(name, body)?)),
            "$project" => Ok(Self::Project(object_body(name, body)?)),
            "$group" => Ok(Self::Group(object_body(name, body)?)),
            "$sort" => Ok(Self::Sort(object_body(name, body)?)),
            "$limit" => Ok(Self::Limit(count_body(name, body)?)),
            "$skip" => Ok(Self::Skip(count_body(name, body)?)),
            "$unwind" => Ok(Self::Unwind(Unwind::parse(body)?)),
            "$lookup" => Ok(Self::Lookup(Lookup::parse(body)?)),
            other => Err(PlanError::StageNotAllowed(other.to_string())),
        }
    }

    /// Operator name of the stage
    pub fn name(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Project(_) => "$project",
            Self::Group(_) => "$group",
            Self::Sort(_) => "$sort",
            Self::Limit(_) => "$limit",
            Self::Skip(_) => "$skip",
            Self::Unwind(_) => "$unwind",
            Self::Lookup(_) => "$lookup",
        }
    }

    /// Renders the stage back into its JSON form
    pub fn to_value(&self) -> Value {
        let body = match self {
            Self::Match(m) | Self::Project(m) | Self::Group(m) | Self::Sort(m) => {
                Value::Object(m.clone())
            }
            Self::Limit(n) | Self::Skip(n) => json!(n),
            Self::Unwind(u) => json!({
                "path": format!("${}", u.path),
                "preserveNullAndEmptyArrays": u.preserve_null_and_empty,
            }),
            Self::Lookup(l) => json!({
                "from": l.from,
                "localField": l.local_field,
                "foreignField": l.foreign_field,
                "as": l.as_field,
            }),
        };
        let mut stage = Map::new();
        stage.insert(self.name().to_string(), body);
        Value::Object(stage)
    }
}

impl Unwind {
    fn parse(body: &Value) -> PlanResult<Self> {
        let (path, preserve) = match body {
            Value::String(path) => (path.as_str(), false),
            Value::Object(spec) => {
                let path = spec.get("path").and_then(Value::as_str).ok_or_else(|| {
                    PlanError::InvalidStage("$unwind requires a string path".into())
                })?;
                let preserve = spec
                    .get("preserveNullAndEmptyArrays")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                (path, preserve)
            }
            _ => {
                return Err(PlanError::InvalidStage(
                    "$unwind must be a path or an object".into(),
                ))
            }
        };

        let path = path
            .strip_prefix('$')
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PlanError::InvalidStage(format!("$unwind path '{}' must start with $", path)))?;

        Ok(Self {
            path: path.to_string(),
            preserve_null_and_empty: preserve,
        })
    }
}

impl Lookup {
    /// Keeps only the four join keys; anything else is dropped.
    fn parse(body: &Value) -> PlanResult<Self> {
        let spec = body
            .as_object()
            .ok_or_else(|| PlanError::InvalidStage("$lookup must be an object".into()))?;

        let key = |name: &str| -> PlanResult<String> {
            spec.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| PlanError::InvalidStage(format!("$lookup requires '{}'", name)))
        };

        Ok(Self {
            from: key("from")?,
            local_field: key("localField")?,
            foreign_field: key("foreignField")?,
            as_field: key("as")?,
        })
    }
}

fn object_body(name: &str, body: &Value) -> PlanResult<Map<String, Value>> {
    body.as_object()
        .cloned()
        .ok_or_else(|| PlanError::InvalidStage(format!("{} body must be an object", name)))
}

fn count_body(name: &str, body: &Value) -> PlanResult<u64> {
    body.as_u64()
        .ok_or_else(|| PlanError::InvalidStage(format!("{} must be a non-negative integer", name)))
}
