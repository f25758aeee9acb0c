pub mod exam;
pub mod exam_result;
pub mod integration;
pub mod user;

pub use exam::*;
pub use exam_result::*;
pub use integration::*;
pub use user::*;

use mongodb::bson::Bson;
use serde::Deserialize;

// Lucida writes numbers through Mongoose, so a field may come back as
// Int32, Int64 or Double depending on the value that was stored.

pub fn bson_as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        Bson::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn bson_as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) if v.is_finite() => Some(v.trunc() as i64),
        Bson::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub(crate) fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Bson>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(bson_as_f64))
}

pub(crate) fn deserialize_lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Bson>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(bson_as_i64))
}

/// References to other documents are stored either as ObjectId or as its hex string.
pub(crate) fn deserialize_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Bson>::deserialize(deserializer)?;
    match value {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::ObjectId(oid)) => Ok(Some(oid.to_hex())),
        Some(Bson::String(s)) => Ok(Some(s)),
        Some(_) => Err(serde::de::Error::custom("Expected ObjectId or String")),
    }
}

/// Free-form values (answers, exam types) are exposed as relaxed extended JSON.
pub fn bson_to_json(value: Option<Bson>) -> serde_json::Value {
    value
        .map(Bson::into_relaxed_extjson)
        .unwrap_or(serde_json::Value::Null)
}
