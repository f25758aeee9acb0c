use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::{deserialize_id_string, deserialize_lenient_f64, deserialize_lenient_i64};
use crate::utils::bson_to_iso;

/// Documento da collection "results" (uma tentativa de prova)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    #[serde(rename = "_id", default)]
    pub object_id: Option<ObjectId>,

    #[serde(default, deserialize_with = "deserialize_id_string")]
    pub exam_id: Option<String>,

    #[serde(default, deserialize_with = "deserialize_id_string")]
    pub class_id: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub score: Option<f64>,

    /// Fraction between 0 and 1
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub percentage: Option<f64>,

    #[serde(default)]
    pub exam_title: Option<String>,

    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub exam_question_count: Option<i64>,

    #[serde(default)]
    pub created_at: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResultResponse {
    #[serde(rename = "_id")]
    pub object_id: String,
    pub exam_id: Option<String>,
    pub class_id: Option<String>,
    pub email: Option<String>,
    pub score: f64,
    pub percentage: f64,
    pub exam_title: Option<String>,
    pub exam_question_count: i64,
    pub created_at: Option<String>,
}

impl From<ExamResult> for ExamResultResponse {
    fn from(result: ExamResult) -> Self {
        ExamResultResponse {
            object_id: result.object_id.map(|id| id.to_hex()).unwrap_or_default(),
            exam_id: result.exam_id,
            class_id: result.class_id,
            email: result.email,
            score: result.score.unwrap_or(0.0),
            percentage: result.percentage.unwrap_or(0.0),
            exam_title: result.exam_title,
            exam_question_count: result.exam_question_count.unwrap_or(0),
            created_at: bson_to_iso(result.created_at),
        }
    }
}
