use mongodb::bson::{oid::ObjectId, Bson, DateTime};
use serde::{Deserialize, Serialize};

use super::{bson_to_json, deserialize_id_string, deserialize_lenient_f64, deserialize_lenient_i64};
use crate::utils::bson_to_iso;

/// Documento da collection "exams"
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    #[serde(rename = "_id", default)]
    pub object_id: Option<ObjectId>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "deserialize_id_string")]
    pub class_id: Option<String>,

    /// Owner (User.id)
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub questions: Option<Vec<Question>>,

    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub question_count: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub duration: Option<f64>,

    #[serde(default)]
    pub difficulty: Option<String>,

    #[serde(rename = "type", default)]
    pub exam_type: Option<Bson>,

    #[serde(default)]
    pub share_id: Option<String>,

    #[serde(default)]
    pub is_public: Option<bool>,

    #[serde(default)]
    pub created_at: Option<DateTime>,

    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<Bson>>,
    #[serde(default)]
    pub correct_answer: Option<Bson>,
}

impl Exam {
    pub fn id_hex(&self) -> String {
        self.object_id.map(|id| id.to_hex()).unwrap_or_default()
    }

    pub fn question_total(&self) -> usize {
        self.questions.as_ref().map(Vec::len).unwrap_or(0)
    }
}

// ==================== RESPONSES ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub options: Vec<serde_json::Value>,
    pub correct_answer: serde_json::Value,
}

impl From<Question> for QuestionResponse {
    fn from(question: Question) -> Self {
        QuestionResponse {
            question: question.question,
            context: question.context,
            options: question
                .options
                .unwrap_or_default()
                .into_iter()
                .map(Bson::into_relaxed_extjson)
                .collect(),
            correct_answer: bson_to_json(question.correct_answer),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResponse {
    #[serde(rename = "_id")]
    pub object_id: String,
    pub title: Option<String>,
    pub class_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<QuestionResponse>,
    pub question_count: i64,
    pub duration: Option<f64>,
    pub difficulty: Option<String>,
    #[serde(rename = "type")]
    pub exam_type: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    pub is_public: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<Exam> for ExamResponse {
    fn from(exam: Exam) -> Self {
        let object_id = exam.id_hex();
        let question_total = exam.question_total() as i64;

        ExamResponse {
            object_id,
            title: exam.title,
            class_id: exam.class_id,
            user_id: exam.user_id,
            description: exam.description,
            questions: exam
                .questions
                .unwrap_or_default()
                .into_iter()
                .map(QuestionResponse::from)
                .collect(),
            question_count: exam.question_count.unwrap_or(question_total),
            duration: exam.duration,
            difficulty: exam.difficulty,
            exam_type: bson_to_json(exam.exam_type),
            share_id: exam.share_id,
            is_public: exam.is_public.unwrap_or(false),
            created_at: bson_to_iso(exam.created_at),
            updated_at: bson_to_iso(exam.updated_at),
        }
    }
}
