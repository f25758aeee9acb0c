use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::Serialize;

use super::collect_documents;
use crate::{
    database::{MongoDB, EXAMS},
    models::{bson_as_i64, bson_to_json, Exam, ExamResponse},
    utils::{AppError, DateRange},
};

// ==================== RESPONSE MODELS ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamsOverviewResponse {
    pub success: bool,
    pub data: Vec<ExamResponse>,
    pub count: usize,
    pub weekly_count: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTotals {
    /// Sum of `questions.length`
    pub total_questions: i64,
    /// Sum of the stored `questionCount` field
    pub total_questions_from_count: i64,
    pub exam_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsSummaryResponse {
    pub success: bool,
    pub data: QuestionTotals,
    pub weekly_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerKeyEntry {
    pub exam_id: String,
    pub exam_title: Option<String>,
    /// 1-based position inside the exam
    pub question_index: usize,
    pub question: Option<String>,
    pub correct_answer: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerKeySummary {
    pub total_exams: usize,
    pub total_answers: usize,
}

#[derive(Debug, Serialize)]
pub struct AnswerKeyResponse {
    pub success: bool,
    pub data: Vec<AnswerKeyEntry>,
    pub count: usize,
    pub summary: AnswerKeySummary,
}

// ==================== SERVICE FUNCTIONS ====================

/// GET /api/lucida/exams
pub async fn exams_overview(
    db: &MongoDB,
    range: DateRange,
    now: DateTime<Utc>,
) -> Result<ExamsOverviewResponse, AppError> {
    let collection = db.collection::<Exam>(EXAMS);

    let cursor = collection
        .find(range.created_at_filter())
        .sort(doc! { "createdAt": -1 })
        .await?;
    let exams = collect_documents(cursor, "exam").await?;

    let weekly_count = collection.count_documents(range.weekly_filter(now)).await?;

    let data: Vec<ExamResponse> = exams.into_iter().map(ExamResponse::from).collect();

    Ok(ExamsOverviewResponse {
        success: true,
        count: data.len(),
        data,
        weekly_count,
    })
}

fn question_totals_pipeline(filter: Document) -> Vec<Document> {
    vec![
        doc! { "$match": filter },
        doc! {
            "$group": {
                "_id": null,
                "examCount": { "$sum": 1 },
                "totalQuestions": { "$sum": { "$size": { "$ifNull": ["$questions", []] } } },
                "totalQuestionsFromCount": { "$sum": { "$ifNull": ["$questionCount", 0] } },
            }
        },
    ]
}

fn read_question_totals(group: Option<&Document>) -> QuestionTotals {
    let read = |key: &str| {
        group
            .and_then(|doc| doc.get(key))
            .and_then(bson_as_i64)
            .unwrap_or(0)
    };

    QuestionTotals {
        total_questions: read("totalQuestions"),
        total_questions_from_count: read("totalQuestionsFromCount"),
        exam_count: read("examCount"),
    }
}

async fn question_totals(db: &MongoDB, filter: Document) -> Result<QuestionTotals, AppError> {
    let cursor = db
        .collection::<Document>(EXAMS)
        .aggregate(question_totals_pipeline(filter))
        .await?;
    let groups = collect_documents(cursor, "question totals").await?;
    Ok(read_question_totals(groups.first()))
}

/// GET /api/lucida/questions
pub async fn questions_summary(
    db: &MongoDB,
    range: DateRange,
    now: DateTime<Utc>,
) -> Result<QuestionsSummaryResponse, AppError> {
    let (totals, weekly) = futures::try_join!(
        question_totals(db, range.created_at_filter()),
        question_totals(db, range.weekly_filter(now)),
    )?;

    Ok(QuestionsSummaryResponse {
        success: true,
        data: totals,
        weekly_count: weekly.total_questions,
    })
}

/// Flattens the questions of every exam into answer-key rows.
pub fn build_answer_key(exams: Vec<Exam>) -> Vec<AnswerKeyEntry> {
    let mut entries = Vec::new();

    for exam in exams {
        let exam_id = exam.id_hex();
        for (index, question) in exam.questions.unwrap_or_default().into_iter().enumerate() {
            entries.push(AnswerKeyEntry {
                exam_id: exam_id.clone(),
                exam_title: exam.title.clone(),
                question_index: index + 1,
                question: question.question,
                correct_answer: bson_to_json(question.correct_answer),
            });
        }
    }

    entries
}

/// GET /api/lucida/answers/key
pub async fn answer_key(db: &MongoDB) -> Result<AnswerKeyResponse, AppError> {
    let cursor = db
        .collection::<Exam>(EXAMS)
        .find(doc! {})
        .projection(doc! { "title": 1, "questions": 1 })
        .await?;
    let exams = collect_documents(cursor, "exam").await?;
    let total_exams = exams.len();

    let data = build_answer_key(exams);

    Ok(AnswerKeyResponse {
        success: true,
        count: data.len(),
        summary: AnswerKeySummary {
            total_exams,
            total_answers: data.len(),
        },
        data,
    })
}

/// Every exam owned by `user_id`, newest first.
pub async fn exams_for_user(db: &MongoDB, user_id: &str) -> Result<Vec<Exam>, AppError> {
    let cursor = db
        .collection::<Exam>(EXAMS)
        .find(doc! { "userId": user_id })
        .sort(doc! { "createdAt": -1 })
        .await?;
    collect_documents(cursor, "exam").await
}
