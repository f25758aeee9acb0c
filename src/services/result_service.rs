// Results ("answers" on the dashboard): one document per exam attempt.

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId, Bson};
use serde::Serialize;

use super::collect_documents;
use crate::{
    database::{MongoDB, RESULTS},
    models::{ExamResult, ExamResultResponse},
    utils::{from_bson_datetime, AppError, DateRange},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswersOverviewResponse {
    pub success: bool,
    pub data: Vec<ExamResultResponse>,
    pub count: usize,
    pub weekly_count: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResultResponse {
    pub success: bool,
    pub message: String,
    pub data: ExamResultResponse,
}

/// GET /api/lucida/answers
pub async fn answers_overview(
    db: &MongoDB,
    range: DateRange,
    now: DateTime<Utc>,
) -> Result<AnswersOverviewResponse, AppError> {
    let collection = db.collection::<ExamResult>(RESULTS);

    let cursor = collection
        .find(range.created_at_filter())
        .sort(doc! { "createdAt": -1 })
        .await?;
    let results = collect_documents(cursor, "result").await?;

    let weekly_count = collection.count_documents(range.weekly_filter(now)).await?;

    let data: Vec<ExamResultResponse> = results.into_iter().map(ExamResultResponse::from).collect();

    Ok(AnswersOverviewResponse {
        success: true,
        count: data.len(),
        data,
        weekly_count,
    })
}

/// Results whose `examId` is one of `exam_ids`, newest first.
///
/// Lucida stores `examId` as the exam's hex string, but older documents hold
/// an ObjectId, so both representations are matched.
pub async fn results_for_exams(
    db: &MongoDB,
    exam_ids: &[String],
) -> Result<Vec<ExamResult>, AppError> {
    if exam_ids.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = exam_id_candidates(exam_ids);
    let cursor = db
        .collection::<ExamResult>(RESULTS)
        .find(doc! { "examId": { "$in": candidates } })
        .sort(doc! { "createdAt": -1 })
        .await?;

    collect_documents(cursor, "result").await
}

fn exam_id_candidates(exam_ids: &[String]) -> Vec<Bson> {
    let mut candidates: Vec<Bson> = exam_ids.iter().map(|id| Bson::String(id.clone())).collect();
    candidates.extend(
        exam_ids
            .iter()
            .filter_map(|id| ObjectId::parse_str(id).ok())
            .map(Bson::ObjectId),
    );
    candidates
}

/// DELETE /api/lucida/results/{id}
pub async fn delete_result(db: &MongoDB, result_id: &str) -> Result<DeleteResultResponse, AppError> {
    let object_id = ObjectId::parse_str(result_id)
        .map_err(|_| AppError::InvalidRequest("Invalid result id".to_string()))?;

    let deleted = db
        .collection::<ExamResult>(RESULTS)
        .find_one_and_delete(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Result not found".to_string()))?;

    log::info!("🗑️  Result {} deleted", result_id);

    Ok(DeleteResultResponse {
        success: true,
        message: "Result deleted successfully".to_string(),
        data: ExamResultResponse::from(deleted),
    })
}

// ==================== CSV EXPORT ====================

const CSV_HEADERS: [&str; 8] = [
    "Email",
    "Titulo do Exame",
    "Pontuacao",
    "Total de Questoes",
    "Percentual",
    "Data de Realizacao",
    "ID do Exame",
    "ID da Classe",
];

pub fn format_percentage(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        score.to_string()
    }
}

/// Spreadsheet export of results, one row per attempt.
pub fn results_to_csv(results: &[ExamResult]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(CSV_HEADERS)
        .map_err(|e| AppError::Internal(format!("Failed to write CSV: {}", e)))?;

    for result in results {
        let taken_at = result
            .created_at
            .and_then(from_bson_datetime)
            .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_default();

        writer
            .write_record([
                result.email.clone().unwrap_or_default(),
                result.exam_title.clone().unwrap_or_default(),
                format_score(result.score.unwrap_or(0.0)),
                result.exam_question_count.unwrap_or(0).to_string(),
                format_percentage(result.percentage.unwrap_or(0.0)),
                taken_at,
                result.exam_id.clone().unwrap_or_default(),
                result.class_id.clone().unwrap_or_default(),
            ])
            .map_err(|e| AppError::Internal(format!("Failed to write CSV: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV: {}", e)))?;

    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("Invalid CSV encoding: {}", e)))
}

/// Keeps ASCII letters and digits, everything else becomes `_`.
pub fn sanitize_filename_part(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mongodb::bson::{self, doc};

    fn result(email: &str, percentage: f64) -> ExamResult {
        let created = Utc.with_ymd_and_hms(2024, 4, 2, 13, 5, 0).unwrap();
        bson::from_document(doc! {
            "_id": ObjectId::new(),
            "examId": "65f0c0ffee",
            "classId": "turma-a",
            "email": email,
            "score": 7,
            "percentage": percentage,
            "examTitle": "Prova, de \"Química\"",
            "examQuestionCount": 10,
            "createdAt": bson::DateTime::from_millis(created.timestamp_millis()),
        })
        .unwrap()
    }

    #[test]
    fn test_csv_export_layout() {
        let csv = results_to_csv(&[result("ana@example.com", 0.7)]).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            "Email,Titulo do Exame,Pontuacao,Total de Questoes,Percentual,Data de Realizacao,ID do Exame,ID da Classe"
        );
        assert_eq!(
            lines.next().unwrap(),
            "ana@example.com,\"Prova, de \"\"Química\"\"\",7,10,70.00%,02/04/2024 13:05,65f0c0ffee,turma-a"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_export_with_no_results_has_only_headers() {
        let csv = results_to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_percentage_and_score_formatting() {
        assert_eq!(format_percentage(0.8333), "83.33%");
        assert_eq!(format_percentage(1.0), "100.00%");
        assert_eq!(format_score(7.0), "7");
        assert_eq!(format_score(7.5), "7.5");
    }

    #[test]
    fn test_exam_id_candidates_include_object_ids() {
        let oid = ObjectId::new();
        let candidates = exam_id_candidates(&[oid.to_hex(), "legacy-id".to_string()]);

        assert_eq!(candidates.len(), 3);
        assert!(candidates.contains(&Bson::ObjectId(oid)));
        assert!(candidates.contains(&Bson::String("legacy-id".into())));
    }

    #[test]
    fn test_sanitize_filename_part() {
        assert_eq!(sanitize_filename_part("Prova 1: Física"), "Prova_1__F_sica");
    }

    #[tokio::test]
    async fn test_delete_rejects_malformed_id() {
        let db = crate::database::test_support::offline_db().await;
        let err = delete_result(&db, "not-an-object-id").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_delete_result_then_not_found() {
        use crate::database::test_support::{drop_live_db, live_db};
        use mongodb::bson::{DateTime as BsonDateTime, Document};

        let db = live_db().await;
        let result_id = ObjectId::new();
        db.collection::<Document>(RESULTS)
            .insert_one(doc! {
                "_id": result_id,
                "examId": ObjectId::new().to_hex(),
                "score": 3,
                "percentage": 0.3,
                "createdAt": BsonDateTime::now(),
            })
            .await
            .unwrap();

        let deleted = delete_result(&db, &result_id.to_hex()).await.unwrap();
        assert_eq!(deleted.data.object_id, result_id.to_hex());
        assert_eq!(deleted.data.percentage, 0.3);

        let err = delete_result(&db, &result_id.to_hex()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Result not found"));

        drop_live_db(&db).await;
    }
}
