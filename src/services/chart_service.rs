use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, Document};
use serde::Serialize;
use std::collections::BTreeMap;

use super::collect_documents;
use crate::{
    database::{MongoDB, EXAMS, RESULTS, USERS},
    models::bson_as_i64,
    utils::{days_between, to_bson_datetime, to_iso_string, AppError, DateRange},
};

/// Window shown when the request carries no bounds
pub const DEFAULT_CHART_DAYS: i64 = 30;

/// Longest window, in calendar days, a single chart request may span
pub const MAX_CHART_DAYS: i64 = 366;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub date: String,
    pub users: i64,
    pub exams: i64,
    pub questions: i64,
    pub answers: i64,
}

#[derive(Debug, Serialize)]
pub struct ChartRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataResponse {
    pub success: bool,
    pub data: Vec<ChartPoint>,
    pub date_range: ChartRange,
}

#[derive(Debug, Clone, Copy)]
enum Series {
    Users,
    Exams,
    Questions,
    Answers,
}

/// `$match` on the window, then one group per `YYYY-MM-DD` of `createdAt`.
fn daily_pipeline(start: DateTime<Utc>, end: DateTime<Utc>, count: Bson) -> Vec<Document> {
    vec![
        doc! {
            "$match": {
                "createdAt": { "$gte": to_bson_datetime(start), "$lte": to_bson_datetime(end) }
            }
        },
        doc! {
            "$group": {
                "_id": { "$dateToString": { "format": "%Y-%m-%d", "date": "$createdAt" } },
                "count": { "$sum": count },
            }
        },
        doc! { "$sort": { "_id": 1 } },
    ]
}

async fn daily_counts(
    db: &MongoDB,
    collection: &str,
    pipeline: Vec<Document>,
) -> Result<Vec<Document>, AppError> {
    let cursor = db.collection::<Document>(collection).aggregate(pipeline).await?;
    collect_documents(cursor, "daily count").await
}

/// Zero-filled series for every day in `days`, with the aggregated counts
/// written on top. Groups for days outside the range are dropped.
fn merge_series(days: Vec<String>, groups: [(Series, Vec<Document>); 4]) -> Vec<ChartPoint> {
    let mut points: BTreeMap<String, ChartPoint> = days
        .into_iter()
        .map(|date| {
            let point = ChartPoint { date: date.clone(), ..Default::default() };
            (date, point)
        })
        .collect();

    for (series, documents) in groups {
        for group in documents {
            let date = match group.get_str("_id") {
                Ok(date) => date,
                Err(_) => continue,
            };
            let Some(point) = points.get_mut(date) else {
                continue;
            };
            let count = group.get("count").and_then(bson_as_i64).unwrap_or(0);

            match series {
                Series::Users => point.users = count,
                Series::Exams => point.exams = count,
                Series::Questions => point.questions = count,
                Series::Answers => point.answers = count,
            }
        }
    }

    points.into_values().collect()
}

fn check_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    let days = (end.date_naive() - start.date_naive()).num_days() + 1;
    if days > MAX_CHART_DAYS {
        return Err(AppError::InvalidRequest(format!(
            "Date range too large: {} days (max {})",
            days, MAX_CHART_DAYS
        )));
    }
    Ok(())
}

/// GET /api/lucida/chart-data
pub async fn chart_data(
    db: &MongoDB,
    range: DateRange,
    now: DateTime<Utc>,
) -> Result<ChartDataResponse, AppError> {
    let (start, end) = range.resolve_or_last_days(now, DEFAULT_CHART_DAYS);
    check_window(start, end)?;

    log::debug!("📈 Chart data from {} to {}", start, end);

    let question_sizes = Bson::Document(doc! { "$size": { "$ifNull": ["$questions", []] } });

    let (users, exams, questions, answers) = futures::try_join!(
        daily_counts(db, USERS, daily_pipeline(start, end, Bson::Int32(1))),
        daily_counts(db, EXAMS, daily_pipeline(start, end, Bson::Int32(1))),
        daily_counts(db, EXAMS, daily_pipeline(start, end, question_sizes)),
        daily_counts(db, RESULTS, daily_pipeline(start, end, Bson::Int32(1))),
    )?;

    let data = merge_series(
        days_between(start.date_naive(), end.date_naive()),
        [
            (Series::Users, users),
            (Series::Exams, exams),
            (Series::Questions, questions),
            (Series::Answers, answers),
        ],
    );

    Ok(ChartDataResponse {
        success: true,
        data,
        date_range: ChartRange {
            from: to_iso_string(start),
            to: to_iso_string(end),
        },
    })
}
