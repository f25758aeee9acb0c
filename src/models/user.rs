use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::deserialize_lenient_i64;
use crate::utils::bson_to_iso;

/// Documento da collection "users" (escrito pelo Lucida)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", default)]
    pub object_id: Option<ObjectId>,

    /// Clerk id; for older accounts this is the e-mail address
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub subscription: Option<Subscription>,

    #[serde(default)]
    pub usage: Option<Usage>,

    #[serde(default)]
    pub integration_id: Option<String>,

    #[serde(default)]
    pub integrat_partner_token: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime>,

    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime>,
    #[serde(default)]
    pub end_date: Option<DateTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub exams_this_period: Option<i64>,
    #[serde(default)]
    pub exams_this_period_reset_date: Option<DateTime>,
}

impl User {
    pub fn stored_exams_this_period(&self) -> Option<i64> {
        self.usage.as_ref().and_then(|usage| usage.exams_this_period)
    }
}

/// Planos aceitos pelo PATCH /users/{id}/plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserPlan {
    Free,
    Pro,
    Premium,
    Enterprise,
    Trial,
    Monthly,
    SemiAnnual,
    Annual,
    Admin,
    Custom,
}

impl UserPlan {
    pub const ALL: [UserPlan; 10] = [
        UserPlan::Free,
        UserPlan::Pro,
        UserPlan::Premium,
        UserPlan::Enterprise,
        UserPlan::Trial,
        UserPlan::Monthly,
        UserPlan::SemiAnnual,
        UserPlan::Annual,
        UserPlan::Admin,
        UserPlan::Custom,
    ];

    /// Plans that get their own counter on the dashboard cards
    pub const BREAKDOWN: [UserPlan; 5] = [
        UserPlan::Trial,
        UserPlan::Monthly,
        UserPlan::SemiAnnual,
        UserPlan::Annual,
        UserPlan::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserPlan::Free => "free",
            UserPlan::Pro => "pro",
            UserPlan::Premium => "premium",
            UserPlan::Enterprise => "enterprise",
            UserPlan::Trial => "trial",
            UserPlan::Monthly => "monthly",
            UserPlan::SemiAnnual => "semi-annual",
            UserPlan::Annual => "annual",
            UserPlan::Admin => "admin",
            UserPlan::Custom => "custom",
        }
    }

    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|plan| plan.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for UserPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserPlan::ALL
            .iter()
            .copied()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| format!("Invalid plan. Must be one of: {}", UserPlan::valid_values()))
    }
}

// ==================== RESPONSES ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub object_id: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageResponse>,
    pub integration_id: Option<String>,
    pub integrat_partner_token: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub plan: Option<String>,
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub exams_this_period: Option<i64>,
    pub exams_this_period_reset_date: Option<String>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(subscription: Subscription) -> Self {
        SubscriptionResponse {
            plan: subscription.plan,
            status: subscription.status,
            start_date: bson_to_iso(subscription.start_date),
            end_date: bson_to_iso(subscription.end_date),
        }
    }
}

impl From<Usage> for UsageResponse {
    fn from(usage: Usage) -> Self {
        UsageResponse {
            exams_this_period: usage.exams_this_period,
            exams_this_period_reset_date: bson_to_iso(usage.exams_this_period_reset_date),
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            object_id: user.object_id.map(|id| id.to_hex()).unwrap_or_default(),
            id: user.id,
            email: user.email,
            username: user.username,
            display_name: None,
            subscription: user.subscription.map(SubscriptionResponse::from),
            usage: user.usage.map(UsageResponse::from),
            integration_id: user.integration_id,
            integrat_partner_token: user.integrat_partner_token,
            created_at: bson_to_iso(user.created_at),
            updated_at: bson_to_iso(user.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{self, doc};

    #[test]
    fn test_plan_parsing() {
        assert_eq!("semi-annual".parse::<UserPlan>().unwrap(), UserPlan::SemiAnnual);
        assert_eq!("admin".parse::<UserPlan>().unwrap(), UserPlan::Admin);

        let err = "gold".parse::<UserPlan>().unwrap_err();
        assert!(err.starts_with("Invalid plan. Must be one of: free, pro,"));
        assert!("Monthly".parse::<UserPlan>().is_err());
    }

    #[test]
    fn test_plan_serde_matches_as_str() {
        for plan in UserPlan::ALL {
            let json = serde_json::to_value(plan).unwrap();
            assert_eq!(json, serde_json::json!(plan.as_str()));
        }
    }

    #[test]
    fn test_user_deserializes_with_mixed_numeric_usage() {
        let document = doc! {
            "_id": bson::oid::ObjectId::new(),
            "id": "ana@example.com",
            "subscription": { "plan": "trial", "status": "active" },
            "usage": { "examsThisPeriod": 4.0 },
            "createdAt": bson::DateTime::from_millis(0),
            "__v": 0,
        };

        let user: User = bson::from_document(document).unwrap();
        assert_eq!(user.id, "ana@example.com");
        assert_eq!(user.stored_exams_this_period(), Some(4));
        assert_eq!(user.subscription.unwrap().plan.as_deref(), Some("trial"));
    }

    #[test]
    fn test_user_response_uses_iso_dates() {
        let document = doc! {
            "_id": bson::oid::ObjectId::new(),
            "id": "user_123",
            "createdAt": bson::DateTime::from_millis(86_400_000),
        };
        let user: User = bson::from_document(document).unwrap();
        let response = serde_json::to_value(UserResponse::from(user)).unwrap();

        assert_eq!(response["createdAt"], "1970-01-02T00:00:00.000Z");
        assert_eq!(response["integrationId"], serde_json::Value::Null);
        assert!(response.get("displayName").is_none());
    }
}
