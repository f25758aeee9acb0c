use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kintal API - Lucida Admin",
        version = "1.0.0",
        description = "JSON API behind the Kintal admin dashboard.\n\n**Authentication:** the `/api` routes are not behind the dashboard login; restrict access at the network edge.\n\n**Features:**\n- Lucida users, exams, questions and results metrics\n- User plan, usage and integration management\n- Partner integrations\n- Daily chart series\n- OpenAI costs converted to BRL\n- PostHog error monitoring",
        contact(
            name = "Kintal Team"
        )
    ),
    paths(
        // Health & Metrics
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,

        // Users
        crate::api::users::get_users,
        crate::api::users::list_users,
        crate::api::users::search_user,
        crate::api::users::update_plan,
        crate::api::users::update_usage,
        crate::api::users::link_integration,
        crate::api::users::unlink_integration,
        crate::api::users::update_partner_token,
        crate::api::users::export_results,

        // Exams
        crate::api::exams::get_exams,
        crate::api::exams::get_questions,

        // Results
        crate::api::answers::get_answers,
        crate::api::answers::get_answer_key,
        crate::api::answers::delete_result,

        // Integrations
        crate::api::integrations::list_integrations,
        crate::api::integrations::create_integration,
        crate::api::integrations::delete_integration,

        // Charts
        crate::api::chart::get_chart_data,

        // Costs
        crate::api::costs::get_costs,

        // Errors
        crate::api::errors::list_errors,
        crate::api::errors::error_types,
        crate::api::errors::error_stats,
        crate::api::errors::error_chart,
    ),
    components(
        schemas(
            // Health & Metrics
            crate::api::health::HealthResponse,
            crate::api::metrics::MetricsResponse,

            // Integrations
            crate::models::CreateIntegrationRequest,
            crate::models::IntegrationResponse,
            crate::services::integration_service::IntegrationsListResponse,
            crate::services::integration_service::IntegrationCreatedResponse,
            crate::services::integration_service::IntegrationDeletedResponse,

            // Costs
            crate::services::openai_cost_service::CostsResponse,
            crate::services::openai_cost_service::ModelCost,
            crate::services::openai_cost_service::CostTotals,
        )
    ),
    tags(
        (name = "Users", description = "Lucida users: metrics, paginated list, search and account updates."),
        (name = "Exams", description = "Generated exams and question totals."),
        (name = "Results", description = "Exam results (answers), answer key and result removal."),
        (name = "Integrations", description = "Partner integrations that users can be linked to."),
        (name = "Charts", description = "Daily series for the dashboard chart."),
        (name = "Costs", description = "OpenAI organization costs converted from USD to BRL."),
        (name = "Errors", description = "Frontend exceptions reported to PostHog."),
        (name = "Health", description = "Health check and request counters."),
    )
)]
pub struct ApiDoc;
