// [apps/orchestrator/src/routes.rs]

//! The `/api/v1` router (§6.1): every route in the endpoint table, an
//! auth guard in front of everything but the health check, and a
//! permissive CORS layer for the operator dashboard.

use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{assets, auth, monitoring, nodes, schedules, tasks, worker};
use crate::kernel::AppState;
use crate::middleware::auth_guard;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let auth_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/verify", get(auth::verify));

    let task_routes = Router::new()
        .route("/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route("/tasks/:id", get(tasks::get_task))
        .route("/tasks/:id/cancel", post(tasks::cancel_task))
        .route("/tasks/:id/retry", post(tasks::retry_task))
        .route("/tasks/:id/results", get(tasks::task_results).post(worker::submit_results))
        .route("/tasks/:id/export", get(tasks::export_task_results))
        .route("/tasks/:id/progress", post(worker::report_progress))
        .route("/subdomains/tasks", post(tasks::create_subdomain_task))
        .route("/portscan/tasks", post(tasks::create_portscan_task))
        .route("/monitoring", post(tasks::create_monitor_task));

    let asset_routes = Router::new()
        .route("/assets", get(assets::list_assets).post(assets::create_asset))
        .route("/assets/batch", post(assets::batch_create_assets));

    let node_routes = Router::new()
        .route("/nodes/register", post(nodes::register_node))
        .route("/nodes/:id/heartbeat", post(nodes::heartbeat))
        .route("/worker/tasks/next", get(worker::next_task));

    let monitoring_routes = Router::new()
        .route("/monitoring/:id/snapshot", get(monitoring::latest_snapshot).post(monitoring::submit_snapshot));

    let schedule_routes = Router::new()
        .route("/schedules", post(schedules::create_schedule))
        .route("/schedules/:id", get(schedules::get_schedule).delete(schedules::delete_schedule));

    let protected = Router::new()
        .merge(task_routes)
        .merge(asset_routes)
        .merge(node_routes)
        .merge(monitoring_routes)
        .merge(schedule_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api/v1", Router::new().merge(auth_routes).merge(protected))
        .layer(cors)
        .with_state(state)
}
