//! Queue API routes, nested under `/api/queue`

use crate::api::handlers::{admin, counters, display, tickets};
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};

pub fn queue_routes() -> Router<AppState> {
    Router::new()
        // Tickets
        .route("/tickets", post(tickets::issue_ticket))
        .route("/tickets/status", get(tickets::ticket_status))
        .route("/tickets/:id/start-serving", post(tickets::start_serving))
        .route("/tickets/:id/complete", post(tickets::complete_ticket))
        .route("/tickets/:id/no-show", post(tickets::mark_no_show))
        .route("/tickets/:id/cancel", post(tickets::cancel_ticket))
        .route("/tickets/:id/transfer", post(tickets::transfer_ticket))
        .route("/tickets/:id/recall", post(tickets::recall_ticket))
        .route("/call-next", post(tickets::call_next))
        .route("/status", get(tickets::queue_status))
        // Counters
        .route(
            "/counters",
            get(counters::list_counters).post(counters::create_counter),
        )
        .route("/counters/:id", patch(counters::update_counter))
        // Display and announcements
        .route("/display", get(display::display))
        .route(
            "/display-boards",
            get(display::list_display_boards).post(display::create_display_board),
        )
        .route("/announcements/pending", get(display::pending_announcements))
        .route(
            "/announcements/:id/played",
            post(display::mark_announcement_played),
        )
        // Administration
        .route(
            "/config",
            get(admin::get_queue_config).put(admin::put_queue_config),
        )
        .route("/analytics", get(admin::analytics))
        // Unauthenticated kiosk and screen endpoints
        .route("/public/display/:hospital_id", get(display::public_display))
        .route(
            "/public/announcements/:hospital_id",
            get(display::public_announcements),
        )
        .route(
            "/public/ticket-status/:hospital_id",
            get(tickets::public_ticket_status),
        )
}
