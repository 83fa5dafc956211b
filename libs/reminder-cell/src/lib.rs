pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use router::reminder_routes;
pub use services::worker::ReminderWorkerService;
