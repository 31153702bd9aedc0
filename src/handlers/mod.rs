// HTTP adapter over the repair lifecycle services
pub mod bookings;
pub mod quotes;
pub mod technicians;
pub mod work_orders;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
