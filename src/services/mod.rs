pub mod auth;
pub mod availability;
pub mod booking;
pub mod messaging;
pub mod notifications;
pub mod payments;
