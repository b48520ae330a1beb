pub mod appointment;
pub mod barber;
pub mod contact;
pub mod profile;
pub mod schedule;
pub mod service;

pub use appointment::{Appointment, AppointmentStatus};
pub use barber::Barber;
pub use contact::CustomerContact;
pub use profile::{Profile, Role};
pub use schedule::ShopSchedule;
pub use service::Service;
