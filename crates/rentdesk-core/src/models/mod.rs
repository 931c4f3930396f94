//! Data models for Rentdesk

mod consultation;
mod record;
mod reservation;
mod vehicle;

pub use consultation::{Consultation, ConsultationStatus};
pub use record::{Collection, DateRange, Record, RecordId};
pub use reservation::{Reservation, ReservationStatus};
pub use vehicle::{Vehicle, VehicleModel};
