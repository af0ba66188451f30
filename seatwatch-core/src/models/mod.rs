mod request;

pub use request::{is_accessible_class, MonitoringRequest, RequestStatus, TimeSlot};
