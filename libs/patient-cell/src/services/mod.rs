pub mod appointments;
pub mod histories;
pub mod patients;
