pub mod reminders;
pub mod worker;
