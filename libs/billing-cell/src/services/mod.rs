pub mod accounting;
pub mod expenses;
pub mod invoices;
pub mod reports;
pub mod sri;
