pub mod alerts;
pub mod items;
pub mod kardex;
pub mod purchases;
