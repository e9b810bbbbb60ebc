pub mod health;
pub mod price;
pub mod twap;
pub mod ws;
