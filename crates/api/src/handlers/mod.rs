pub mod dashboard;
pub mod health;
pub mod items;
pub mod metrics;
pub mod tasks;
pub mod worker;
