// Database query functions, one module per table group
pub mod audit;
pub mod earnings;
pub mod kyc;
pub mod notifications;
pub mod packages;
pub mod payments;
pub mod sessions;
pub mod stats;
pub mod users;
pub mod withdrawals;
