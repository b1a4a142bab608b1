pub mod billing_queries;
pub mod measurement_queries;
pub mod season_queries;
