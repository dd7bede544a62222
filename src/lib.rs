pub mod config;
pub mod discovery;
pub mod fixtures;
pub mod generate;
pub mod judge;
pub mod model;
pub mod queue;
pub mod report;
pub mod sandbox;
pub mod score;
pub mod worker;

pub fn create_timestamp() -> String {
    use chrono::{SecondsFormat, Utc};
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
