pub mod detail;
pub mod fields;
pub mod response;
pub mod table;

pub use detail::{DetailLayout, StandardDetailLayout};
pub use response::{parse_record_response, RecordResponse};
