pub mod follow_up;
pub mod message;
pub mod record;
pub mod ui;
