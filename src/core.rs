pub mod cooldown;
pub mod coordinator;
pub mod gateway;
pub mod load;
pub mod mode;
pub mod projection;
pub mod report;
