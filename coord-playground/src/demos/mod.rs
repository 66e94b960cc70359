pub mod broadcast;
pub mod cache;
pub mod counter;
pub mod fan_in;
pub mod pool;
pub mod receive;
