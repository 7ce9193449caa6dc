pub mod bridge;
pub mod error;
pub mod influx;
pub mod mqtt;
pub mod point;
pub mod sensor;
