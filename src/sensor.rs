mod reading;
mod sensor_type;
mod topic;

pub use reading::*;
pub use sensor_type::*;
pub use topic::*;
