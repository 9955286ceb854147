pub mod check;
pub mod logging;
pub mod stats;
