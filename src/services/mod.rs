pub mod charts;
pub mod data_processor;
pub mod insights;
