pub mod features;
pub mod link_extraction;
pub mod link_guarantor;
pub mod problem;
pub mod region_guarantor;
pub mod solution_guarantor;
pub mod solver;
pub mod threshold_extractor;
