pub mod feasibility;
pub mod layout;
pub mod lp_model;
pub mod plot;
pub mod replay;
pub mod results;
pub mod scheduler;
pub mod service;
pub mod solver;
