pub mod config;
pub mod controller;
pub mod cursor;
pub mod doctor;
pub mod mission;
pub mod negotiate;
pub mod planner;
pub mod setpoint;
pub mod shared;
pub mod waypoints;

pub use config::{MissionConfig, TrackingGains};
pub use controller::{Controller, Inputs};
pub use planner::PlannerLink;
