pub mod engines;
pub mod health;
pub mod matches;
