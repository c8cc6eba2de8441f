//! API handlers module

pub mod health;
pub mod page;
pub mod starter_pack;
