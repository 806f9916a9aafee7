//! Test suite for the LusoTown engine
//!
//! This module organizes all tests

pub mod common;
pub mod integration;
pub mod property;
