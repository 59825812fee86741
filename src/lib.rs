//! Library crate for umpire-schedule-back, exposing modules for binaries and tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod schedule;
pub mod services;
pub mod state;
