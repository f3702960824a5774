//! Controller layer: action binding, permission gating, response envelopes.

pub mod crud_controller;
pub mod envelope;
pub mod params;
pub mod shape;
