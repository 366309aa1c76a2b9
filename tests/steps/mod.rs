//! Step definitions for cucumber scenarios.

mod relay_steps;
