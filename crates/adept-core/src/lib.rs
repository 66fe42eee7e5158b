//! State store, assignment planner, and reconciliation loop for the Adept
//! follower bot.
//!
//! This crate owns the control loop that keeps a game account busy: ingest
//! a state snapshot, complete finished progresses, bind idle followers to
//! eligible missions, and re-converge after every state change within one
//! polling tick.
//!
//! # Modules
//!
//! - [`gateway`] -- [`GameGateway`] trait, the boundary to the authenticated
//!   transport.
//! - [`classify`] -- Maps raw responses to a closed outcome taxonomy.
//! - [`store`] -- [`StateStore`] owning the four state repositories.
//! - [`planner`] -- Pure follower selection for a single mission.
//! - [`engine`] -- The drain/attempt convergence loop for one tick.
//! - [`scheduler`] -- Jittered polling loop driving successive ticks.
//!
//! [`GameGateway`]: gateway::GameGateway
//! [`StateStore`]: store::StateStore

pub mod classify;
pub mod engine;
pub mod gateway;
pub mod planner;
pub mod scheduler;
pub mod store;
