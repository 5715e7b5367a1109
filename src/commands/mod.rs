// ABOUTME: Command module aggregator for the rollsafe CLI.
// ABOUTME: Re-exports the deploy command handler.

mod deploy;

pub use deploy::deploy;
