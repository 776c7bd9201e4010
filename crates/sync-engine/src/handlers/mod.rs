pub mod deployments;
pub mod health;
pub mod integrations;
pub mod sync;
pub mod webhook;
