//! End-to-end tests driving programs through the CPU backend

mod batching;
mod common;
mod dependencies;
mod memory;
mod plans;
mod recompilation;
mod transfers;
mod warmup;
