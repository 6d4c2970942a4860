// Command modules for the escrow CLI

pub mod check;
pub mod escrow;
pub mod run;
pub mod utils;
