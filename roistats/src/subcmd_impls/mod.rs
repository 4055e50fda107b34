pub mod args;
mod batch;
mod extract;
mod resample;
mod utils;
mod verify;
