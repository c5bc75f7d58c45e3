// src/io/mod.rs
pub mod npy;
pub mod xyz;
