#![allow(async_fn_in_trait)]

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod entities;
pub mod error;
pub mod fixtures;
pub mod query;
pub mod session;
pub mod upload;
pub mod views;

#[cfg(test)]
mod test_utils;
