#![forbid(unsafe_code)]

pub mod app;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod favorites;
pub mod logging;
pub mod offline;
pub mod records;
pub mod sheet;
pub mod table;
pub mod view;
