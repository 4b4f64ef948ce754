pub mod app;
pub mod auth;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod db;
pub mod encryption;
pub mod mailer;
pub mod pagination;
pub mod rest;
pub mod snowflake;
pub mod state;
pub mod storage;
pub mod users;
pub mod validation;

#[cfg(test)]
mod testing;
