//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own game rules, room state, and persistence concerns so
//! route handlers can stay focused on protocol translation.

pub mod board;
pub mod bot;
pub mod ledger;
pub mod registry;
pub mod room;
