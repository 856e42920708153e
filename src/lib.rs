//! Field validation and machine license gate for the ticketdesk helpdesk.

pub mod cli;
pub mod clock;
pub mod config;
pub mod license;
pub mod logging;
pub mod validation;
