//! Work Source adapters: a markdown plan file on disk, and an external
//! ticket-tracker CLI wrapped over subprocess calls.

mod plan_file;
mod ticket;

pub use plan_file::PlanFileSource;
pub use ticket::TicketCliSource;
