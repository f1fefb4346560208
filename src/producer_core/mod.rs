pub mod generator;
pub mod publisher;

mod lib;

pub use generator::TradeGenerator;
pub use lib::{emit_loop, run, EmitSummary};
pub use publisher::{DeliveryReport, PublishError, Publisher};
