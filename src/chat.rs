mod hours;
mod messenger;
mod pipeline;
mod prompt;
mod reply;

pub use hours::WorkingHours;
pub use messenger::{EvolutionMessenger, Messenger, TwilioMessenger};
pub use pipeline::{Channel, InboundMessage, Outcome, Pipeline};

#[cfg(test)]
pub(crate) use pipeline::fakes;
