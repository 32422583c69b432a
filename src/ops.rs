mod analytics;
mod error;
mod protocol;
mod tools;
pub mod validate;

pub use protocol::serve;
pub use tools::Toolbox;
pub(crate) use tools::submission_json;
