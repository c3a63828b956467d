//! Message model module declarations.

pub mod envelope;
pub mod value;

pub use envelope::{Envelope, Response, Status};
pub use value::{Arguments, Value};
