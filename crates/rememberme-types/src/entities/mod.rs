pub mod credential;
pub mod issued_token;
pub mod outcome;
pub mod removal;

pub use credential::{COMPOSITE_SEPARATOR, Credential, TokenPair, validate_user_id, validate_value};
pub use issued_token::IssuedToken;
pub use outcome::{Authentication, ValidationOutcome};
pub use removal::RemovalInstructions;
