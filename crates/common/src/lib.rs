pub mod error;
pub mod merchant;
pub mod verification;

pub use error::{Error, Result};
pub use merchant::Merchant;
pub use verification::{VerificationKind, VerificationRequest, VerificationStatus};
