//! Email and phone verification for LeadCascade.
//!
//! Both verifiers are independent of providers and of each other. Neither
//! returns an error: infrastructure trouble lowers the score and is recorded
//! in the `reason` field.

pub mod dns;
pub mod email;
pub mod error;
pub mod lists;
pub mod phone;
pub mod smtp;

pub use dns::{DnsResolver, HickoryDns};
pub use email::{EmailVerifier, parse_address};
pub use error::VerificationInfraError;
pub use lists::DomainLists;
pub use phone::PhoneVerifier;
pub use smtp::{RcptReply, SmtpProber, TcpSmtpProber};
