mod dispute;
mod error;
mod negotiation;
mod offer;
mod party;

pub use dispute::{Dispute, DisputeStatus, DisputeType};
pub use error::DomainError;
pub use negotiation::{EventKind, Negotiation, NegotiationEvent, NegotiationState};
pub use offer::{CounterOffer, Offer, OfferStatus, PartyRole};
pub use party::{Document, Party};
