pub mod payment_confirmation;
pub mod account_restriction;
pub mod restriction_reason;

pub use payment_confirmation::Entity as PaymentConfirmation;
pub use account_restriction::Entity as AccountRestriction;
pub use restriction_reason::Entity as RestrictionReason;
