pub mod deadline_evaluator;
pub mod confirmation_service;

pub use deadline_evaluator::{ DeadlineEvaluator, ScanReport };
pub use confirmation_service::{ NewPaymentConfirmation, PaymentConfirmationService };
