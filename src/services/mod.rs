// Services module - Business logic

pub mod code_generator;
pub mod pass_issuer;
pub mod pass_validator;
pub mod qr_generator;
