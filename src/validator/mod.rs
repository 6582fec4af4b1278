// Quorum validation of caller-supplied promo codes

pub mod quorum;

pub use quorum::{check_code_format, QuorumValidator, MAX_CODE_LEN, MIN_CODE_LEN, QUORUM};
