//! Every timestamp in this crate is a raw seconds-since-epoch integer, not a
//! `chrono::DateTime`: the feed carries POSIX seconds and the builder only
//! ever compares and subtracts them, never renders them for a human.

pub type EpochSeconds = i64;
