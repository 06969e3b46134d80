//! Patient-level post-processing: splitting multi-event documents into
//! separate rows and merging a patient's documents into one timeline.

pub mod row_duplicator;
pub mod temporal_aggregator;
