//! # Repository Layer
//!
//! One repository per aggregate. Read paths take the pool; every write
//! that is part of a larger unit of work is an associated `_tx` function
//! taking `&mut SqliteConnection`, so the coordinator can compose them
//! inside a single transaction.

pub mod commission;
pub mod discount;
pub mod folio;
pub mod inventory;
pub mod layaway;
pub mod sale;
pub mod variant;
