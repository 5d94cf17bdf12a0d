//! Dossier Domain Types
//!
//! A *dossier comptable* is an expenditure case file that travels through
//! four roles before it is paid: the Secretary who authors it, the Budget
//! Controller (CB), the Ordering Officer (Ordonnateur) and the Accountant
//! (AC). Each reviewing role must complete its own checklist before the
//! dossier may advance.
//!
//! # Key Concepts
//!
//! - **Dossier**: the unit of work, carrying a [`DossierStatus`] that only
//!   moves forward, except for the rejected → resubmitted edge.
//! - **ValidationCategory**: reference data describing the checklist items a
//!   role must tick during a [`Phase`].
//! - **ValidationRecord**: one immutable entry of the validation ledger.
//!   Re-validating an item appends, it never overwrites.
//! - **ValidationStatus**: the derived completeness/validity summary that
//!   gates transitions.
//! - **ReconciliationReport**: the cross-role audit the Accountant inspects
//!   before settlement.
//! - **DossierEvent**: append-only audit of every committed transition.

#![deny(unsafe_code)]

mod catalog;
mod dossier;
mod errors;
mod event;
mod ids;
mod reconciliation;
mod role;
mod validation;

pub use catalog::*;
pub use dossier::*;
pub use errors::*;
pub use event::*;
pub use ids::*;
pub use reconciliation::*;
pub use role::*;
pub use validation::*;
