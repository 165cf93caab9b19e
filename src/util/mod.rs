//! Canonical home for the small cross-cutting helpers the original library
//! scattered across several `logic_utils.py` revisions (see DESIGN NOTES §9):
//! type coercion, DMV row assembly, TMSL-ish command synthesis and M-expression
//! generation each get one module instead of copy-pasted duplicates.

pub mod dmv;
pub mod mexpr;
pub mod tmsl;
