//! RoundRegister aligns and merges multi-round, multi-channel fluorescence
//! microscopy images. Each round is an imaging session of the same sample;
//! because the stage or sample moves a little between sessions, rounds are
//! not pixel-aligned with each other. Given the raw planes of each
//! round/channel, RoundRegister:
//!
//! * Reduces each round/channel's raw planes to one plane by max-intensity
//!   projection ([image_funcs::max_intensity_projection()]).
//! * Estimates the integer translation that aligns every round to a chosen
//!   reference round, by FFT cross-correlation of a shared reference channel
//!   ([translation::register()]).
//! * Composes any selection of round/channel planes into one aligned image
//!   by shifting and max-merging them ([compositor::compose()]).
//!
//! # Alignment
//!
//! All rounds align directly to one fixed reference round. For each other
//! round, the reference-channel planes are mean-centered and cross-correlated;
//! the location of the correlation maximum, relative to the center of the
//! same-size correlation surface, is the round's translation. Translations are
//! whole pixels; no rotation, scaling or non-rigid correction is attempted.
//!
//! Ties in the correlation surface go to the first maximum in row-major
//! order. A uniform reference-channel plane therefore does not fail: it
//! yields the translation `(-(height / 2), -(width / 2))`, a degraded but
//! deterministic alignment.
//!
//! # Memory
//!
//! A cataloged reference channel is aligned straight from the catalog, with no
//! second copy. A reference channel outside the roster is projected separately
//! and held only while the translation table is being computed
//! ([catalog::ReferencePlanes] is consumed by
//! [translation::estimate_translations()]). The long-lived state is the
//! [catalog::RoundCatalog] and [translation::TranslationTable], both of which
//! are read-only once built.

pub mod catalog;
pub mod compositor;
pub mod correlation;
pub mod error;
pub mod image_funcs;
pub mod storage;
pub mod translation;
