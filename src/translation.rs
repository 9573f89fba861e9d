// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::fmt;
use std::time::Instant;

use log::{debug, info};

use crate::catalog::{build_catalog, ChannelRoster, PlaneSource, ReferencePlanes,
                     RoundCatalog, RoundId};
use crate::correlation::CrossCorrelator;
use crate::error::{RegistrationError, Result};

/// Integer pixel displacement of a round relative to the reference round.
/// `rows` is along the image height (y), `cols` along the width (x). Shifting
/// the round's planes by this amount aligns them with the reference round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Translation {
    pub rows: i32,
    pub cols: i32,
}

impl Translation {
    pub const ZERO: Translation = Translation { rows: 0, cols: 0 };

    pub fn is_zero(&self) -> bool {
        *self == Translation::ZERO
    }
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.rows, self.cols)
    }
}

/// One translation per cataloged round, computed once. The reference round's
/// entry is always [Translation::ZERO].
#[derive(Clone, Debug)]
pub struct TranslationTable {
    reference_round: RoundId,
    entries: Vec<(RoundId, Translation)>,
}

impl TranslationTable {
    /// Builds a table from previously computed translations. The reference
    /// round is pinned to [Translation::ZERO]; any entry given for it, and
    /// any repeated round, is ignored.
    pub fn from_entries(reference_round: RoundId,
                        others: impl IntoIterator<Item = (RoundId, Translation)>)
                        -> TranslationTable {
        let mut entries = vec![(reference_round.clone(), Translation::ZERO)];
        for (round, translation) in others {
            if entries.iter().any(|(r, _)| *r == round) {
                continue;
            }
            entries.push((round, translation));
        }
        TranslationTable { reference_round, entries }
    }

    pub fn reference_round(&self) -> &RoundId {
        &self.reference_round
    }

    pub fn get(&self, round: &RoundId) -> Option<Translation> {
        self.entries.iter()
            .find(|(r, _)| r == round)
            .map(|(_, translation)| *translation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoundId, Translation)> {
        self.entries.iter().map(|(round, translation)| (round, *translation))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Estimates the translation of every round in `catalog` relative to
/// `reference_round`, by FFT cross-correlation of reference-channel planes.
/// Reference-channel planes come from `catalog` when the channel is
/// cataloged, otherwise from `reference_planes`, which is consumed; its planes
/// are released on return.
///
/// For each non-reference round, both planes are mean-centered, correlated,
/// and the correlation peak (first maximum in row-major order) is converted
/// to a displacement by subtracting `(height / 2, width / 2)`. A uniform
/// plane yields a flat surface, so its peak is the surface origin and its
/// translation is `(-(height / 2), -(width / 2))`. This is accepted as a
/// degraded alignment rather than treated as an error.
///
/// # Errors
/// `MissingReferencePlane` if a round that must be aligned, or the reference
/// round itself, lacks a reference-channel plane. `ShapeMismatch` if
/// reference-channel planes differ in size.
pub fn estimate_translations(reference_planes: ReferencePlanes,
                             reference_round: &RoundId,
                             catalog: &RoundCatalog) -> Result<TranslationTable> {
    let estimate_start = Instant::now();
    let ReferencePlanes { channel, planes } = reference_planes;
    let missing = |round: &RoundId| RegistrationError::MissingReferencePlane {
        round: round.to_string(), channel: channel.to_string() };
    let plane_of = |round: &RoundId| planes.iter()
        .find(|(r, _)| r == round)
        .map(|(_, plane)| plane)
        .or_else(|| catalog.plane(round, &channel));

    let mut entries = vec![(reference_round.clone(), Translation::ZERO)];
    let others: Vec<&RoundId> =
        catalog.rounds().filter(|&r| r != reference_round).collect();
    if !others.is_empty() {
        let reference = plane_of(reference_round)
            .ok_or_else(|| missing(reference_round))?;
        let correlator = CrossCorrelator::new(reference);
        for round in others {
            let plane = plane_of(round).ok_or_else(|| missing(round))?;
            let surface = correlator.correlate(plane)
                .map_err(|e| e.within(&format!("round {} channel {}", round, channel)))?;
            let peak = surface.peak();
            let (rows, cols) = surface.displacement_at(peak);
            let translation = Translation { rows, cols };
            debug!("Round {} correlation peak at {:?}", round, peak);
            info!("Round {} translation {}", round, translation);
            entries.push((round.clone(), translation));
        }
    }
    info!("Estimated {} translation(s) in {:?}",
          entries.len(), estimate_start.elapsed());
    Ok(TranslationTable { reference_round: reference_round.clone(), entries })
}

/// Outcome of the one-time setup: the catalog plus its translation table.
/// The reference-channel planes used for alignment are not retained.
#[derive(Debug)]
pub struct Registration {
    pub catalog: RoundCatalog,
    pub translations: TranslationTable,
}

/// Builds the round catalog and aligns every round to `reference_round`.
///
/// # Errors
/// `UnknownReferenceRound` if `reference_round` is not one of `rounds`;
/// otherwise anything [build_catalog()] or [estimate_translations()] raises.
pub fn register(rounds: &[RoundId], reference_round: &RoundId,
                roster: &ChannelRoster, source: &impl PlaneSource)
                -> Result<Registration> {
    if !rounds.contains(reference_round) {
        return Err(RegistrationError::UnknownReferenceRound(
            reference_round.to_string()));
    }
    let (catalog, reference_planes) = build_catalog(rounds, roster, source)?;
    let translations =
        estimate_translations(reference_planes, reference_round, &catalog)?;
    Ok(Registration { catalog, translations })
}

// mod tests.
