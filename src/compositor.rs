// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::time::Instant;

use log::{debug, info};

use crate::catalog::RoundId;
use crate::error::{RegistrationError, Result};
use crate::image_funcs::{check_shape, max_merge_into, shift_plane, Plane};
use crate::translation::{Translation, TranslationTable};

/// Planes chosen for a composite, grouped by the round they came from.
/// Rounds keep the order in which they were first added.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    rounds: Vec<(RoundId, Vec<Plane>)>,
}

impl Selection {
    pub fn new() -> Selection {
        Selection::default()
    }

    pub fn add(&mut self, round: RoundId, plane: Plane) {
        match self.rounds.iter_mut().find(|(r, _)| *r == round) {
            Some((_, planes)) => planes.push(plane),
            None => self.rounds.push((round, vec![plane])),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoundId, &[Plane])> {
        self.rounds.iter().map(|(round, planes)| (round, planes.as_slice()))
    }

    /// Total number of planes across all rounds.
    pub fn plane_count(&self) -> usize {
        self.rounds.iter().map(|(_, planes)| planes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.plane_count() == 0
    }
}

impl FromIterator<(RoundId, Plane)> for Selection {
    fn from_iter<I: IntoIterator<Item = (RoundId, Plane)>>(iter: I) -> Self {
        let mut selection = Selection::new();
        for (round, plane) in iter {
            selection.add(round, plane);
        }
        selection
    }
}

/// Emitted whenever [compose()] shifts a plane of a non-reference round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShiftEvent<'a> {
    pub round: &'a RoundId,
    pub translation: Translation,
}

/// Receives [ShiftEvent]s for traceability. Observers must not fail; `()` is
/// the do-nothing observer.
pub trait ShiftObserver {
    fn on_shift(&self, event: &ShiftEvent<'_>);
}

impl ShiftObserver for () {
    fn on_shift(&self, _event: &ShiftEvent<'_>) {}
}

/// Reports shifts through the `log` facade.
pub struct LogShiftObserver;

impl ShiftObserver for LogShiftObserver {
    fn on_shift(&self, event: &ShiftEvent<'_>) {
        info!("Shifting round {} by {}", event.round, event.translation);
    }
}

/// Aligns and merges the planes of `selection` into one composite plane.
/// Planes of `reference_round` are used as is; planes of any other round are
/// shifted by that round's entry in `translations`. The aligned planes are
/// combined by element-wise maximum.
///
/// Neither `selection` nor the planes it holds are modified.
///
/// # Errors
/// `NoSelection` if `selection` holds no planes. `NoTranslation` if a
/// non-reference round of `selection` has no entry in `translations`.
/// `ShapeMismatch` if the selected planes differ in size.
pub fn compose(selection: &Selection, translations: &TranslationTable,
               reference_round: &RoundId, observer: &dyn ShiftObserver)
               -> Result<Plane> {
    let compose_start = Instant::now();
    let mut composite: Option<Plane> = None;
    for (round, planes) in selection.iter() {
        let translation = if round == reference_round {
            None
        } else {
            Some(translations.get(round).ok_or_else(
                || RegistrationError::NoTranslation(round.to_string()))?)
        };
        for (index, plane) in planes.iter().enumerate() {
            if let Some(accum) = &composite {
                check_shape(plane, accum.dimensions(),
                            &format!("selection round {} plane {}", round, index))?;
            }
            let aligned = match translation {
                None => plane.clone(),
                Some(translation) => {
                    observer.on_shift(&ShiftEvent { round, translation });
                    shift_plane(plane, translation.rows as f64,
                                translation.cols as f64)
                },
            };
            if let Some(accum) = composite.as_mut() {
                max_merge_into(accum, &aligned);
            } else {
                composite = Some(aligned);
            }
        }
    }
    let composite = composite.ok_or(RegistrationError::NoSelection)?;
    debug!("Composed {} planes in {:?}",
           selection.plane_count(), compose_start.elapsed());
    Ok(composite)
}

// mod tests.
