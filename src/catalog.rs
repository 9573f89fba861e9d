// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::fmt;
use std::time::Instant;

use log::{debug, info, warn};

use crate::compositor::Selection;
use crate::error::{Dims, RegistrationError, Result};
use crate::image_funcs::{check_shape, max_intensity_projection, Plane};

/// Names one imaging session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundId(pub String);

/// Names one fluorescence channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub String);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoundId {
    fn from(s: &str) -> Self { RoundId(s.to_string()) }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self { ChannelId(s.to_string()) }
}

/// The channels to catalog, in enumeration order, plus the channel used to
/// align rounds. The reference channel need not be among `channels`; it is
/// projected for alignment either way.
#[derive(Clone, Debug)]
pub struct ChannelRoster {
    pub channels: Vec<ChannelId>,
    pub reference: ChannelId,
}

/// Supplies the raw planes for a (round, channel). An empty result means the
/// channel was not imaged in that round.
pub trait PlaneSource {
    fn planes(&self, round: &RoundId, channel: &ChannelId) -> Result<Vec<Plane>>;
}

impl<F> PlaneSource for F
where F: Fn(&RoundId, &ChannelId) -> Result<Vec<Plane>>
{
    fn planes(&self, round: &RoundId, channel: &ChannelId) -> Result<Vec<Plane>> {
        self(round, channel)
    }
}

/// Per round, the projected plane of every channel that had source planes.
/// Rounds appear in the order they were supplied; rounds with no planes at
/// all are omitted.
#[derive(Debug, Default)]
pub struct RoundCatalog {
    rounds: Vec<(RoundId, Vec<(ChannelId, Plane)>)>,
}

impl RoundCatalog {
    pub fn rounds(&self) -> impl Iterator<Item = &RoundId> {
        self.rounds.iter().map(|(round, _)| round)
    }

    pub fn contains_round(&self, round: &RoundId) -> bool {
        self.channels(round).is_some()
    }

    /// The (channel, plane) entries of `round`, in roster order.
    pub fn channels(&self, round: &RoundId) -> Option<&[(ChannelId, Plane)]> {
        self.rounds.iter()
            .find(|(r, _)| r == round)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn plane(&self, round: &RoundId, channel: &ChannelId) -> Option<&Plane> {
        self.channels(round)?.iter()
            .find(|(c, _)| c == channel)
            .map(|(_, plane)| plane)
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Builds a [Selection] by copying the catalog planes for each
    /// (round, channel) pair. Pairs with no plane are skipped.
    pub fn select(&self, pairs: &[(RoundId, ChannelId)]) -> Selection {
        let mut selection = Selection::new();
        for (round, channel) in pairs {
            match self.plane(round, channel) {
                Some(plane) => selection.add(round.clone(), plane.clone()),
                None => warn!("Nothing to select for round {} channel {}",
                              round, channel),
            }
        }
        selection
    }
}

/// The projected reference-channel plane of each round, for a reference
/// channel that is not cataloged. When the reference channel is in the roster
/// its planes are read from the catalog instead and this holds nothing. Only
/// the translation estimator can look inside; it consumes this value,
/// releasing the planes once alignment is known.
#[derive(Debug)]
pub struct ReferencePlanes {
    pub(crate) channel: ChannelId,
    pub(crate) planes: Vec<(RoundId, Plane)>,
}

impl ReferencePlanes {
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}

/// Projects every (round, channel) of `rounds` x `roster` that has source
/// planes, returning the catalog and, separately, each round's projected
/// reference-channel plane if the reference channel is not in the roster.
///
/// # Errors
/// `DuplicateIdentifier` if a round or roster channel is named twice.
/// `ShapeMismatch` if any two planes of the run differ in size; `EmptyPlane`
/// if a projection has no pixels. Errors from `source` are passed through.
pub fn build_catalog(rounds: &[RoundId], roster: &ChannelRoster,
                     source: &impl PlaneSource)
                     -> Result<(RoundCatalog, ReferencePlanes)> {
    check_unique("round", rounds)?;
    check_unique("channel", &roster.channels)?;
    let catalog_start = Instant::now();
    let mut catalog = RoundCatalog::default();
    let mut reference_planes = ReferencePlanes {
        channel: roster.reference.clone(), planes: Vec::new() };
    let reference_cataloged = roster.channels.contains(&roster.reference);
    // Every plane in a run shares the size of the first one projected.
    let mut run_dims: Option<Dims> = None;

    for round in rounds {
        let mut entries = Vec::<(ChannelId, Plane)>::new();
        for channel in &roster.channels {
            let Some(plane) = project(round, channel, source, &mut run_dims)? else {
                debug!("Round {} has no {} planes", round, channel);
                continue;
            };
            entries.push((channel.clone(), plane));
        }
        if !reference_cataloged {
            if let Some(plane) =
                project(round, &roster.reference, source, &mut run_dims)? {
                reference_planes.planes.push((round.clone(), plane));
            }
        }
        if entries.is_empty() {
            warn!("Round {} has no planes in any channel", round);
            continue;
        }
        info!("Round {}: {} channel(s)", round, entries.len());
        catalog.rounds.push((round.clone(), entries));
    }
    info!("Built catalog of {} rounds in {:?}",
          catalog.rounds.len(), catalog_start.elapsed());
    Ok((catalog, reference_planes))
}

fn check_unique<T: PartialEq + fmt::Display>(kind: &'static str, ids: &[T])
                                             -> Result<()> {
    for (index, id) in ids.iter().enumerate() {
        if ids[..index].contains(id) {
            return Err(RegistrationError::DuplicateIdentifier {
                kind, name: id.to_string() });
        }
    }
    Ok(())
}

fn project(round: &RoundId, channel: &ChannelId, source: &impl PlaneSource,
           run_dims: &mut Option<Dims>) -> Result<Option<Plane>> {
    let context = format!("round {} channel {}", round, channel);
    let raw = source.planes(round, channel)?;
    let projection = max_intensity_projection(&raw)
        .map_err(|e| e.within(&context))?;
    if let Some(plane) = &projection {
        let (width, height) = plane.dimensions();
        if width == 0 || height == 0 {
            return Err(RegistrationError::EmptyPlane(context));
        }
        if let Some(dims) = *run_dims {
            check_shape(plane, dims, &context)?;
        } else {
            *run_dims = Some(plane.dimensions());
        }
    }
    Ok(projection)
}

// mod tests.
