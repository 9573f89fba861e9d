// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

//! File-backed collaborators: raw planes are read from one subdirectory per
//! round, and planes are written as 16-bit grayscale TIFFs.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, ImageReader, Luma};
use imageproc::map::map_colors;
use log::{debug, info, warn};

use crate::catalog::{ChannelId, PlaneSource, RoundId};
use crate::error::{RegistrationError, Result};
use crate::image_funcs::Plane;

/// Lists the round subdirectories of `root`, sorted by name.
pub fn list_rounds(root: &Path) -> Result<Vec<RoundId>> {
    let mut rounds = Vec::<RoundId>::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            rounds.push(RoundId(entry.file_name().to_string_lossy().into_owned()));
        }
    }
    rounds.sort();
    Ok(rounds)
}

/// Reads an image file as a plane. Integer samples are normalized to [0, 1]
/// and color images are converted to luminance.
pub fn load_plane(path: &Path) -> Result<Plane> {
    let image = ImageReader::open(path)?.decode()?;
    Ok(image.to_luma32f())
}

/// Writes `plane` to `<dir>/<name>.tiff` as 16-bit grayscale, clamping values
/// to [0, 1]. Returns the path written.
///
/// # Errors
/// `NoSelection` if `plane` is `None`, mirroring [crate::compositor::compose()]
/// so that the two can be chained.
pub fn save_plane(plane: Option<&Plane>, dir: &Path, name: &str) -> Result<PathBuf> {
    let plane = plane.ok_or(RegistrationError::NoSelection)?;
    let path = dir.join(format!("{}.tiff", name));
    let clamped = out_of_range_count(plane);
    if clamped > 0 {
        warn!("Clamping {} of {} pixels to [0, 1] when saving {:?}",
              clamped, plane.as_raw().len(), path);
    }
    let image: ImageBuffer<Luma<u16>, Vec<u16>> =
        map_colors(plane, |p: Luma<f32>| -> Luma<u16> {
            Luma([(p.0[0].clamp(0.0, 1.0) * u16::MAX as f32).round() as u16])
        });
    image.save(&path)?;
    info!("Saved {:?}", path);
    Ok(path)
}

// Pixels that do not survive the [0, 1] clamp unchanged.
fn out_of_range_count(plane: &Plane) -> usize {
    plane.as_raw().iter().filter(|v| !(0.0..=1.0).contains(*v)).count()
}

/// Supplies raw planes from `<root>/<round>/`: every file whose name contains
/// the channel name, in filename order.
pub struct DirectoryPlaneSource {
    root: PathBuf,
}

impl DirectoryPlaneSource {
    pub fn new(root: impl Into<PathBuf>) -> DirectoryPlaneSource {
        DirectoryPlaneSource { root: root.into() }
    }
}

impl PlaneSource for DirectoryPlaneSource {
    fn planes(&self, round: &RoundId, channel: &ChannelId) -> Result<Vec<Plane>> {
        let round_dir = self.root.join(&round.0);
        let mut paths = Vec::<PathBuf>::new();
        for entry in fs::read_dir(&round_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().contains(channel.0.as_str()) {
                paths.push(entry.path());
            }
        }
        paths.sort();
        debug!("Round {} channel {}: {:?}", round, channel, paths);
        paths.iter().map(|path| load_plane(path)).collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;
    use super::*;
    use crate::catalog::ChannelRoster;
    use crate::compositor::compose;
    use crate::translation::{register, Translation};

    fn write_u16(path: &Path, width: u32, height: u32, value: u16) {
        let image: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_pixel(width, height, Luma([value]));
        image.save(path).unwrap();
    }

    #[test]
    fn test_list_rounds_sorted_dirs_only() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["round_2", "round_1", "round_10"] {
            fs::create_dir(temp_dir.path().join(name)).unwrap();
        }
        fs::write(temp_dir.path().join("notes.txt"), "not a round").unwrap();
        let rounds = list_rounds(temp_dir.path()).unwrap();
        assert_eq!(rounds, vec![RoundId::from("round_1"), RoundId::from("round_10"),
                                RoundId::from("round_2")]);
    }

    #[test]
    fn test_directory_source_matches_channel_substring() {
        let temp_dir = TempDir::new().unwrap();
        let round_dir = temp_dir.path().join("R0");
        fs::create_dir(&round_dir).unwrap();
        write_u16(&round_dir.join("A01_Alexa 488_z1.tiff"), 4, 3, 0);
        write_u16(&round_dir.join("A01_Alexa 488_z2.tiff"), 4, 3, u16::MAX);
        write_u16(&round_dir.join("A01_HOECHST 33342_z1.tiff"), 4, 3, 100);

        let source = DirectoryPlaneSource::new(temp_dir.path());
        let alexa = source.planes(&RoundId::from("R0"), &ChannelId::from("Alexa 488"))
            .unwrap();
        assert_eq!(alexa.len(), 2);
        assert_eq!(alexa[0].dimensions(), (4, 3));
        assert_abs_diff_eq!(alexa[0].get_pixel(0, 0).0[0], 0.0);
        assert_abs_diff_eq!(alexa[1].get_pixel(0, 0).0[0], 1.0);

        let missing = source.planes(&RoundId::from("R0"), &ChannelId::from("Alexa 647"))
            .unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_save_nothing() {
        let temp_dir = TempDir::new().unwrap();
        match save_plane(None, temp_dir.path(), "composite") {
            Err(RegistrationError::NoSelection) => (),
            other => panic!("Expected no selection, got {:?}", other),
        }
        assert!(!temp_dir.path().join("composite.tiff").exists());
    }

    #[test]
    fn test_save_clamps_and_reloads() {
        let temp_dir = TempDir::new().unwrap();
        let plane = Plane::from_fn(3, 2, |x, y| {
            Luma([match (x, y) {
                (0, 0) => -0.5,
                (1, 0) => 2.0,
                _ => 0.5,
            }])
        });
        assert_eq!(out_of_range_count(&plane), 2);
        let path = save_plane(Some(&plane), temp_dir.path(), "composite").unwrap();
        assert_eq!(path, temp_dir.path().join("composite.tiff"));
        let reloaded = load_plane(&path).unwrap();
        assert_eq!(reloaded.dimensions(), (3, 2));
        assert_abs_diff_eq!(reloaded.get_pixel(0, 0).0[0], 0.0);
        assert_abs_diff_eq!(reloaded.get_pixel(1, 0).0[0], 1.0);
        assert_abs_diff_eq!(reloaded.get_pixel(2, 1).0[0], 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_out_of_range_count() {
        let plane = Plane::from_vec(5, 1, vec![0.0, 1.0, 0.5, f32::NAN, 1.0001])
            .unwrap();
        assert_eq!(out_of_range_count(&plane), 2);
        assert_eq!(out_of_range_count(&Plane::new(3, 3)), 0);
    }

    // A bright square at (x, y) on a dim background.
    fn write_spot(path: &Path, x: u32, y: u32) {
        let image: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(24, 24, |px, py| {
                let inside = px >= x && px < x + 3 && py >= y && py < y + 3;
                Luma([if inside { 60000 } else { 1000 }])
            });
        image.save(path).unwrap();
    }

    #[test]
    fn test_register_and_compose_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        for round in ["round_a", "round_b"] {
            fs::create_dir(temp_dir.path().join(round)).unwrap();
        }
        // Nuclei stain seen 4 columns further right and 2 rows lower in
        // round_b than in round_a.
        write_spot(&temp_dir.path().join("round_a/HOECHST_1.tiff"), 8, 8);
        write_spot(&temp_dir.path().join("round_b/HOECHST_1.tiff"), 12, 10);
        write_spot(&temp_dir.path().join("round_b/Alexa 488_1.tiff"), 16, 16);

        let rounds = list_rounds(temp_dir.path()).unwrap();
        let roster = ChannelRoster {
            channels: vec![ChannelId::from("HOECHST"), ChannelId::from("Alexa 488")],
            reference: ChannelId::from("HOECHST"),
        };
        let source = DirectoryPlaneSource::new(temp_dir.path());
        let registration =
            register(&rounds, &rounds[0], &roster, &source).unwrap();
        assert_eq!(registration.translations.get(&RoundId::from("round_b")),
                   Some(Translation { rows: -2, cols: -4 }));
        assert!(registration.catalog.plane(&RoundId::from("round_a"),
                                           &ChannelId::from("Alexa 488")).is_none());

        let selection = registration.catalog.select(&[
            (RoundId::from("round_a"), ChannelId::from("HOECHST")),
            (RoundId::from("round_b"), ChannelId::from("Alexa 488")),
        ]);
        let composite = compose(&selection, &registration.translations,
                                &rounds[0], &()).unwrap();
        let bright = 60000.0 / u16::MAX as f32;
        // round_a's nuclei stay put; round_b's marker moves up-left by (2, 4).
        assert_abs_diff_eq!(composite.get_pixel(9, 9).0[0], bright);
        assert_abs_diff_eq!(composite.get_pixel(13, 15).0[0], bright);
        assert!(composite.get_pixel(17, 17).0[0] < bright);

        let path = save_plane(Some(&composite), temp_dir.path(), "overlay").unwrap();
        assert!(path.exists());
    }
}  // mod tests.
