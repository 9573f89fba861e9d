// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use env_logger;
use log::{info, warn};

use round_register::catalog::{ChannelId, ChannelRoster, RoundId};
use round_register::compositor::{compose, LogShiftObserver};
use round_register::error::RegistrationError;
use round_register::storage::{list_rounds, save_plane, DirectoryPlaneSource};
use round_register::translation::register;

/// Aligns the imaging rounds found under a data directory and writes a
/// composite of the selected round/channel planes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about=None)]
struct Args {
    /// Data directory holding one subdirectory per round.
    #[arg(short, long)]
    input: PathBuf,

    /// Directory where output TIFF file(s) are written.
    #[arg(short, long)]
    output: PathBuf,

    /// Channel names; a raw file belongs to a channel if its name contains
    /// the channel name.
    #[arg(short, long, num_args = 1..,
          default_values_t = vec!["Alexa 488".to_string(), "Alexa 647".to_string(),
                                  "HOECHST 33342".to_string()])]
    channels: Vec<String>,

    /// Channel used to align the rounds.
    #[arg(long, default_value = "HOECHST 33342")]
    reference_channel: String,

    /// Round that the others are aligned to. Defaults to the first round in
    /// name order.
    #[arg(long)]
    reference_round: Option<String>,

    /// Planes to compose, each given as <round>:<channel>.
    #[arg(short, long, value_parser = parse_selection)]
    select: Vec<(String, String)>,

    /// File stem of the composite.
    #[arg(short, long, default_value = "composite")]
    name: String,

    /// Also save each round/channel projection as <channel>_<round index>.
    #[arg(long, default_value_t = false)]
    save_projections: std::primitive::bool,
}

fn parse_selection(arg: &str) -> Result<(String, String), String> {
    match arg.split_once(':') {
        Some((round, channel)) if !round.is_empty() && !channel.is_empty() =>
            Ok((round.to_string(), channel.to_string())),
        _ => Err(format!("expected <round>:<channel>, got '{}'", arg)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    fs::create_dir_all(&args.output)?;

    let setup_start = Instant::now();
    let rounds = list_rounds(&args.input)?;
    let reference_round = match &args.reference_round {
        Some(round) => RoundId(round.clone()),
        None => rounds.first().cloned().ok_or_else(|| {
            format!("No round directories under {:?}", args.input)
        })?,
    };
    let roster = ChannelRoster {
        channels: args.channels.iter().map(|c| ChannelId(c.clone())).collect(),
        reference: ChannelId(args.reference_channel.clone()),
    };
    info!("Rounds {:?}; reference round {}", rounds, reference_round);

    let source = DirectoryPlaneSource::new(&args.input);
    let registration = register(&rounds, &reference_round, &roster, &source)?;
    info!("Registration completed in {:?}", setup_start.elapsed());
    for (round, translation) in registration.translations.iter() {
        info!("{}: {}", round, translation);
    }

    if args.save_projections {
        for (index, round) in rounds.iter().enumerate() {
            let Some(entries) = registration.catalog.channels(round) else {
                continue;
            };
            for (channel, plane) in entries {
                save_plane(Some(plane), &args.output,
                           &format!("{}_{}", channel, index))?;
            }
        }
    }

    let pairs: Vec<(RoundId, ChannelId)> = args.select.iter()
        .map(|(round, channel)| (RoundId(round.clone()), ChannelId(channel.clone())))
        .collect();
    let selection = registration.catalog.select(&pairs);
    let composite = compose(&selection, &registration.translations,
                            &reference_round, &LogShiftObserver);
    match composite {
        Ok(plane) => {
            save_plane(Some(&plane), &args.output, &args.name)?;
        },
        Err(RegistrationError::NoSelection) => {
            warn!("No images selected; nothing to compose");
        },
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
