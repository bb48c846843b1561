//! Replay dashboard form events against a demo fit
//!
//! Every input line is a JSON [FormEvent]; an empty object `{}` replays the current form.
//! Run with `RUST_LOG=debug` to see how each event is classified.

use clap::{Parser, ValueEnum};
use curve_fit_gui::{FitGuiSession, FormEvent, GuiConfig, MetaValues, export_json, logging};
use curve_fit_gui_test_util::{
    exp_sum_factory, exp_sum_meta_config, exp_sum_solver, poly_factory, poly_meta_config,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Demo {
    Poly,
    Exp,
}

#[derive(Parser)]
#[clap(name = "replay", about = "Replay JSON-lines form events against a demo fit")]
struct Opts {
    /// File with one JSON event per line, standard input is read if not given
    #[clap(short, long)]
    input: Option<PathBuf>,

    #[clap(value_enum, short, long, default_value = "poly")]
    demo: Demo,

    /// Initial number of polynomial coefficients or exponentials
    #[clap(short, long, default_value_t = 4)]
    size: i32,

    /// Print the fit as JSON after every accepted event
    #[clap(long)]
    export: bool,
}

fn session(demo: Demo, size: i32) -> Result<FitGuiSession, Box<dyn std::error::Error>> {
    let session = match demo {
        Demo::Poly => FitGuiSession::from_factory(
            poly_factory,
            poly_meta_config(),
            MetaValues::new().with("n_poly", size),
            GuiConfig::default().with_name("Polynomial fit"),
        )?,
        Demo::Exp => FitGuiSession::from_factory(
            exp_sum_factory,
            exp_sum_meta_config(),
            MetaValues::new().with("n_exp", size),
            GuiConfig::default()
                .with_name("Sum of exponentials")
                .with_solver(exp_sum_solver()),
        )?,
    };
    Ok(session)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init()?;
    let opts: Opts = Opts::parse();

    let reader: Box<dyn BufRead> = match &opts.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };

    let mut session = session(opts.demo, opts.size)?;
    println!("{}", session.current_fit().summary());

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut event: FormEvent = serde_json::from_str(&line)?;
        if event == FormEvent::default() {
            event = session.layout().echo_event();
        }
        let response = session.handle_event(&event);
        match (response.change, &response.error) {
            (Some(change), _) => {
                println!("#{i}: {change}");
                println!("{}", response.layout.content.summary);
                if opts.export {
                    println!("{}", export_json(&response.fit)?);
                }
            }
            (None, Some(error)) => println!("#{i}: rejected, {error}"),
            (None, None) => {}
        }
    }

    let counts = session.counts();
    println!(
        "{} refits, {} regenerations",
        counts.refits, counts.regenerations
    );
    Ok(())
}
