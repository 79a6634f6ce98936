//! Entry point for **wmsel-switch**, the desktop/window switcher.
//!
//! Queries the window manager, opens the picker in a freshly spawned
//! terminal emulator (or the current terminal with `--here`), and applies
//! the outcome only after the scratch terminal is gone again.

use std::path::{Path, PathBuf};

use log::{debug, error, warn};
use wmsel::config::Config;
use wmsel::model::DeskCursor;
use wmsel::screen::{Screen, ScreenError};
use wmsel::session::{settle_outcome, SessionError, TermSession};
use wmsel::traits::{Selector, WindowSystem};
use wmsel::ui;
use wmsel::ui::switch::{apply_outcome, SwitchUi};
use wmsel::x11::wm::{X11Error, X11Ws};

const USAGE: &str = "\
usage: wmsel-switch [--here] [--config <path>]

  --here           render in the current terminal instead of spawning one
  --config <path>  read configuration from <path>
";

struct Args {
    here: bool,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        here: false,
        config: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--here" => args.here = true,
            "--config" => match iter.next() {
                Some(path) => args.config = Some(PathBuf::from(path)),
                None => return Err("--config needs a path".into()),
            },
            "--help" | "-h" => {
                print!("{USAGE}");
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(args)
}

/// An explicitly named config file must load; the default location is
/// allowed to be broken and only costs a warning.
fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(err) => {
                error!("{}", err);
                std::process::exit(1);
            }
        },
        None => match Config::load_or_default() {
            Ok(config) => config,
            Err(err) => {
                warn!("{}, using defaults", err);
                Config::default()
            }
        },
    }
}

#[derive(Debug, thiserror::Error)]
enum SwitchError {
    #[error(transparent)]
    X11(#[from] X11Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Screen(#[from] ScreenError),
}

fn run(config: &Config, here: bool) -> Result<(), SwitchError> {
    let wm = X11Ws::open()?;
    let cursor = DeskCursor::new(wm.desktops()?);
    let mut selector = SwitchUi::new(cursor);
    let (cols, rows) = selector.viewport();

    let outcome = if here {
        let mut screen = Screen::attach(false)?;
        ui::run(&mut screen, &mut selector)?
    } else {
        let mut session = TermSession::open(
            &config.emulator,
            &config.session,
            "wmsel-switch",
            cols,
            rows,
            false,
        )?;
        let result = ui::run(session.screen_mut(), &mut selector);
        // Tear the terminal down before touching the window manager, so
        // focus does not end up on a half-dead scratch window.
        let (outcome, exit) = settle_outcome(result, session.close())?;
        if let Some(err) = exit {
            warn!("emulator exited badly after the selection: {err}");
        }
        outcome
    };

    debug!("selector finished: {:?}", outcome);
    apply_outcome(&wm, outcome)?;
    Ok(())
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            eprint!("{USAGE}");
            std::process::exit(2);
        }
    };
    let config = load_config(args.config.as_deref());

    if let Err(err) = run(&config, args.here) {
        error!("{}", err);
        std::process::exit(1);
    }
}
