//! scanloop - capture stills on a timer and show what the recognition service sees
//!
//! Commands on stdin:
//! - Enter or `t`: start/stop capture (ignored while the camera is not ready)
//! - `r`: re-initialize the camera; capture resumes if it was running
//! - `q`: quit (also Ctrl-C)

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal, Write};
use std::sync::{mpsc, Arc};

use scanloop::config::ClientConfig;
use scanloop::ui::Ui;
use scanloop::{
    camera_from_url, render_view, ActiveFlag, CaptureEvents, CaptureLoop, Coordinator,
    HttpRecognizer, Recognizer, Scheduler, ThreadScheduler,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Periodic camera capture with remote object recognition")]
struct Args {
    /// Recognition endpoint (overrides config file and SCANLOOP_ENDPOINT).
    #[arg(long)]
    endpoint: Option<String>,

    /// Camera source: stub://name, a still/directory path, file://path, or an http(s) snapshot URL.
    #[arg(long)]
    camera: Option<String>,

    /// Milliseconds between captures.
    #[arg(long)]
    period_ms: Option<u64>,

    /// Start capturing as soon as the camera is ready.
    #[arg(long)]
    auto_start: bool,

    /// UI mode (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

enum Command {
    Toggle,
    Reopen,
    Quit,
}

/// Everything needed to build a capture session except the camera.
struct SessionParts {
    flag: ActiveFlag,
    recognizer: Arc<dyn Recognizer>,
    events: Arc<dyn CaptureEvents>,
    scheduler: Arc<dyn Scheduler>,
    cfg: ClientConfig,
}

impl SessionParts {
    fn build(&self, camera: Box<dyn scanloop::Camera>) -> CaptureLoop {
        CaptureLoop::new(
            self.flag.clone(),
            camera,
            self.recognizer.clone(),
            self.events.clone(),
            self.scheduler.clone(),
            self.cfg.period,
        )
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::from_args(
        Some(&args.ui),
        std::io::stderr().is_terminal(),
        !std::io::stdout().is_terminal(),
    );
    let style = ui.render_style();

    let mut cfg = ClientConfig::load()?;
    if let Some(endpoint) = args.endpoint {
        cfg.endpoint = endpoint;
    }
    if let Some(camera) = args.camera {
        cfg.camera = camera;
    }
    if let Some(period_ms) = args.period_ms {
        cfg.period = std::time::Duration::from_millis(period_ms);
    }
    cfg.validate()?;
    log::info!(
        "camera={} endpoint={} period={}ms",
        cfg.camera,
        cfg.endpoint,
        cfg.period.as_millis()
    );

    let flag = ActiveFlag::new(false);
    let coordinator = Coordinator::new(flag.clone()).with_listener(move |view| {
        let mut out = std::io::stdout().lock();
        if let Err(err) = out
            .write_all(render_view(view, style).as_bytes())
            .and_then(|()| out.flush())
        {
            log::debug!("failed to write results to stdout: {}", err);
        }
    });
    let parts = SessionParts {
        flag,
        recognizer: Arc::new(HttpRecognizer::new(&cfg.endpoint, cfg.request_timeout)?),
        events: Arc::new(coordinator),
        scheduler: Arc::new(ThreadScheduler::new()),
        cfg: cfg.clone(),
    };

    let mut session = parts.build(camera_from_url(&cfg.camera, cfg.jpeg_quality)?);
    open_camera(&ui, &mut session);
    if args.auto_start {
        session.toggle();
    }

    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Command::Quit);
    })
    .context("install Ctrl-C handler")?;
    std::thread::spawn(move || read_commands(tx));

    eprintln!("Enter/t = start/stop, r = reopen camera, q = quit");
    while let Ok(command) = rx.recv() {
        match command {
            Command::Toggle => session.toggle(),
            Command::Reopen => {
                let camera = match session.teardown() {
                    Some(camera) => camera,
                    None => camera_from_url(&cfg.camera, cfg.jpeg_quality)?,
                };
                session = parts.build(camera);
                open_camera(&ui, &mut session);
            }
            Command::Quit => break,
        }
    }

    session.stop();
    log::info!("scanloop exiting");
    Ok(())
}

fn open_camera(ui: &Ui, session: &mut CaptureLoop) {
    let stage = ui.stage("Open camera");
    if session.open_camera().is_err() {
        stage.fail();
    }
}

fn read_commands(tx: mpsc::Sender<Command>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let command = match line.trim() {
            "" | "t" => Command::Toggle,
            "r" => Command::Reopen,
            "q" => Command::Quit,
            other => {
                eprintln!("unknown command '{}'; use Enter/t, r or q", other);
                continue;
            }
        };
        if tx.send(command).is_err() {
            return;
        }
    }
    let _ = tx.send(Command::Quit);
}
