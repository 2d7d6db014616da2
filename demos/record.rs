#[cfg(windows)]
mod app {
    use std::io::{self, Write};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    use clap::Parser;
    use gdi_capture::capture::{CaptureSession, Error};
    use gdi_capture::gdi::Gdi;
    use gdi_capture::settings::{CaptureSettings, RasterMode};
    use gdi_capture::window::Window;

    #[derive(Parser)]
    #[command(name = "Screen Recorder")]
    #[command(version = "1.0")]
    #[command(about = "Captures the display or a window repeatedly")]
    struct Cli {
        /// Exact title of the window to capture, the whole display when omitted
        #[arg(long)]
        window_name: Option<String>,

        /// List visible windows and exit
        #[arg(long)]
        list: bool,

        /// Include layered windows in the capture
        #[arg(long)]
        layered: bool,

        /// Convert frames on the rayon thread pool
        #[arg(long)]
        parallel: bool,

        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,
    }

    fn open(cli: &Cli, settings: CaptureSettings) -> Result<CaptureSession<Gdi>, Error> {
        match &cli.window_name {
            Some(title) => CaptureSession::for_window_with(Gdi, title, settings),
            None => CaptureSession::with_settings(Gdi, settings),
        }
    }

    pub fn main() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::parse();

        if cli.list {
            for window in Window::enumerate() {
                println!("{:>#18x}  {}", window.handle().as_raw(), window.title());
            }
            return Ok(());
        }

        let stop_flag = Arc::new(AtomicBool::new(false));

        // Set up Ctrl+C handler
        {
            let stop_flag = stop_flag.clone();
            ctrlc::set_handler(move || {
                stop_flag.store(true, Ordering::SeqCst);
            })?;
        }

        let raster_mode = if cli.layered { RasterMode::CopyWithLayered } else { RasterMode::Copy };
        let settings = CaptureSettings::new(raster_mode, cli.parallel);
        let mut session = open(&cli, settings)?;
        println!("Capturing {}x{}, press Ctrl+C to stop.", session.width(), session.height());

        let start = Instant::now();
        let mut last_reset = Instant::now();
        let mut frame_count_since_reset = 0u64;
        let mut total = 0u64;

        while !stop_flag.load(Ordering::SeqCst) && cli.frames.is_none_or(|frames| total < frames) {
            match session.capture().map(|_| ()) {
                Ok(()) => {}
                Err(Error::TargetResized { actual, .. }) => {
                    println!("\nTarget resized to {}x{}, recreating session.", actual.0, actual.1);
                    session.destroy();
                    session = open(&cli, settings)?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            total += 1;
            frame_count_since_reset += 1;

            let elapsed_since_reset = last_reset.elapsed();
            let fps = frame_count_since_reset as f64 / elapsed_since_reset.as_secs_f64();
            print!("\rRecording for: {:.2} seconds | FPS: {:.2}", start.elapsed().as_secs_f64(), fps);
            io::stdout().flush()?;

            if elapsed_since_reset >= Duration::from_secs(1) {
                frame_count_since_reset = 0;
                last_reset = Instant::now();
            }
        }

        session.destroy();
        println!("\nCaptured {total} frames.");

        Ok(())
    }
}

#[cfg(windows)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    app::main()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("This demo captures through GDI and only runs on Windows.");
}
