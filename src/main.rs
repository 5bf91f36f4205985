use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use log::info;

use chip8_vm::display::{Color, RenderPlugin, TermRender, WindowSize, CHIP8_TEST_CARD};
use chip8_vm::input::{InputPlugin, TermInput};
use chip8_vm::sound::{Mute, SimpleBeep, SoundPlugin};
use chip8_vm::timer::MAX_HZ;
use chip8_vm::{Emulator, EmulatorConfig, Machine, Processor, Step, WaitKey};

/// CHIP-8 timing core in the terminal
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// program to load at 0x200
    rom: Option<PathBuf>,

    /// instructions per second
    #[arg(long, default_value_t = 380, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_HZ)))]
    cpu_hz: u32,

    /// frames per second
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_HZ)))]
    fps: u32,

    /// buzzer pitch in Hz
    #[arg(long, default_value_t = 2093)]
    tone_hz: u16,

    /// foreground as r,g,b
    #[arg(long, value_parser = parse_color)]
    color: Option<Color>,

    /// background as r,g,b
    #[arg(long, value_parser = parse_color)]
    background: Option<Color>,

    /// window size as WxH
    #[arg(long, value_parser = parse_window_size)]
    res: Option<WindowSize>,

    #[arg(long)]
    fullscreen: bool,

    /// no sound at all
    #[arg(long)]
    mute: bool,
}

fn parse_color(s: &str) -> Result<Color, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected r,g,b, got {:?}", s));
    }
    let mut rgb = [0u8; 3];
    for (c, p) in rgb.iter_mut().zip(parts) {
        *c = p.parse().map_err(|e| format!("bad component {:?}: {}", p, e))?;
    }
    Ok(Color::rgb(rgb[0], rgb[1], rgb[2]))
}

fn parse_window_size(s: &str) -> Result<WindowSize, String> {
    let (w, h) = s
        .split_once(|c: char| c == 'x' || c == 'X')
        .ok_or_else(|| format!("expected WxH, got {:?}", s))?;
    let width = w.trim().parse().map_err(|e| format!("bad width {:?}: {}", w, e))?;
    let height = h.trim().parse().map_err(|e| format!("bad height {:?}: {}", h, e))?;
    if width == 0 || height == 0 {
        return Err("window size must be greater than 0".to_string());
    }
    Ok(WindowSize { width, height })
}

/// stand-in for an opcode table: shows the test card, then inverts the
/// screen on every key
struct TestCard {
    shown: bool,
}

impl Processor for TestCard {
    fn step(&mut self, machine: &mut dyn Machine) -> Step {
        let gfx = machine.cpu().gfx();
        if !self.shown {
            gfx.write().bytes_mut().copy_from_slice(&CHIP8_TEST_CARD);
            self.shown = true;
            return Step::Continue;
        }
        match machine.wait_key() {
            WaitKey::Key(_) => {
                for b in gfx.write().bytes_mut() {
                    *b = !*b;
                }
                machine.play_sound(4);
                Step::Continue
            }
            WaitKey::Cancelled => {
                // a reset clears the screen
                self.shown = false;
                Step::Cancelled
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut config = EmulatorConfig::default();
    config.rates.instr_hz = args.cpu_hz;
    config.rates.frame_hz = args.fps;
    config.tone_hz = f32::from(args.tone_hz);
    config.render.fullscreen = args.fullscreen;
    if let Some(c) = args.color {
        config.render.foreground = c;
    }
    if let Some(c) = args.background {
        config.render.background = c;
    }
    if let Some(window) = args.res {
        config.render.window = window;
    }

    let render: Box<dyn RenderPlugin> = Box::new(TermRender::new());
    let input: Box<dyn InputPlugin> = Box::new(TermInput::new());
    let sound: Box<dyn SoundPlugin> = if args.mute {
        Box::new(Mute::new())
    } else {
        Box::new(SimpleBeep::from_config(&config))
    };

    let mut emulator = Emulator::new(config);
    emulator.initialize_with(Some(render), Some(input), Some(sound))?;
    if let Some(window) = args.res {
        emulator.set_window_size(window)?;
    }

    if let Some(path) = &args.rom {
        let mut f = File::open(path)?;
        emulator.load_program(&mut f)?;
    }

    let mut processor = TestCard { shown: false };
    emulator.run(&mut processor);
    info!("bye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_up_to_max_accepted() {
        let args = Args::try_parse_from(["chip8-vm", "--cpu-hz", "1000000000", "--fps", "1"]).unwrap();
        assert_eq!(args.cpu_hz, MAX_HZ);
        assert_eq!(args.fps, 1);
    }

    #[test]
    fn test_rates_out_of_range_rejected() {
        assert!(Args::try_parse_from(["chip8-vm", "--cpu-hz", "2000000000"]).is_err());
        assert!(Args::try_parse_from(["chip8-vm", "--cpu-hz", "0"]).is_err());
        assert!(Args::try_parse_from(["chip8-vm", "--fps", "1000000001"]).is_err());
    }

    #[test]
    fn test_parse_window_size() {
        assert_eq!(
            parse_window_size("640x320"),
            Ok(WindowSize {
                width: 640,
                height: 320
            })
        );
        assert!(parse_window_size("640").is_err());
        assert!(parse_window_size("0x320").is_err());
        let args = Args::try_parse_from(["chip8-vm", "--res", "1024X512"]).unwrap();
        assert_eq!(args.res.map(|w| w.width), Some(1024));
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("255, 176, 0"), Ok(Color::rgb(255, 176, 0)));
        assert!(parse_color("1,2").is_err());
        assert!(parse_color("1,2,300").is_err());
    }
}
