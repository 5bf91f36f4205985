use crate::events::{CoreEvent, EventSink};
use crate::plugin::{Plugin, PluginError, PluginKind};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, SetSize};
use log::{debug, info};
use parking_lot::RwLock;
use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color as TuiColor, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

/// Render backends draw the machine's graphics buffer and report window
/// events. The core hands a backend its shared buffer and an event sink once
/// it is initialized; `update_events` is the pump during which the backend
/// may post (e.g. window closed).
pub trait RenderPlugin: Plugin {
    fn initialize(&mut self, config: &RenderConfig, gfx: Resolution) -> Result<(), PluginError>;

    fn set_buffer(&mut self, gfx: SharedGfx);

    /// window-close requests go to `sink`
    fn attach(&mut self, sink: EventSink);

    /// pump pending window events; true if any were handled
    fn update_events(&mut self) -> bool;

    fn draw_buffer(&mut self) -> Result<(), PluginError>;

    fn set_resolution(&mut self, window: WindowSize) -> Result<(), PluginError>;

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), PluginError>;

    fn set_color_filter(&mut self, color: Color) -> Result<(), PluginError>;
}

// store useful metadata about the graphics: width, height, bitplanes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution(pub usize, pub usize, pub usize);

impl Resolution {
    /// single bitplane of `w` x `h`
    pub fn mono(w: usize, h: usize) -> Self {
        Resolution(w, h, 1)
    }

    pub fn pixel_count(&self) -> usize {
        self.0 * self.1
    }

    pub fn byte_count(&self) -> usize {
        self.0 * self.1 * self.2 / 8
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    fn bitplane_from_data<'a>(
        &self,
        data: &'a [u8],
        bitplane: u8,
    ) -> impl std::iter::Iterator<Item = (f64, f64)> + 'a {
        let mut count = self.pixel_count();
        let w = self.0;
        std::iter::from_fn(move || {
            while count > 0 {
                count -= 1;
                let bit = 1 & (data[count / 8] >> (7 - count % 8));
                if bit == bitplane {
                    return Some((
                        (count % w) as f64,        // x
                        -1.0 * (count / w) as f64, // y
                    ));
                }
            }
            None
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }
}

impl From<Color> for TuiColor {
    fn from(c: Color) -> Self {
        TuiColor::Rgb(c.r, c.g, c.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub title: String,
    pub window: WindowSize,
    pub foreground: Color,
    pub background: Color,
    pub fullscreen: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            title: "CHIP-8".to_string(),
            window: WindowSize {
                width: 512,
                height: 256,
            },
            foreground: Color::WHITE,
            background: Color::BLACK,
            fullscreen: false,
        }
    }
}

/// packed 1bpp frame, most significant bit first, row major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxBuffer {
    res: Resolution,
    bytes: Vec<u8>,
}

pub type SharedGfx = Arc<RwLock<GfxBuffer>>;

impl GfxBuffer {
    pub fn new(res: Resolution) -> Self {
        GfxBuffer {
            res,
            bytes: vec![0; res.byte_count()],
        }
    }

    pub fn shared(res: Resolution) -> SharedGfx {
        Arc::new(RwLock::new(Self::new(res)))
    }

    pub fn resolution(&self) -> Resolution {
        self.res
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        let n = y * self.res.0 + x;
        1 & (self.bytes[n / 8] >> (7 - n % 8)) == 1
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        let n = y * self.res.0 + x;
        let mask = 0x80 >> (n % 8);
        if on {
            self.bytes[n / 8] |= mask;
        } else {
            self.bytes[n / 8] &= !mask;
        }
    }
}

/// monochrome display in a terminal, rendered using TUI and crossterm
pub struct TermRender {
    terminal: Option<Terminal<CrosstermBackend<io::Stdout>>>,
    buffer: Option<SharedGfx>,
    resolution: Resolution,
    title: String,
    foreground: Color,
    background: Color,
    fullscreen: bool,
}

impl TermRender {
    pub fn new() -> Self {
        TermRender {
            terminal: None,
            buffer: None,
            resolution: Resolution::mono(64, 32),
            title: String::new(),
            foreground: Color::WHITE,
            background: Color::BLACK,
            fullscreen: false,
        }
    }
}

impl Default for TermRender {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for TermRender {
    fn name(&self) -> &str {
        "terminal render"
    }

    fn is_initialized(&self) -> bool {
        self.terminal.is_some()
    }

    fn dispose(&mut self) {
        if let Some(mut terminal) = self.terminal.take() {
            let _ = terminal.show_cursor();
            if self.fullscreen {
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
            }
        }
        self.fullscreen = false;
        self.buffer = None;
    }
}

impl Drop for TermRender {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl TermRender {
    fn open(&mut self, config: &RenderConfig, gfx: Resolution) -> Result<(), PluginError> {
        // i don't know how to draw things that aren't mono
        if gfx.2 != 1 {
            return Err(PluginError::Device(
                "TermRender can only render one bitplane".to_string(),
            ));
        }
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        self.terminal = Some(terminal);
        self.resolution = gfx;
        self.title = config.title.clone();
        self.foreground = config.foreground;
        self.background = config.background;
        if config.fullscreen {
            self.set_fullscreen(true)?;
        }
        Ok(())
    }
}

impl RenderPlugin for TermRender {
    fn initialize(&mut self, config: &RenderConfig, gfx: Resolution) -> Result<(), PluginError> {
        if self.is_initialized() {
            self.dispose();
        }
        // a half-opened terminal is put back before the error is returned
        if let Err(e) = self.open(config, gfx) {
            self.dispose();
            return Err(e);
        }
        info!("terminal render initialized for {}x{}", gfx.0, gfx.1);
        Ok(())
    }

    fn set_buffer(&mut self, gfx: SharedGfx) {
        self.buffer = Some(gfx);
    }

    fn attach(&mut self, _sink: EventSink) {}

    fn update_events(&mut self) -> bool {
        // the terminal has no window of its own; keys (and ctrl-c) are read
        // by the input plugin, and tui resizes the viewport on draw
        false
    }

    fn draw_buffer(&mut self) -> Result<(), PluginError> {
        let terminal = self
            .terminal
            .as_mut()
            .ok_or(PluginError::NotInitialized(PluginKind::Render))?;
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| PluginError::Device("attempt to draw without a buffer".to_string()))?;
        let data = buffer.read().bytes().to_vec();

        // make sure we're given exactly the right amount of data to draw
        assert_eq!(
            data.len(),
            self.resolution.byte_count(),
            "TermRender must have correct-sized data to draw"
        );

        let res = self.resolution;
        let off: Vec<(f64, f64)> = res.bitplane_from_data(&data, 0).collect();
        let on: Vec<(f64, f64)> = res.bitplane_from_data(&data, 1).collect();
        let (fg, bg) = (self.foreground, self.background);
        let title = self.title.clone();

        // for now this assumes a 1:1 ratio between terminal, chip8 and the
        // internal TUI canvas
        terminal.draw(|f| {
            let size = Rect::new(0, 0, 2 + res.0 as u16, 2 + res.1 as u16);
            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title(title.as_str())
                        .borders(Borders::ALL)
                        .style(Style::default().bg(bg.into())),
                )
                .x_bounds(res.x_bounds())
                .y_bounds(res.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &off,
                        color: bg.into(),
                    });
                    ctx.draw(&Points {
                        coords: &on,
                        color: fg.into(),
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }

    fn set_resolution(&mut self, window: WindowSize) -> Result<(), PluginError> {
        if window.width == 0 || window.height == 0 {
            return Err(PluginError::Device(
                "resolution must be greater than 0".to_string(),
            ));
        }
        // one terminal cell per pixel of an 8x8 block
        let cols = (window.width / 8).clamp(1, u32::from(u16::MAX)) as u16;
        let rows = (window.height / 8).clamp(1, u32::from(u16::MAX)) as u16;
        execute!(io::stdout(), SetSize(cols, rows))?;
        debug!("terminal resized to {}x{}", cols, rows);
        Ok(())
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), PluginError> {
        if fullscreen == self.fullscreen {
            return Ok(());
        }
        if fullscreen {
            execute!(io::stdout(), EnterAlternateScreen)?;
        } else {
            execute!(io::stdout(), LeaveAlternateScreen)?;
        }
        self.fullscreen = fullscreen;
        Ok(())
    }

    fn set_color_filter(&mut self, color: Color) -> Result<(), PluginError> {
        self.foreground = color;
        Ok(())
    }
}

/// what a DummyRender saw, kept outside the plugin so tests can read it after
/// the plugin has been boxed and handed to the core
#[derive(Debug, Default)]
pub struct RenderStats {
    pub draws: Cell<u32>,
    pub updates: Cell<u32>,
    pub last_frame: RefCell<Vec<u8>>,
    pub window: Cell<Option<WindowSize>>,
    pub fullscreen: Cell<bool>,
    pub color: Cell<Option<Color>>,
}

/// useful for testing non-display routines
pub struct DummyRender {
    initialized: bool,
    fail_init: bool,
    close_after: Option<u32>,
    buffer: Option<SharedGfx>,
    sink: Option<EventSink>,
    stats: Rc<RenderStats>,
}

impl DummyRender {
    pub fn new() -> Self {
        DummyRender {
            initialized: false,
            fail_init: false,
            close_after: None,
            buffer: None,
            sink: None,
            stats: Rc::new(RenderStats::default()),
        }
    }

    /// a render whose initialize always fails
    pub fn failing() -> Self {
        DummyRender {
            fail_init: true,
            ..Self::new()
        }
    }

    /// report the window as closed on the `n`th event pump
    pub fn closing_after(n: u32) -> Self {
        DummyRender {
            close_after: Some(n),
            ..Self::new()
        }
    }

    pub fn stats(&self) -> Rc<RenderStats> {
        Rc::clone(&self.stats)
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }
}

impl Default for DummyRender {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for DummyRender {
    fn name(&self) -> &str {
        "dummy render"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn dispose(&mut self) {
        self.initialized = false;
        self.buffer = None;
        self.sink = None;
    }
}

impl RenderPlugin for DummyRender {
    fn initialize(&mut self, _config: &RenderConfig, _gfx: Resolution) -> Result<(), PluginError> {
        if self.fail_init {
            return Err(PluginError::Device("no display".to_string()));
        }
        self.initialized = true;
        Ok(())
    }

    fn set_buffer(&mut self, gfx: SharedGfx) {
        self.buffer = Some(gfx);
    }

    fn attach(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    fn update_events(&mut self) -> bool {
        let n = self.stats.updates.get() + 1;
        self.stats.updates.set(n);
        match (&self.sink, self.close_after) {
            (Some(sink), Some(after)) if n >= after => {
                sink.post(CoreEvent::ExitRequested);
                true
            }
            _ => false,
        }
    }

    fn draw_buffer(&mut self) -> Result<(), PluginError> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or(PluginError::NotInitialized(PluginKind::Render))?;
        *self.stats.last_frame.borrow_mut() = buffer.read().bytes().to_vec();
        self.stats.draws.set(self.stats.draws.get() + 1);
        Ok(())
    }

    fn set_resolution(&mut self, window: WindowSize) -> Result<(), PluginError> {
        self.stats.window.set(Some(window));
        Ok(())
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), PluginError> {
        self.stats.fullscreen.set(fullscreen);
        Ok(())
    }

    fn set_color_filter(&mut self, color: Color) -> Result<(), PluginError> {
        self.stats.color.set(Some(color));
        Ok(())
    }
}


/// this is a display test card suitable for CHIP8, for testing display routines
#[rustfmt::skip]
pub const CHIP8_TEST_CARD: [u8; 256] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // 00 XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|
    0x80, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x01, // 01 X                              |X                              |
    0x80, 0x00, 0x00, 0x03, 0xc2, 0x41, 0x55, 0x55, // 02 X                             X|XX    X  X     | X X X | X X X |
    0x81, 0xff, 0xff, 0xc5, 0xa2, 0x40, 0xaa, 0xa9, // 03 X      |XXXXXXX|XXXXXXX|XX   X |X X   X  X      X X X X X X X  |
    0x80, 0x00, 0x00, 0x09, 0x92, 0x41, 0x55, 0x55, // 04 X                           X  |X  X  X  X     | X X X | X X X |
    0x81, 0xff, 0xff, 0xc1, 0x82, 0x40, 0xaa, 0xa9, // 05 X      |XXXXXXX|XXXXXXX|XX     |X     X  X      X X X X X X X  |
    0xa0, 0x00, 0x00, 0x01, 0x83, 0xc1, 0x55, 0x55, // 06 X X                            |X     X|XX     | X X X | X X X |
    0xa1, 0xff, 0xff, 0xc1, 0x80, 0x00, 0xaa, 0xa9, // 07 X X    |XXXXXXX|XXXXXXX|XX     |X               X X X X X X X  |
    0xa0, 0x00, 0x00, 0x00, 0x00, 0x01, 0x55, 0x55, // 08 X X                                            | X X X | X X X |
    0xa1, 0xff, 0xff, 0xc0, 0x00, 0x00, 0xaa, 0xa9, // 09 X X    |XXXXXXX|XXXXXXX|XX                      X X X X X X X  |
    0xbc, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // 10 X XXXX                                                         |
    0x81, 0xff, 0xff, 0xc0, 0x00, 0x00, 0x00, 0x01, // 11 X      |XXXXXXX|XXXXXXX|XX                                     |
    0x88, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x11, // 12 X   X                          |X                          X   |
    0x91, 0xff, 0xff, 0xc1, 0x80, 0x00, 0x00, 0x09, // 13 X  X   |XXXXXXX|XXXXXXX|XX     |X                           X  |
    0xa0, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x05, // 14 X X                            |X                            X |
    0xff, 0x80, 0x00, 0x1f, 0xf8, 0x00, 0x01, 0xff, // 15 XXXXXXX|X                  XXXX|XXXXX                  |XXXXXXX|
    0xff, 0x80, 0x00, 0x1f, 0xf8, 0x00, 0x01, 0xff, // 16 XXXXXXX|X                  XXXX|XXXXX                  |XXXXXXX|
    0xa0, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x05, // 17 X X                            |X                            X |
    0x90, 0x00, 0x00, 0x01, 0x85, 0x55, 0x55, 0x09, // 18 X  X                           |X    X | X X X | X X X |    X  |
    0x88, 0x00, 0x00, 0x01, 0x85, 0x55, 0x55, 0x11, // 19 X   X                          |X    X | X X X | X X X |   X   |
    0x80, 0x00, 0x00, 0x00, 0x05, 0x55, 0x55, 0x01, // 20 X                                    X | X X X | X X X |       |
    0x80, 0x00, 0x00, 0x00, 0x05, 0x55, 0x55, 0x3d, // 21 X                                    X | X X X | X X X |  XXXX |
    0x95, 0x55, 0x40, 0x00, 0x05, 0x55, 0x55, 0x25, // 22 X  X X | X X X | X                   X | X X X | X X X |  X  X |
    0xaa, 0xaa, 0x80, 0x00, 0x05, 0x55, 0x55, 0x3d, // 23 X X X X X X X X X                    X | X X X | X X X |  XXXX |
    0x95, 0x55, 0x40, 0x01, 0x85, 0x55, 0x55, 0x29, // 24 X  X X | X X X | X             |X    X | X X X | X X X |  X X  |
    0xaa, 0xaa, 0x83, 0xc1, 0x85, 0x55, 0x55, 0x25, // 25 X X X X X X X X X     X|XX     |X    X | X X X | X X X |  X  X |
    0x95, 0x55, 0x41, 0x41, 0x85, 0x55, 0x55, 0x01, // 26 X  X X | X X X | X     | X     |X    X | X X X | X X X |       |
    0xaa, 0xaa, 0x81, 0x49, 0x95, 0x55, 0x55, 0x01, // 27 X X X X X X X X X      | X  X  |X  X X | X X X | X X X |       |
    0x95, 0x55, 0x41, 0x45, 0xa5, 0x55, 0x55, 0x01, // 28 X  X X | X X X | X     | X   X |X X  X | X X X | X X X |       |
    0xaa, 0xaa, 0x83, 0xc3, 0xc5, 0x55, 0x55, 0x01, // 29 X X X X X X X X X     X|XX    X|XX   X | X X X | X X X |       |
    0x80, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x01, // 30 X                              |X                              |
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // 31 XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|
]; //                                                  .. 0......78......f0......78......f0......78......f0......78......f
