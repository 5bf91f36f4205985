//! # CHIP-8 VM core
//!
//! ## Design
//!
//! * three independently paced activities: instructions (380 Hz by default),
//!   frame redraw (60 Hz) and the countdown register (60 Hz)
//! * no threads of our own; the host drives one loop and sleeps in between
//! * display, keyboard and buzzer are plugins living in one slot each, and
//!   can be replaced while the machine runs
//! * plugins never call back into the core; they post events to a bus the
//!   core drains right after pumping them
//! * the opcode table is someone else's problem: it implements `Processor`
//!   and gets a `Machine` to work on
//!
//! Model
//!
//! Emulator
//!  |-- config, cpu state (memory, registers, stack, gfx buffer)
//!  |-- flag register (pending work, plugin faults, exit)
//!  |-- scheduler(clock)
//!  |    `-- instr, draw and countdown frequency timers
//!  |-- render slot, input slot, sound slot
//!  |-- event bus <-- sinks handed to the plugins
//!  `-- host loop
//!       |-- halt_for_next_flag()     // sleep until instr or draw is due
//!       |-- update_systems()         // pump plugins, drain events, tick
//!       |-- execute_instr(processor) // if INSTR
//!       `-- draw()                   // if DRAW
//!
//! The wait-key opcode runs the same pump/tick/draw/idle steps from inside
//! `execute_instr` until a key, an exit or a reset shows up.

pub mod config;
pub mod cpu;
pub mod display;
pub mod emulator;
pub mod error;
pub mod events;
pub mod flags;
pub mod input;
pub mod memory;
pub mod plugin;
pub mod scheduler;
pub mod sound;
pub mod timer;

pub use config::EmulatorConfig;
pub use emulator::{Emulator, Machine, Processor, Step, WaitKey};
pub use error::EmulatorError;
pub use flags::Flags;
pub use plugin::{Plugin, PluginError, PluginKind, SlotState};
