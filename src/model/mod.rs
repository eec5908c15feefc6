// File: ./src/model/mod.rs
pub mod display;
pub mod item;
pub mod matcher;
pub mod parser;

pub use item::{AlarmFault, AlarmPatch, AlarmRecord, MatchEvent, RepeatPolicy};
pub use matcher::{AlarmMatcher, FireWindow, TickReport};
pub use parser::{Extractor, ParsedDateTime, extract};
