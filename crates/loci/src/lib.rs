pub mod app;

pub use app::session::{
    AudioCue, Dialog, DialogKind, MagnetSlot, MenuButton, ParticleKind, Phase, Session,
    SessionConfig, SessionEvent, SessionInput,
};
