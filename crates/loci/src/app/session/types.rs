#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    MagnetDistribution,
    ConceptDistribution,
    PlayingMain,
    PlayingFinal,
    Ended,
    Memorize,
}

/// Per-magnet state, addressed by the stable `MagnetId` handle.
/// `attached_concept` only means something during the play phases; outside
/// them `associated_concept` is the whole story.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MagnetSlot {
    pub outside_exclusion_zone: bool,
    pub associated_concept: Option<ConceptId>,
    pub attached_concept: Option<ConceptId>,
    pub free_time_seconds: f32,
    pub penalty_seconds: f32,
    pub is_being_held: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Generic,
    RequestStandings,
    Standings,
    OutOfRoom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dialog {
    pub title: String,
    pub message: String,
    pub kind: DialogKind,
    auto_dismiss: bool,
    age_seconds: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCue {
    MagnetAttach,
    MagnetDetach,
    MagnetSwap,
    ObjectSpawned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    Correct,
    Wrong,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BackgroundMusicStarted,
    DialogOpened { title: String, kind: DialogKind },
    DialogDismissed { title: String },
    Audio { cue: AudioCue, position: Option<Vec3> },
    Particles { kind: ParticleKind, position: Vec3 },
    PhaseChanged { from: Phase, to: Phase },
    ConceptRevealed { concept: ConceptId },
    MagnetReleasedForRecall { magnet: MagnetId },
    RotatorShown { concept: ConceptId },
    RotatorHidden,
    MenuOpened { available: Vec<Phase> },
    ScorePublished { user: String, score: i32 },
}

#[derive(Default)]
struct SessionEventBus {
    events: Vec<SessionEvent>,
}

impl SessionEventBus {
    fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    fn drain(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Snapshot of the head-mounted device pose fed in every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionInput {
    pub user: UserPose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuButton {
    MagnetDistribution,
    ConceptDistribution,
    Playing,
    Memorize,
    Standings,
    RotateRight,
    RotateLeft,
    RotateUp,
    RotateDown,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_id: String,
    pub user_name: String,
    pub experience_id: String,
    pub rng_seed: u64,
}

impl SessionConfig {
    pub fn experience_key(&self, room_code: &str) -> String {
        format!("{room_code}{}{}", self.user_id, self.experience_id)
    }
}
