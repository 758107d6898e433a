#[derive(Debug, Clone, PartialEq)]
enum TimerKind {
    ToPlayingFinal,
    FinalCountdown,
    DetachConcept {
        magnet: MagnetId,
        concept: ConceptId,
    },
    ReanchorConcept {
        concept: ConceptId,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveTimer {
    kind: TimerKind,
    remaining_seconds: f32,
}

/// Cooperative one-shot timers driven by the session tick. Phase changes
/// cancel the whole pool so no stale timer fires into a phase that already
/// moved on.
#[derive(Debug, Default)]
struct TimerPool {
    active: Vec<ActiveTimer>,
}

impl TimerPool {
    fn schedule(&mut self, kind: TimerKind, seconds: f32) {
        self.active.push(ActiveTimer {
            kind,
            remaining_seconds: seconds,
        });
    }

    fn cancel_all(&mut self) {
        if !self.active.is_empty() {
            debug!(cancelled = self.active.len(), "timers cancelled");
        }
        self.active.clear();
    }

    fn tick(&mut self, dt_seconds: f32) -> Vec<TimerKind> {
        let mut due = Vec::new();
        let mut still_active = Vec::with_capacity(self.active.len());
        for mut timer in std::mem::take(&mut self.active) {
            timer.remaining_seconds -= dt_seconds;
            if timer.remaining_seconds <= 0.0 {
                due.push(timer.kind);
            } else {
                still_active.push(timer);
            }
        }
        self.active = still_active;
        due
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.active.len()
    }
}
