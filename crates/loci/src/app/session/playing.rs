impl Session {
    /// Arms a fresh round of the recall game: derives the time budget from
    /// the room and magnet layout, orders the magnets by upload order, hides
    /// them, and releases the first concept onto the floor.
    fn start_game(&mut self, store: &mut dyn AnchorStore, gateway: &mut dyn PersistenceGateway) {
        let positions: Vec<Vec3> = self
            .magnet_ids_snapshot()
            .into_iter()
            .filter_map(|magnet| self.registry.magnet(magnet).map(|m| m.position))
            .collect();
        self.game_time =
            game_time_distance_factor(&positions) + game_time_magnet_count_factor(positions.len());
        info!(game_time = self.game_time, "game started");

        self.correct_streak = 0;
        self.index_to_free = 0;
        self.score = 0;
        self.ended_by_timeout = false;
        self.magnets_to_free.clear();
        self.sorted_magnets = self.sort_magnets_by_upload_order();

        for magnet in self.magnet_ids_snapshot() {
            if let Some(entity) = self.registry.magnet_mut(magnet) {
                entity.active = false;
            }
            if let Some(slot) = self.slots.get_mut(&magnet) {
                slot.attached_concept = slot.associated_concept.clone();
                slot.free_time_seconds = 0.0;
                slot.penalty_seconds = 0.0;
                slot.is_being_held = false;
            }
        }

        let Some(first_magnet) = self.sorted_magnets.first().copied() else {
            warn!("game started with no magnets");
            return;
        };
        let first_concept = self
            .slots
            .get(&first_magnet)
            .and_then(|slot| slot.associated_concept.clone());
        let Some(first_concept) = first_concept else {
            warn!("first magnet has no associated concept");
            return;
        };

        if let Some(entity) = self.registry.magnet_mut(first_magnet) {
            entity.active = true;
        }
        self.move_to_random_floor(&first_concept, store, gateway);
        let position = self.registry.magnet(first_magnet).map(|m| m.position);
        self.emit_audio(AudioCue::MagnetDetach, position);
        self.events.emit(SessionEvent::MagnetReleasedForRecall {
            magnet: first_magnet,
        });
        if let Some(entity) = self.registry.concept_mut(&first_concept) {
            entity.manipulable = true;
        }
        if let Some(slot) = self.slots.get_mut(&first_magnet) {
            slot.attached_concept = None;
        }

        self.timers
            .schedule(TimerKind::ToPlayingFinal, MAIN_PHASE_SECONDS);
        self.index_to_free = 1;
    }

    /// The free-magnet loop: accrues how long each magnet has been missing
    /// its concept, applies the slow idle penalty and spins orphaned
    /// concepts as a visual nudge. Active only while playing the main phase.
    fn update_playing(&mut self, dt_seconds: f32) {
        if self.phase != Phase::PlayingMain || self.pending_transition.is_some() {
            return;
        }

        for magnet in self.magnet_ids_snapshot() {
            let Some(slot) = self.slots.get(&magnet) else {
                continue;
            };
            let occupied_correctly = slot.attached_concept.is_some()
                && slot.attached_concept == slot.associated_concept;
            let associated = slot.associated_concept.clone();
            let is_held = slot.is_being_held;

            if occupied_correctly {
                if let Some(slot) = self.slots.get_mut(&magnet) {
                    slot.free_time_seconds = 0.0;
                }
                continue;
            }

            let mut apply_penalty = false;
            let mut spin_concept = false;
            if let Some(slot) = self.slots.get_mut(&magnet) {
                slot.free_time_seconds += dt_seconds;
                if slot.free_time_seconds >= self.game_time * 2.0 {
                    slot.penalty_seconds += dt_seconds;
                    if slot.penalty_seconds > IDLE_PENALTY_WINDOW_SECONDS {
                        slot.penalty_seconds = 0.0;
                        apply_penalty = true;
                    }
                    spin_concept = true;
                }
            }

            if apply_penalty {
                // Not floored: sustained neglect can push the score negative.
                self.score -= 1;
                debug!(score = self.score, "idle penalty applied");
            }

            if spin_concept && !is_held {
                if let Some(concept) = associated {
                    let near = self
                        .registry
                        .concept(&concept)
                        .map(|entity| entity.position)
                        .is_some_and(|position| self.position_near_any_magnet(position));
                    if !near {
                        if let Some(entity) = self.registry.concept_mut(&concept) {
                            let spin = (IDLE_SPIN_DEGREES_PER_SECOND * dt_seconds).to_radians();
                            entity.facing = entity.facing * Quat::from_yaw(spin);
                        }
                    }
                }
            }
        }
    }

    fn concept_released_playing(
        &mut self,
        concept: &ConceptId,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        if let Some(home) = self.magnet_of_concept(concept) {
            if let Some(slot) = self.slots.get_mut(&home) {
                slot.attached_concept = None;
            }
        }

        let Some(nearest) = self.nearest_magnet_for_playing(concept) else {
            return;
        };
        let magnet_active = self
            .registry
            .magnet(nearest)
            .is_some_and(|magnet| magnet.active);
        let occupied = self
            .slots
            .get(&nearest)
            .is_some_and(|slot| slot.attached_concept.is_some());
        if occupied || !magnet_active {
            return;
        }

        match self.phase {
            Phase::PlayingMain => {
                self.concept_placed_main(concept, nearest, store, gateway);
                let position = self.registry.magnet(nearest).map(|m| m.position);
                self.emit_audio(AudioCue::MagnetAttach, position);
            }
            Phase::PlayingFinal => {
                self.concept_placed_final(concept, nearest);
                let position = self.registry.magnet(nearest).map(|m| m.position);
                self.emit_audio(AudioCue::MagnetAttach, position);
            }
            _ => {}
        }
    }

    fn snap_concept_to_magnet(&mut self, concept: &ConceptId, magnet: MagnetId) {
        let position = self.registry.magnet(magnet).map(|m| m.position);
        let facing = self.facing_user();
        if let (Some(entity), Some(position)) = (self.registry.concept_mut(concept), position) {
            entity.position = position;
            entity.facing = facing;
        }
    }

    fn concept_placed_main(
        &mut self,
        concept: &ConceptId,
        nearest: MagnetId,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        if let Some(slot) = self.slots.get_mut(&nearest) {
            slot.attached_concept = Some(concept.clone());
        }
        if let Some(magnet) = self.registry.magnet_mut(nearest) {
            magnet.active = false;
        }
        self.snap_concept_to_magnet(concept, nearest);

        let correct = self
            .slots
            .get(&nearest)
            .is_some_and(|slot| slot.associated_concept.as_ref() == Some(concept));
        if correct {
            self.concept_placed_main_correct(nearest, store, gateway);
        } else {
            let position = self
                .registry
                .magnet(nearest)
                .map(|m| m.position)
                .unwrap_or(Vec3::ZERO);
            self.events.emit(SessionEvent::Particles {
                kind: ParticleKind::Wrong,
                position,
            });

            self.score = (self.score - WRONG_PLACEMENT_PENALTY).max(0);
            self.correct_streak = self
                .correct_streak
                .saturating_sub(WRONG_PLACEMENT_STREAK_PENALTY);
            debug!(score = self.score, streak = self.correct_streak, "wrong placement");

            if let Some(entity) = self.registry.concept_mut(concept) {
                entity.manipulable = false;
            }
            self.timers.schedule(
                TimerKind::DetachConcept {
                    magnet: nearest,
                    concept: concept.clone(),
                },
                WRONG_PLACEMENT_DETACH_SECONDS,
            );
        }
    }

    /// Correct placement: the streak grows, more magnets release, and past
    /// the streak threshold the score doubles while release order flips from
    /// sequential to random. Early game predictable, late game chaotic.
    fn concept_placed_main_correct(
        &mut self,
        nearest: MagnetId,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        if let Some(slot) = self.slots.get(&nearest) {
            if let Some(concept) = slot.associated_concept.clone() {
                if let Some(entity) = self.registry.concept_mut(&concept) {
                    entity.manipulable = false;
                }
            }
        }

        let max_magnets = ((self.slots.len() as f32) / 2.0).ceil() as u32;
        self.correct_streak += 1;

        let past_threshold = self.correct_streak / STREAK_RELEASE_STEP >= max_magnets;
        let adjusted_streak = if past_threshold {
            self.correct_streak - max_magnets * STREAK_RELEASE_STEP
        } else {
            self.correct_streak
        };
        let to_release = (adjusted_streak / STREAK_RELEASE_STEP + 1).min(max_magnets) as usize;
        let multiplier: i32 = if past_threshold { 2 } else { 1 };

        self.score += to_release as i32 * SCORE_PER_RELEASED_MAGNET * multiplier;
        debug!(score = self.score, to_release, multiplier, "correct placement");

        if let Some(slot) = self.slots.get_mut(&nearest) {
            slot.free_time_seconds = 0.0;
        }

        let position = self
            .registry
            .magnet(nearest)
            .map(|m| m.position)
            .unwrap_or(Vec3::ZERO);
        self.events.emit(SessionEvent::Particles {
            kind: ParticleKind::Correct,
            position,
        });

        let mut released = 0usize;
        while released < to_release && self.count_free_during_playing() < to_release {
            if self.correct_streak / STREAK_RELEASE_STEP < max_magnets {
                released = self.release_sequential(released, store, gateway);
            } else {
                released = self.release_random(released, store, gateway);
            }
        }
    }

    /// Frees the next occupied magnet in counterclockwise/upload order,
    /// skipping over already-free ones; the index wraps around.
    fn release_sequential(
        &mut self,
        released: usize,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) -> usize {
        let mut released = released;
        let Some(magnet) = self.sorted_magnets.get(self.index_to_free).copied() else {
            self.index_to_free = 0;
            return released;
        };

        let attached = self
            .slots
            .get(&magnet)
            .and_then(|slot| slot.attached_concept.clone());
        if attached.is_some() {
            let concept = self
                .slots
                .get(&magnet)
                .and_then(|slot| slot.associated_concept.clone());
            if let Some(concept) = concept {
                self.free_magnet_for_recall(magnet, &concept, store, gateway);
            }
            self.index_to_free += 1;
            released += 1;
        } else {
            self.index_to_free += 1;
        }

        if self.index_to_free == self.sorted_magnets.len() {
            self.index_to_free = 0;
        }
        released
    }

    /// Frees a uniformly random occupied magnet; the pool refills from the
    /// currently occupied set once drained.
    fn release_random(
        &mut self,
        released: usize,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) -> usize {
        if self.magnets_to_free.is_empty() {
            self.magnets_to_free = self
                .slots
                .iter()
                .filter(|(_, slot)| slot.attached_concept.is_some())
                .map(|(magnet, _)| *magnet)
                .collect();
        }
        if self.magnets_to_free.is_empty() {
            return released + 1;
        }

        let index = self.rng.gen_range(0..self.magnets_to_free.len());
        let magnet = self.magnets_to_free.remove(index);
        let concept = self
            .slots
            .get(&magnet)
            .and_then(|slot| slot.associated_concept.clone());
        if let Some(concept) = concept {
            self.free_magnet_for_recall(magnet, &concept, store, gateway);
        }
        released + 1
    }

    fn free_magnet_for_recall(
        &mut self,
        magnet: MagnetId,
        concept: &ConceptId,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        if let Some(entity) = self.registry.magnet_mut(magnet) {
            entity.active = true;
        }
        let position = self.registry.magnet(magnet).map(|m| m.position);
        self.emit_audio(AudioCue::MagnetDetach, position);
        self.events
            .emit(SessionEvent::MagnetReleasedForRecall { magnet });

        self.move_to_random_floor(concept, store, gateway);
        if let Some(slot) = self.slots.get_mut(&magnet) {
            slot.attached_concept = None;
        }
        if let Some(entity) = self.registry.concept_mut(concept) {
            entity.manipulable = true;
        }
    }

    fn concept_placed_final(&mut self, concept: &ConceptId, nearest: MagnetId) {
        if let Some(slot) = self.slots.get_mut(&nearest) {
            slot.attached_concept = Some(concept.clone());
        }
        self.snap_concept_to_magnet(concept, nearest);

        let position = self
            .registry
            .magnet(nearest)
            .map(|m| m.position)
            .unwrap_or(Vec3::ZERO);
        let correct = self
            .slots
            .get(&nearest)
            .is_some_and(|slot| slot.associated_concept.as_ref() == Some(concept));

        if correct {
            self.events.emit(SessionEvent::Particles {
                kind: ParticleKind::Correct,
                position,
            });
            if let Some(entity) = self.registry.concept_mut(concept) {
                entity.manipulable = false;
            }

            // Reveal the next hidden magnet in canonical order.
            for magnet in self.sorted_magnets.clone() {
                let hidden = self
                    .registry
                    .magnet(magnet)
                    .is_some_and(|entity| !entity.active);
                if hidden {
                    if let Some(entity) = self.registry.magnet_mut(magnet) {
                        entity.active = true;
                    }
                    break;
                }
            }

            if self.all_magnets_occupied_correctly() {
                self.finish_game_completed();
            }
        } else {
            self.events.emit(SessionEvent::Particles {
                kind: ParticleKind::Wrong,
                position,
            });
            if let Some(entity) = self.registry.concept_mut(concept) {
                entity.manipulable = false;
            }
            self.timers.schedule(
                TimerKind::DetachConcept {
                    magnet: nearest,
                    concept: concept.clone(),
                },
                WRONG_PLACEMENT_DETACH_SECONDS,
            );
        }
    }

    fn finish_game_completed(&mut self) {
        self.set_phase(Phase::Ended);
        self.ended_by_timeout = false;
        for concept in self.registry.concepts_in_scene().to_vec() {
            if let Some(entity) = self.registry.concept_mut(&concept) {
                entity.manipulable = false;
            }
        }

        self.score += self.score / 5;
        info!(score = self.score, "game completed");
        let message = format!(
            "Congratulations! You have completed the game of loci. Your score is: {}. \
             Would you like to publish this in the standings?",
            self.score
        );
        self.open_dialog("END", &message, DialogKind::RequestStandings, true);
    }

    fn finish_game_timed_out(&mut self) {
        if self.phase == Phase::Ended {
            debug!("final match already ended by completion");
            return;
        }
        self.set_phase(Phase::Ended);
        self.ended_by_timeout = true;
        info!(score = self.score, "final match timed out");
        let message = format!(
            "What a pity! You couldn't finish final match. Your score is: {}. \
             Would you like to publish this in the standings?",
            self.score
        );
        self.open_dialog("END", &message, DialogKind::RequestStandings, true);
    }

    fn handle_timer(
        &mut self,
        due: TimerKind,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        match due {
            TimerKind::ToPlayingFinal => {
                self.change_phase(Phase::PlayingFinal, store, gateway);
                let countdown = self.game_time * FINAL_COUNTDOWN_FACTOR;
                self.timers.schedule(TimerKind::FinalCountdown, countdown);
                info!(countdown, "final match started");
            }
            TimerKind::FinalCountdown => {
                self.finish_game_timed_out();
            }
            TimerKind::DetachConcept { magnet, concept } => {
                if let Some(entity) = self.registry.magnet_mut(magnet) {
                    entity.active = true;
                }
                let position = self.registry.magnet(magnet).map(|m| m.position);
                self.emit_audio(AudioCue::MagnetDetach, position);
                self.move_to_random_floor(&concept, store, gateway);
                if let Some(slot) = self.slots.get_mut(&magnet) {
                    slot.attached_concept = None;
                }
                if let Some(entity) = self.registry.concept_mut(&concept) {
                    entity.manipulable = true;
                }
            }
            TimerKind::ReanchorConcept { concept } => {
                self.binder
                    .attach_anchor(BoundObject::Concept(concept), &self.registry, store);
            }
        }
    }
}
